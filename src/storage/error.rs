//! Failures of the telemetry store
//!
//! None of these reach a sensor. The persistence relay logs and drops the
//! reading, the scheduler aborts the run, and the query endpoints render an
//! `"error"` outcome carrying the [`Display`](std::fmt::Display) text.

use std::fmt;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// The database could not be opened or reached
    ConnectionFailed(String),

    /// Schema migrations did not apply
    MigrationFailed(String),

    /// A read or write statement failed
    QueryFailed(String),

    /// A stored row no longer decodes into a reading or an aggregate
    CorruptRecord { table: &'static str, detail: String },

    /// `close` was called; the named backend accepts no more work
    Closed(&'static str),
}

impl StorageError {
    pub(crate) fn corrupt_reading(detail: impl Into<String>) -> Self {
        StorageError::CorruptRecord {
            table: "sensor_readings",
            detail: detail.into(),
        }
    }

    pub(crate) fn corrupt_aggregate(detail: impl Into<String>) -> Self {
        StorageError::CorruptRecord {
            table: "daily_aggregates",
            detail: detail.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "telemetry store unreachable: {msg}"),
            StorageError::MigrationFailed(msg) => {
                write!(f, "telemetry schema migration failed: {msg}")
            }
            StorageError::QueryFailed(msg) => write!(f, "telemetry query failed: {msg}"),
            StorageError::CorruptRecord { table, detail } => {
                write!(f, "corrupt row in {table}: {detail}")
            }
            StorageError::Closed(backend) => write!(f, "{backend} backend is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[cfg(feature = "storage-sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => StorageError::ConnectionFailed(io_err.to_string()),
            sqlx::Error::PoolTimedOut => {
                StorageError::ConnectionFailed("timed out waiting for a connection".to_string())
            }
            sqlx::Error::PoolClosed => StorageError::Closed("sqlite"),
            sqlx::Error::ColumnDecode { index, source } => StorageError::QueryFailed(format!(
                "column {index} could not be decoded: {source}"
            )),
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}
