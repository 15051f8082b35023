//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use super::error::StorageResult;
use super::schema::DailyAggregate;
use crate::SensorReading;

/// Query parameters for fetching readings within a time window
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRange {
    /// Elevator to query; `None` selects every elevator
    pub elevator_id: Option<String>,

    /// Start of the window (inclusive)
    pub start: DateTime<Utc>,

    /// End of the window (exclusive)
    pub end: DateTime<Utc>,
}

impl QueryRange {
    /// The UTC calendar day `date`, across all elevators
    pub fn for_day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();

        Self {
            elevator_id: None,
            start,
            end: start + Duration::days(1),
        }
    }

    /// Restrict the window to a single elevator
    pub fn with_elevator(mut self, elevator_id: impl Into<String>) -> Self {
        self.elevator_id = Some(elevator_id.into());
        self
    }

    /// Does a reading of `elevator_id` taken at `timestamp` fall inside this window?
    pub fn contains(&self, elevator_id: &str, timestamp: DateTime<Utc>) -> bool {
        let elevator_matches = self
            .elevator_id
            .as_deref()
            .is_none_or(|wanted| wanted == elevator_id);

        elevator_matches && timestamp >= self.start && timestamp < self.end
    }
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// The storage collaborator is the system of record for readings and daily
/// aggregates; the pipeline only holds them transiently. Implementations must
/// use bound parameters for every identity or date value they receive.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// persistence relay, the aggregation scheduler and the query handlers.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>` which wraps `StorageError`.
/// Implementations should convert backend-specific errors to
/// `StorageError` variants.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Append one reading for `elevator_id`
    ///
    /// The elevator identity is the key; the reading's own `elevator_id`
    /// field is ignored.
    async fn append_reading(&self, elevator_id: &str, reading: &SensorReading)
    -> StorageResult<()>;

    /// Append a batch of daily aggregate rows
    ///
    /// Rows are always appended. Writing the same (elevator, date) twice
    /// produces two rows.
    async fn append_aggregates(&self, rows: Vec<DailyAggregate>) -> StorageResult<()>;

    /// Readings inside `query`, ordered by timestamp (oldest first)
    ///
    /// Returned readings always carry their elevator identity.
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<SensorReading>>;

    /// Every reading stored for `elevator_id`, ordered by timestamp (oldest first)
    async fn query_history(&self, elevator_id: &str) -> StorageResult<Vec<SensorReading>>;

    /// Every aggregate row for `elevator_id`, most recent reference date first
    async fn query_aggregates(&self, elevator_id: &str) -> StorageResult<Vec<DailyAggregate>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Get backend-specific statistics
    ///
    /// Returns human-readable stats about the backend
    /// (e.g., "SQLite: 1200 readings, 40 aggregates, 0.45 MB on disk").
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
