//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//! - **Bound parameters**: Elevator ids and dates never end up inside SQL text
//!
//! ## Limitations
//!
//! - **Concurrency**: Limited concurrent writes; every ingested reading is one
//!   short write transaction
//! - **Distributed**: Single-machine only

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::DailyAggregate;
use crate::SensorReading;

const READING_COLUMNS: &str = "elevator_id, timestamp, current_a, temperature_c, vibration_ms2, \
     voltage_v, speed, state, distance_l1, distance_l2, distance_o1, distance_o2, height";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
///
/// Stores readings and daily aggregates in a local SQLite database file.
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL journaling
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use elevator_telemetry::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./telemetry.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StorageError::corrupt_reading(format!("timestamp out of range: {millis}"))
        })
    }

    fn reading_from_row(row: &SqliteRow) -> StorageResult<SensorReading> {
        let real = |column: &str| -> StorageResult<f64> {
            Ok(row.try_get::<Option<f64>, _>(column)?.unwrap_or(0.0))
        };
        let distance = |column: &str| -> StorageResult<f64> {
            Ok(row
                .try_get::<Option<f64>, _>(column)?
                .unwrap_or(SensorReading::DEFAULT_DISTANCE))
        };

        let height = row
            .try_get::<Option<String>, _>("height")?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StorageError::corrupt_reading(format!("invalid height: {e}")))?;

        Ok(SensorReading {
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?)?,
            elevator_id: Some(row.try_get("elevator_id")?),
            current_a: real("current_a")?,
            temperature_c: real("temperature_c")?,
            vibration_ms2: real("vibration_ms2")?,
            voltage_v: real("voltage_v")?,
            speed: real("speed")?,
            state: row.try_get::<Option<i64>, _>("state")?.unwrap_or(0),
            distance_l1: distance("distance_l1")?,
            distance_l2: distance("distance_l2")?,
            distance_o1: distance("distance_o1")?,
            distance_o2: distance("distance_o2")?,
            height,
        })
    }

    fn aggregate_from_row(row: &SqliteRow) -> StorageResult<DailyAggregate> {
        let real = |column: &str| -> StorageResult<f64> {
            Ok(row.try_get::<Option<f64>, _>(column)?.unwrap_or(0.0))
        };
        let count = |column: &str| -> StorageResult<u32> {
            let value: i64 = row.try_get(column)?;
            u32::try_from(value).map_err(|_| {
                StorageError::corrupt_aggregate(format!("{column} out of range: {value}"))
            })
        };

        let date_str: String = row.try_get("reference_date")?;
        let reference_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
            StorageError::corrupt_aggregate(format!("invalid reference date '{date_str}': {e}"))
        })?;

        Ok(DailyAggregate {
            elevator_id: row.try_get("elevator_id")?,
            reference_date,
            temp_mean: real("temp_mean")?,
            temp_max: real("temp_max")?,
            vib_mean: real("vib_mean")?,
            vib_max: real("vib_max")?,
            current_mean: real("current_mean")?,
            current_max: real("current_max")?,
            voltage_mean: real("voltage_mean")?,
            high_current_count: count("high_current_count")?,
            total_readings: count("total_readings")?,
        })
    }

    async fn count_rows(&self, table: &'static str) -> StorageResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        let row: (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, reading))]
    async fn append_reading(
        &self,
        elevator_id: &str,
        reading: &SensorReading,
    ) -> StorageResult<()> {
        let height = reading
            .height
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::QueryFailed(format!("height is not serializable: {e}")))?;

        let sql = format!(
            "INSERT INTO sensor_readings ({READING_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        sqlx::query(&sql)
            .bind(elevator_id)
            .bind(reading.timestamp.timestamp_millis())
            .bind(reading.current_a)
            .bind(reading.temperature_c)
            .bind(reading.vibration_ms2)
            .bind(reading.voltage_v)
            .bind(reading.speed)
            .bind(reading.state)
            .bind(reading.distance_l1)
            .bind(reading.distance_l2)
            .bind(reading.distance_o1)
            .bind(reading.distance_o2)
            .bind(height)
            .execute(&self.pool)
            .await?;

        debug!("stored reading for {} at {}", elevator_id, reading.timestamp);
        Ok(())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn append_aggregates(&self, rows: Vec<DailyAggregate>) -> StorageResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        debug!("appending {} daily aggregates", rows.len());

        // One transaction: either the whole day lands or nothing does
        let mut tx = self.pool.begin().await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO daily_aggregates (
                    elevator_id, reference_date, temp_mean, temp_max, vib_mean, vib_max,
                    current_mean, current_max, voltage_mean, high_current_count, total_readings
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.elevator_id)
            .bind(row.reference_date.format(DATE_FORMAT).to_string())
            .bind(row.temp_mean)
            .bind(row.temp_max)
            .bind(row.vib_mean)
            .bind(row.vib_max)
            .bind(row.current_mean)
            .bind(row.current_max)
            .bind(row.voltage_mean)
            .bind(i64::from(row.high_current_count))
            .bind(i64::from(row.total_readings))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("aggregate batch committed");
        Ok(())
    }

    #[instrument(skip(self), fields(elevator_id = ?query.elevator_id))]
    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<SensorReading>> {
        let start = query.start.timestamp_millis();
        let end = query.end.timestamp_millis();

        let rows = match &query.elevator_id {
            Some(elevator_id) => {
                let sql = format!(
                    "SELECT {READING_COLUMNS} FROM sensor_readings \
                     WHERE elevator_id = ? AND timestamp >= ? AND timestamp < ? \
                     ORDER BY timestamp ASC, id ASC"
                );
                sqlx::query(&sql)
                    .bind(elevator_id)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {READING_COLUMNS} FROM sensor_readings \
                     WHERE timestamp >= ? AND timestamp < ? \
                     ORDER BY timestamp ASC, id ASC"
                );
                sqlx::query(&sql)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let readings = rows
            .iter()
            .map(Self::reading_from_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("range query returned {} readings", readings.len());
        Ok(readings)
    }

    #[instrument(skip(self))]
    async fn query_history(&self, elevator_id: &str) -> StorageResult<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM sensor_readings \
             WHERE elevator_id = ? \
             ORDER BY timestamp ASC, id ASC"
        );

        let rows = sqlx::query(&sql)
            .bind(elevator_id)
            .fetch_all(&self.pool)
            .await?;

        let readings = rows
            .iter()
            .map(Self::reading_from_row)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!("history query returned {} readings", readings.len());
        Ok(readings)
    }

    #[instrument(skip(self))]
    async fn query_aggregates(&self, elevator_id: &str) -> StorageResult<Vec<DailyAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT elevator_id, reference_date, temp_mean, temp_max, vib_mean, vib_max,
                   current_mean, current_max, voltage_mean, high_current_count, total_readings
            FROM daily_aggregates
            WHERE elevator_id = ?
            ORDER BY reference_date DESC, id DESC
            "#,
        )
        .bind(elevator_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::aggregate_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let readings = self.count_rows("sensor_readings").await?;
        let aggregates = self.count_rows("daily_aggregates").await?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(format!(
            "SQLite: {} readings, {} aggregates, {:.2} MB on disk",
            readings,
            aggregates,
            file_size as f64 / 1_000_000.0
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
