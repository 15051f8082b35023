//! In-memory storage backend (no persistence)
//!
//! This backend keeps readings and aggregates in process memory.
//! It's useful for:
//! - Testing without database dependencies
//! - Running the hub with `"backend": "none"` for a pure live dashboard
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded**: Nothing is ever evicted

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, QueryRange, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::DailyAggregate;
use crate::SensorReading;

/// In-memory storage backend
#[derive(Default)]
pub struct MemoryBackend {
    /// Readings grouped by elevator, in arrival order
    readings: RwLock<HashMap<String, Vec<SensorReading>>>,

    /// Aggregate rows in append order
    aggregates: RwLock<Vec<DailyAggregate>>,

    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed("in-memory"));
        }
        Ok(())
    }

    fn sorted(mut readings: Vec<SensorReading>) -> Vec<SensorReading> {
        // Stable sort: equal timestamps keep arrival order
        readings.sort_by_key(|r| r.timestamp);
        readings
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn append_reading(
        &self,
        elevator_id: &str,
        reading: &SensorReading,
    ) -> StorageResult<()> {
        self.ensure_open()?;

        let mut stored = reading.clone();
        stored.elevator_id = Some(elevator_id.to_string());

        self.readings
            .write()
            .await
            .entry(elevator_id.to_string())
            .or_default()
            .push(stored);

        Ok(())
    }

    async fn append_aggregates(&self, rows: Vec<DailyAggregate>) -> StorageResult<()> {
        self.ensure_open()?;
        debug!("appending {} aggregates in memory", rows.len());
        self.aggregates.write().await.extend(rows);
        Ok(())
    }

    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<SensorReading>> {
        self.ensure_open()?;

        let readings = self.readings.read().await;
        let matching = readings
            .iter()
            .flat_map(|(elevator_id, rows)| {
                rows.iter()
                    .filter(|r| query.contains(elevator_id, r.timestamp))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(Self::sorted(matching))
    }

    async fn query_history(&self, elevator_id: &str) -> StorageResult<Vec<SensorReading>> {
        self.ensure_open()?;

        let history = self
            .readings
            .read()
            .await
            .get(elevator_id)
            .cloned()
            .unwrap_or_default();

        Ok(Self::sorted(history))
    }

    async fn query_aggregates(&self, elevator_id: &str) -> StorageResult<Vec<DailyAggregate>> {
        self.ensure_open()?;

        let mut rows: Vec<DailyAggregate> = self
            .aggregates
            .read()
            .await
            .iter()
            .filter(|row| row.elevator_id == elevator_id)
            .cloned()
            .collect();

        // Most recent date first; later appends first among equal dates
        rows.reverse();
        rows.sort_by(|a, b| b.reference_date.cmp(&a.reference_date));
        Ok(rows)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let healthy = self.ensure_open().is_ok();
        let total: usize = self.readings.read().await.values().map(Vec::len).sum();

        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "In-memory storage operational".to_string()
            } else {
                "In-memory storage closed".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_readings".to_string(), total.to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let readings = self.readings.read().await;
        let total: usize = readings.values().map(Vec::len).sum();

        Ok(format!(
            "In-Memory: {} readings across {} elevators, {} aggregates",
            total,
            readings.len(),
            self.aggregates.read().await.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
