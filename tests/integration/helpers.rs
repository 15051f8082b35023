//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use elevator_telemetry::{
    SensorReading,
    actors::{BroadcastHandle, PersistenceRelay, SchedulerHandle},
    config::{HubConfig, RelayConfig, SchedulerConfig},
    storage::{
        DailyAggregate, HealthStatus, MemoryBackend, QueryRange, StorageBackend, StorageError,
        StorageResult,
    },
};
use serde_json::{Map, Value, json};

/// The pipeline components wired to one backend
pub struct Pipeline {
    pub storage: Arc<dyn StorageBackend>,
    pub hub: BroadcastHandle,
    pub relay: PersistenceRelay,
    pub scheduler: SchedulerHandle,
}

pub fn spawn_pipeline(
    storage: Arc<dyn StorageBackend>,
    hub: HubConfig,
    relay: RelayConfig,
) -> Pipeline {
    let scheduler = SchedulerHandle::spawn(Arc::clone(&storage), &manual_scheduler()).unwrap();

    Pipeline {
        hub: BroadcastHandle::spawn(hub),
        relay: PersistenceRelay::new(Arc::clone(&storage), &relay),
        scheduler,
        storage,
    }
}

pub fn memory_pipeline() -> (Arc<MemoryBackend>, Pipeline) {
    let storage = Arc::new(MemoryBackend::new());
    let pipeline = spawn_pipeline(storage.clone(), HubConfig::default(), RelayConfig::default());
    (storage, pipeline)
}

/// Scheduler that only runs on request
pub fn manual_scheduler() -> SchedulerConfig {
    SchedulerConfig {
        enabled: false,
        ..SchedulerConfig::default()
    }
}

pub fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// A firmware-style payload
pub fn sensor_payload(elevator_id: &str, current: f64, temperature: f64) -> Map<String, Value> {
    payload(json!({
        "id_elevador": elevator_id,
        "ia": current,
        "temp_c": temperature,
        "vib_s1_ms2": 0.35,
        "velocidade": 1.2,
        "estado": 1,
        "dist_l1": 180,
        "altura": 4
    }))
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
}

pub fn reading_at(
    elevator_id: &str,
    timestamp: DateTime<Utc>,
    current: f64,
    temperature: f64,
) -> SensorReading {
    let mut reading = SensorReading::new(Some(elevator_id.to_string()), timestamp);
    reading.current_a = current;
    reading.temperature_c = temperature;
    reading.vibration_ms2 = current / 20.0;
    reading.voltage_v = (current * 2.0).clamp(0.0, 20.0);
    reading
}

/// Store readings directly, bypassing the relay
pub async fn store(storage: &dyn StorageBackend, readings: &[SensorReading]) {
    for reading in readings {
        let elevator_id = reading.elevator_id.as_deref().unwrap();
        storage.append_reading(elevator_id, reading).await.unwrap();
    }
}

/// Poll until `check` holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Backend whose every operation fails
pub struct UnreachableBackend;

fn unreachable_storage<T>() -> StorageResult<T> {
    Err(StorageError::ConnectionFailed(
        "storage collaborator unreachable".to_string(),
    ))
}

#[async_trait]
impl StorageBackend for UnreachableBackend {
    async fn append_reading(&self, _: &str, _: &SensorReading) -> StorageResult<()> {
        unreachable_storage()
    }

    async fn append_aggregates(&self, _: Vec<DailyAggregate>) -> StorageResult<()> {
        unreachable_storage()
    }

    async fn query_range(&self, _: QueryRange) -> StorageResult<Vec<SensorReading>> {
        unreachable_storage()
    }

    async fn query_history(&self, _: &str) -> StorageResult<Vec<SensorReading>> {
        unreachable_storage()
    }

    async fn query_aggregates(&self, _: &str) -> StorageResult<Vec<DailyAggregate>> {
        unreachable_storage()
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        unreachable_storage()
    }

    async fn get_stats(&self) -> StorageResult<String> {
        unreachable_storage()
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Memory backend that stalls reading writes and refuses aggregate writes
pub struct StallingBackend {
    pub inner: MemoryBackend,
    pub write_delay: Duration,
}

impl StallingBackend {
    pub fn new(write_delay: Duration) -> Self {
        Self {
            inner: MemoryBackend::new(),
            write_delay,
        }
    }
}

#[async_trait]
impl StorageBackend for StallingBackend {
    async fn append_reading(&self, elevator_id: &str, reading: &SensorReading) -> StorageResult<()> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.append_reading(elevator_id, reading).await
    }

    async fn append_aggregates(&self, _: Vec<DailyAggregate>) -> StorageResult<()> {
        Err(StorageError::QueryFailed("aggregate table locked".to_string()))
    }

    async fn query_range(&self, query: QueryRange) -> StorageResult<Vec<SensorReading>> {
        self.inner.query_range(query).await
    }

    async fn query_history(&self, elevator_id: &str) -> StorageResult<Vec<SensorReading>> {
        self.inner.query_history(elevator_id).await
    }

    async fn query_aggregates(&self, elevator_id: &str) -> StorageResult<Vec<DailyAggregate>> {
        self.inner.query_aggregates(elevator_id).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn get_stats(&self) -> StorageResult<String> {
        self.inner.get_stats().await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}
