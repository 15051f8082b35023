//! Ingestion path: normalize, then broadcast and persist independently

use std::sync::Arc;

use elevator_telemetry::{
    SensorReading,
    actors::RelayError,
    config::{HubConfig, RelayConfig},
    normalizer::normalize,
    storage::{MemoryBackend, StorageBackend},
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::helpers::{eventually, memory_pipeline, payload, sensor_payload, spawn_pipeline};

#[tokio::test]
async fn test_subscriber_and_storage_see_the_same_reading() {
    let (storage, pipeline) = memory_pipeline();
    let mut subscription = pipeline.hub.subscribe().await.unwrap();

    let reading = normalize(&sensor_payload("elev-1", 12.5, 41.0));
    let ticket = pipeline.relay.persist(reading.clone());
    pipeline.hub.publish(&reading).await.unwrap();

    ticket.outcome().await.unwrap();

    let broadcast = SensorReading::from_wire(&subscription.recv().await.unwrap()).unwrap();
    let stored = storage.query_history("elev-1").await.unwrap();

    assert_eq!(broadcast, reading);
    assert_eq!(stored, vec![reading]);
    assert_eq!(broadcast.voltage_v, 20.0);
    assert_eq!(broadcast.distance_l1, 180.0);
    assert_eq!(broadcast.distance_o2, 200.0);
}

#[tokio::test]
async fn test_reading_without_id_is_broadcast_but_not_stored() {
    let (storage, pipeline) = memory_pipeline();
    let mut subscription = pipeline.hub.subscribe().await.unwrap();

    let reading = normalize(&payload(json!({"ia": 2.0, "temp_c": "31.5"})));
    let outcome = pipeline.relay.persist(reading.clone()).outcome().await;
    pipeline.hub.publish(&reading).await.unwrap();

    assert!(matches!(outcome, Err(RelayError::MissingElevatorId)));

    let broadcast = SensorReading::from_wire(&subscription.recv().await.unwrap()).unwrap();
    assert_eq!(broadcast.temperature_c, 31.5);
    assert!(broadcast.elevator_id.is_none());

    assert_eq!(storage.get_stats().await.unwrap(), "In-Memory: 0 readings across 0 elevators, 0 aggregates");
    assert_eq!(pipeline.relay.stats().skipped, 1);
}

#[tokio::test]
async fn test_concurrent_sensors_keep_per_source_order() {
    let storage = Arc::new(MemoryBackend::new());
    let pipeline = spawn_pipeline(
        storage.clone(),
        HubConfig {
            subscriber_buffer: 512,
            ..HubConfig::default()
        },
        RelayConfig::default(),
    );
    let mut subscription = pipeline.hub.subscribe().await.unwrap();

    let sensors = 8;
    let per_sensor = 25;

    let mut tasks = Vec::new();
    for sensor in 0..sensors {
        let hub = pipeline.hub.clone();
        let relay = pipeline.relay.clone();
        tasks.push(tokio::spawn(async move {
            for seq in 0..per_sensor {
                let reading = normalize(&payload(json!({
                    "id_elevador": format!("elev-{sensor}"),
                    "estado": seq,
                })));
                drop(relay.persist(reading.clone()));
                hub.publish(&reading).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut last_seen = vec![-1i64; sensors];
    for _ in 0..sensors * per_sensor {
        let reading = SensorReading::from_wire(&subscription.recv().await.unwrap()).unwrap();
        let sensor: usize = reading.elevator_id.unwrap()["elev-".len()..].parse().unwrap();

        assert!(reading.state > last_seen[sensor], "out of order for sensor {sensor}");
        last_seen[sensor] = reading.state;
    }
    assert!(last_seen.iter().all(|&seq| seq == per_sensor as i64 - 1));

    let relay = pipeline.relay.clone();
    let total = (sensors * per_sensor) as u64;
    assert!(eventually(|| {
        let relay = relay.clone();
        async move { relay.stats().persisted == total }
    })
    .await);
    assert_eq!(storage.query_history("elev-3").await.unwrap().len(), per_sensor);
}

#[tokio::test]
async fn test_late_subscriber_only_sees_new_readings() {
    let (_, pipeline) = memory_pipeline();

    pipeline
        .hub
        .publish(&normalize(&sensor_payload("elev-1", 1.0, 20.0)))
        .await
        .unwrap();

    let mut subscription = pipeline.hub.subscribe().await.unwrap();
    pipeline
        .hub
        .publish(&normalize(&sensor_payload("elev-1", 2.0, 20.0)))
        .await
        .unwrap();

    let reading = SensorReading::from_wire(&subscription.recv().await.unwrap()).unwrap();
    assert_eq!(reading.current_a, 2.0);
}
