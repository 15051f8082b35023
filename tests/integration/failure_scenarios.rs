//! Failure isolation between the real-time path and storage

use std::sync::Arc;
use std::time::{Duration, Instant};

use elevator_telemetry::{
    SensorReading,
    actors::RelayError,
    analysis::{AggregateReport, AnomalyDetector, StatisticsReport, StatisticsReporter},
    config::{HubConfig, RelayConfig},
    normalizer::normalize,
    storage::StorageBackend,
};

use crate::helpers::{
    StallingBackend, UnreachableBackend, at, reading_at, sensor_payload, spawn_pipeline, store,
};

#[tokio::test]
async fn test_slow_storage_never_delays_broadcast() {
    let storage = Arc::new(StallingBackend::new(Duration::from_secs(5)));
    let pipeline = spawn_pipeline(
        storage.clone(),
        HubConfig::default(),
        RelayConfig { timeout_ms: 50 },
    );
    let mut subscription = pipeline.hub.subscribe().await.unwrap();

    let started = Instant::now();
    let mut tickets = Vec::new();
    for i in 0..5 {
        let reading = normalize(&sensor_payload("elev-1", i as f64, 30.0));
        tickets.push(pipeline.relay.persist(reading.clone()));
        pipeline.hub.publish(&reading).await.unwrap();
    }

    for i in 0..5 {
        let reading = SensorReading::from_wire(&subscription.recv().await.unwrap()).unwrap();
        assert_eq!(reading.current_a, i as f64);
    }
    assert!(started.elapsed() < Duration::from_millis(500));

    for ticket in tickets {
        assert!(matches!(ticket.outcome().await, Err(RelayError::Timeout(_))));
    }

    assert_eq!(pipeline.relay.stats().dropped, 5);
    assert!(storage.inner.query_history("elev-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_storage_is_isolated_per_destination() {
    let pipeline = spawn_pipeline(
        Arc::new(UnreachableBackend),
        HubConfig::default(),
        RelayConfig::default(),
    );
    let mut subscription = pipeline.hub.subscribe().await.unwrap();

    let reading = normalize(&sensor_payload("elev-1", 4.0, 30.0));
    let ticket = pipeline.relay.persist(reading.clone());
    pipeline.hub.publish(&reading).await.unwrap();

    assert!(matches!(ticket.outcome().await, Err(RelayError::Storage(_))));
    assert!(subscription.recv().await.is_some());
}

#[tokio::test]
async fn test_query_paths_report_errors_as_values() {
    let storage: Arc<dyn StorageBackend> = Arc::new(UnreachableBackend);

    let statistics = StatisticsReporter::new(Arc::clone(&storage)).report("e1").await;
    let StatisticsReport::Error { message } = statistics else {
        panic!("expected an error outcome, got {statistics:?}");
    };
    assert!(message.contains("unreachable"));

    let aggregates = AnomalyDetector::new(storage).report("e1").await;
    assert!(matches!(aggregates, AggregateReport::Error { .. }));
}

#[tokio::test]
async fn test_failed_aggregation_run_is_not_retried() {
    let storage = Arc::new(StallingBackend::new(Duration::ZERO));
    let day = chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    store(
        storage.as_ref(),
        &[reading_at("e1", at(day, 10, 0), 11.0, 30.0)],
    )
    .await;

    let pipeline = spawn_pipeline(storage.clone(), HubConfig::default(), RelayConfig::default());

    assert!(pipeline.scheduler.run_now(day).await.is_err());

    let stats = pipeline.scheduler.get_stats().await.unwrap();
    assert_eq!(stats.runs_failed, 1);
    assert_eq!(stats.runs_completed, 0);
    assert!(storage.query_aggregates("e1").await.unwrap().is_empty());

    // The actor survives a failed run
    let other_day = day.succ_opt().unwrap();
    let run = pipeline.scheduler.run_now(other_day).await.unwrap();
    assert_eq!(run.rows_written, 0);
}

#[tokio::test]
async fn test_stalled_subscriber_is_dropped_not_waited_for() {
    let (_, pipeline) = crate::helpers::memory_pipeline();
    let hub = pipeline.hub.clone();

    let stalled = hub.subscribe().await.unwrap();
    let mut healthy = hub.subscribe().await.unwrap();

    let buffer = HubConfig::default().subscriber_buffer;
    for i in 0..buffer + 10 {
        hub.publish(&normalize(&sensor_payload("elev-1", i as f64, 20.0)))
            .await
            .unwrap();
        assert!(healthy.recv().await.is_some());
    }

    let stats = hub.get_stats().await.unwrap();
    assert_eq!(stats.subscribers, 1);
    assert_eq!(stats.evicted, 1);

    drop(stalled);
}
