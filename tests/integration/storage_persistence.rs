//! End-to-end pipeline against SQLite

use std::sync::Arc;

use chrono::NaiveDate;
use elevator_telemetry::{
    analysis::{AggregateReport, AnomalyDetector},
    config::{HubConfig, RelayConfig},
    normalizer::normalize_at,
    storage::{StorageBackend, sqlite::SqliteBackend},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio_test::assert_ok;

use crate::helpers::{at, reading_at, sensor_payload, spawn_pipeline, store};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
}

#[tokio::test]
async fn test_relay_writes_survive_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("telemetry.db");

    let reading = normalize_at(&sensor_payload("elev-9", 6.5, 29.0), at(day(), 9, 30));
    {
        let storage = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        let pipeline = spawn_pipeline(storage.clone(), HubConfig::default(), RelayConfig::default());

        pipeline.relay.persist(reading.clone()).outcome().await.unwrap();
        assert_ok!(storage.close().await);
    }

    let reopened = SqliteBackend::new(&db_path).await.unwrap();
    let history = reopened.query_history("elev-9").await.unwrap();

    assert_eq!(history, vec![reading]);
}

#[tokio::test]
async fn test_aggregation_and_detection_on_sqlite() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(SqliteBackend::new(dir.path().join("telemetry.db")).await.unwrap());
    let pipeline = spawn_pipeline(storage.clone(), HubConfig::default(), RelayConfig::default());

    store(
        storage.as_ref(),
        &[
            reading_at("e1", at(day(), 8, 0), 5.0, 30.0),
            reading_at("e1", at(day(), 12, 0), 12.0, 35.0),
            reading_at("e1", at(day(), 18, 0), 8.0, 32.0),
        ],
    )
    .await;

    let run = pipeline.scheduler.run_now(day()).await.unwrap();
    assert_eq!(run.rows_written, 1);

    let rows = storage.query_aggregates("e1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].reference_date, day());
    assert_eq!(rows[0].current_max, 12.0);
    assert_eq!(rows[0].high_current_count, 1);
    assert_eq!(rows[0].total_readings, 3);

    let AggregateReport::Success { rows, info } =
        AnomalyDetector::new(storage.clone()).report("e1").await
    else {
        panic!("expected populated aggregates");
    };
    assert_eq!(rows.len(), 1);
    assert!(info.is_some());
}

#[tokio::test]
async fn test_rerunning_a_day_duplicates_rows() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(SqliteBackend::new(dir.path().join("telemetry.db")).await.unwrap());
    let pipeline = spawn_pipeline(storage.clone(), HubConfig::default(), RelayConfig::default());

    store(
        storage.as_ref(),
        &[reading_at("e1", at(day(), 8, 0), 5.0, 30.0)],
    )
    .await;

    pipeline.scheduler.run_now(day()).await.unwrap();
    pipeline.scheduler.run_now(day()).await.unwrap();

    let rows = storage.query_aggregates("e1").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], rows[1]);
}
