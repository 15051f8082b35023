//! Stored readings -> daily aggregates -> anomaly flags, plus statistics

use chrono::{Days, NaiveDate};
use elevator_telemetry::{
    analysis::{AggregateReport, AnomalyDetector, StatisticsReport, StatisticsReporter},
    storage::StorageBackend,
};

use crate::helpers::{at, memory_pipeline, reading_at, store};

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

#[tokio::test]
async fn test_daily_rows_per_elevator() {
    let (storage, pipeline) = memory_pipeline();
    let day = first_day();

    store(
        storage.as_ref(),
        &[
            reading_at("a", at(day, 8, 0), 5.0, 30.0),
            reading_at("a", at(day, 12, 0), 12.0, 36.0),
            reading_at("a", at(day, 23, 59), 8.0, 33.0),
            reading_at("b", at(day, 9, 0), 3.0, 25.0),
            // Belongs to the next day
            reading_at("b", at(day + Days::new(1), 0, 0), 50.0, 90.0),
        ],
    )
    .await;

    let run = pipeline.scheduler.run_now(day).await.unwrap();
    assert_eq!(run.readings, 4);
    assert_eq!(run.rows_written, 2);

    let a = storage.query_aggregates("a").await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].current_max, 12.0);
    assert_eq!(a[0].high_current_count, 1);
    assert_eq!(a[0].total_readings, 3);
    assert_eq!(a[0].temp_max, 36.0);

    let b = storage.query_aggregates("b").await.unwrap();
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].current_max, 3.0);
    assert_eq!(b[0].high_current_count, 0);

    // An elevator with no readings that day gets no row at all
    assert!(storage.query_aggregates("c").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_month_of_aggregates_flags_the_bad_day() {
    let (storage, pipeline) = memory_pipeline();

    for offset in 0..20u64 {
        let day = first_day() + Days::new(offset);
        let bad_day = offset == 13;

        let readings: Vec<_> = (0..6)
            .map(|hour| {
                let (current, temperature) = if bad_day {
                    (25.0 + hour as f64, 80.0)
                } else {
                    (4.0 + (hour % 3) as f64, 30.0 + (offset % 4) as f64)
                };
                reading_at("e1", at(day, hour * 4, 0), current, temperature)
            })
            .collect();
        store(storage.as_ref(), &readings).await;

        pipeline.scheduler.run_now(day).await.unwrap();
    }

    let report = AnomalyDetector::new(storage.clone()).report("e1").await;
    let AggregateReport::Success { rows, info } = report else {
        panic!("expected populated aggregates, got {report:?}");
    };

    assert!(info.is_none());
    assert_eq!(rows.len(), 20);

    // Most recent first
    assert!(rows.windows(2).all(|w| w[0].aggregate.reference_date > w[1].aggregate.reference_date));

    let bad_date = first_day() + Days::new(13);
    let bad_row = rows
        .iter()
        .find(|r| r.aggregate.reference_date == bad_date)
        .unwrap();
    assert!(bad_row.anomalous);
    assert_eq!(bad_row.aggregate.high_current_count, 6);

    let flagged = rows.iter().filter(|r| r.anomalous).count();
    assert!((1..=2).contains(&flagged), "flagged {flagged} of 20");

    // Same input, same flags
    let again = AnomalyDetector::new(storage.clone()).report("e1").await;
    let AggregateReport::Success { rows: rows_again, .. } = again else {
        panic!("expected populated aggregates");
    };
    assert_eq!(rows, rows_again);
}

#[tokio::test]
async fn test_single_day_is_underpowered() {
    let (storage, pipeline) = memory_pipeline();
    store(
        storage.as_ref(),
        &[reading_at("e1", at(first_day(), 10, 0), 11.0, 30.0)],
    )
    .await;
    pipeline.scheduler.run_now(first_day()).await.unwrap();

    let report = AnomalyDetector::new(storage.clone()).report("e1").await;

    let AggregateReport::Success { rows, info } = report else {
        panic!("expected populated aggregates");
    };
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].anomalous);
    assert!(info.is_some());
}

#[tokio::test]
async fn test_statistics_over_history() {
    let (storage, _pipeline) = memory_pipeline();
    let day = first_day();

    store(
        storage.as_ref(),
        &[
            reading_at("e1", at(day, 14, 0), 9.0, 40.0),
            reading_at("e1", at(day, 8, 30), 3.0, 28.0),
            reading_at("e1", at(day + Days::new(2), 7, 15), 9.0, 35.0),
        ],
    )
    .await;

    let reporter = StatisticsReporter::new(storage.clone());

    let StatisticsReport::Success(report) = reporter.report("e1").await else {
        panic!("expected a populated statistics report");
    };

    assert_eq!(report.total_readings, 3);
    assert_eq!(report.period_start, at(day, 8, 30));
    assert_eq!(report.period_end, at(day + Days::new(2), 7, 15));
    assert_eq!(report.metrics.current.mean, "7.00 A");
    assert_eq!(report.metrics.current.std, "3.46 A");
    assert_eq!(report.metrics.current.median, "9.00 A");
    assert_eq!(report.metrics.temperature.max, "40.00 °C");
    assert_eq!(report.peaks.current.value, "9.00 A");
    assert_eq!(report.peaks.current.at, "2024-03-01 14:00:00");
    assert_eq!(report.peaks.voltage.value, "18.00 V");

    assert!(matches!(
        reporter.report("nobody").await,
        StatisticsReport::Empty { .. }
    ));
}
