//! SchedulerActor - daily aggregation of the previous day
//!
//! Once per day, at a fixed UTC wall-clock time, the actor reads every stored
//! reading of the previous calendar day, reduces them into one
//! [`DailyAggregate`](crate::storage::DailyAggregate) per elevator and
//! appends the rows in one batch.
//!
//! Runs are serialized: timer triggers and manual `RunNow` commands are
//! handled by the same loop, so two runs never overlap. A trigger fires at
//! most once; a failed run is logged and counted but never retried, and a
//! missed day is not backfilled.
//!
//! Re-running a date appends its rows again. Storage is append-only.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, error, info, instrument};

use super::messages::{AggregationRun, SchedulerCommand, SchedulerStats};
use crate::analysis::aggregate_day;
use crate::config::SchedulerConfig;
use crate::storage::{QueryRange, StorageBackend, StorageResult};

/// Wall-clock time of the daily trigger (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> anyhow::Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid daily schedule {hour:02}:{minute:02}"))?;
        Ok(Self { time })
    }

    /// First trigger strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        }
    }
}

/// The calendar day a trigger at `trigger` aggregates
pub fn reference_date_for(trigger: DateTime<Utc>) -> NaiveDate {
    let today = trigger.date_naive();
    today.pred_opt().unwrap_or(today)
}

/// Aggregate one day of stored readings and append the result
///
/// A day without readings writes nothing.
#[instrument(skip(backend))]
pub async fn run_aggregation(
    backend: &dyn StorageBackend,
    date: NaiveDate,
) -> StorageResult<AggregationRun> {
    let readings = backend.query_range(QueryRange::for_day(date)).await?;

    if readings.is_empty() {
        info!("no readings stored for {date}, nothing to aggregate");
        return Ok(AggregationRun {
            reference_date: date,
            readings: 0,
            rows_written: 0,
        });
    }

    let rows = aggregate_day(date, &readings);
    let rows_written = rows.len();

    if rows_written > 0 {
        backend.append_aggregates(rows).await?;
    }

    info!(
        "aggregated {} readings into {} rows for {date}",
        readings.len(),
        rows_written
    );

    Ok(AggregationRun {
        reference_date: date,
        readings: readings.len(),
        rows_written,
    })
}

struct SchedulerActor {
    backend: Arc<dyn StorageBackend>,
    schedule: DailySchedule,
    enabled: bool,
    last_trigger: Option<DateTime<Utc>>,
    stats: SchedulerStats,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl SchedulerActor {
    #[instrument(skip(self))]
    async fn run(mut self) {
        if self.enabled {
            debug!(
                "starting scheduler actor, next trigger at {}",
                self.schedule.next_after(Utc::now())
            );
        } else {
            debug!("starting scheduler actor with the daily trigger disabled");
        }

        loop {
            let now = Utc::now();
            // Never fire the same trigger twice, even if the clock steps back
            let next = self
                .schedule
                .next_after(self.last_trigger.map_or(now, |last| last.max(now)));
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = time::sleep(wait), if self.enabled => {
                    self.last_trigger = Some(next);
                    let date = reference_date_for(next);
                    debug!("daily trigger fired for {date}");
                    let _ = self.run_for(date).await;
                }

                cmd = self.command_rx.recv() => match cmd {
                    Some(SchedulerCommand::RunNow { date, respond_to }) => {
                        debug!("manual aggregation requested for {date}");
                        let result = self.run_for(date).await;
                        let _ = respond_to.send(result);
                    }
                    Some(SchedulerCommand::GetStats { respond_to }) => {
                        let _ = respond_to.send(self.stats.clone());
                    }
                    Some(SchedulerCommand::Shutdown) => {
                        debug!("shutting down scheduler actor");
                        break;
                    }
                    None => {
                        debug!("command channel closed, shutting down");
                        break;
                    }
                },
            }
        }
    }

    async fn run_for(&mut self, date: NaiveDate) -> anyhow::Result<AggregationRun> {
        match run_aggregation(self.backend.as_ref(), date).await {
            Ok(run) => {
                self.stats.runs_completed += 1;
                self.stats.last_reference_date = Some(date);
                self.stats.last_rows_written = Some(run.rows_written);
                Ok(run)
            }
            Err(e) => {
                self.stats.runs_failed += 1;
                error!("aggregation for {date} failed: {e}");
                Err(anyhow::anyhow!("aggregation for {date} failed: {e}"))
            }
        }
    }
}

/// Handle for controlling the SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor
    ///
    /// Fails if the configured trigger time is not a valid time of day.
    pub fn spawn(
        backend: Arc<dyn StorageBackend>,
        config: &SchedulerConfig,
    ) -> anyhow::Result<Self> {
        let schedule = DailySchedule::new(config.hour, config.minute)?;
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor {
            backend,
            schedule,
            enabled: config.enabled,
            last_trigger: None,
            stats: SchedulerStats::default(),
            command_rx: cmd_rx,
        };
        tokio::spawn(actor.run());

        Ok(Self { sender: cmd_tx })
    }

    /// Aggregate `date` now, queued behind any run in progress
    pub async fn run_now(&self, date: NaiveDate) -> anyhow::Result<AggregationRun> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow {
                date,
                respond_to: tx,
            })
            .await?;

        rx.await?
    }

    /// Get scheduler statistics
    pub async fn get_stats(&self) -> Option<SchedulerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
    }
}
