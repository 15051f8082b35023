//! Message types for actor communication
//!
//! Commands are sent to a specific actor over its mpsc channel; queries carry
//! a oneshot sender for the reply. Stats types are plain snapshots and
//! serialize as-is into the `/api/v1/stats` payload.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::broadcast::SubscriberId;

/// Commands that can be sent to the BroadcastActor
#[derive(Debug)]
pub enum BroadcastCommand {
    /// Register a subscriber and hand back its receiving end
    Subscribe {
        respond_to: oneshot::Sender<anyhow::Result<(SubscriberId, mpsc::Receiver<Arc<str>>)>>,
    },

    /// Remove a subscriber; unknown ids are ignored
    Unsubscribe { id: SubscriberId },

    /// Deliver one serialized reading to every current subscriber
    Publish { payload: Arc<str> },

    GetStats {
        respond_to: oneshot::Sender<HubStats>,
    },

    /// Drop every subscriber and stop the actor
    Shutdown,
}

/// Broadcast hub statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HubStats {
    pub subscribers: usize,

    /// Readings handed to the hub
    pub published: u64,

    /// Successful enqueues, summed over subscribers
    pub delivered: u64,

    /// Subscribers removed because their queue was full or closed
    pub evicted: u64,
}

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Aggregate `date` immediately, outside the daily trigger
    RunNow {
        date: NaiveDate,
        respond_to: oneshot::Sender<anyhow::Result<AggregationRun>>,
    },

    GetStats {
        respond_to: oneshot::Sender<SchedulerStats>,
    },

    Shutdown,
}

/// Outcome of one successful aggregation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationRun {
    pub reference_date: NaiveDate,
    pub readings: usize,
    pub rows_written: usize,
}

/// Aggregation scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub last_reference_date: Option<NaiveDate>,
    pub last_rows_written: Option<usize>,
}

/// Persistence relay counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelayStats {
    /// Readings written before the deadline
    pub persisted: u64,

    /// Readings lost to a timeout or a storage failure
    pub dropped: u64,

    /// Readings without an elevator id, never sent to storage
    pub skipped: u64,
}
