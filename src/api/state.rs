//! API shared state containing actor handles

use std::sync::Arc;
use std::time::Duration;

use crate::actors::{BroadcastHandle, PersistenceRelay, SchedulerHandle};
use crate::analysis::{AnomalyDetector, StatisticsReporter};
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Broadcast hub for live subscribers
    pub hub: BroadcastHandle,

    /// Best-effort writer for ingested readings
    pub relay: PersistenceRelay,

    /// Daily aggregation actor, also used for manual runs
    pub scheduler: SchedulerHandle,

    /// Storage backend for health and stats
    pub storage: Arc<dyn StorageBackend>,

    pub statistics: StatisticsReporter,

    pub anomalies: AnomalyDetector,

    /// WebSocket ping period
    pub keepalive: Duration,
}

impl ApiState {
    /// Create new API state; the query components share `storage`
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        hub: BroadcastHandle,
        relay: PersistenceRelay,
        scheduler: SchedulerHandle,
        keepalive: Duration,
    ) -> Self {
        Self {
            hub,
            relay,
            scheduler,
            statistics: StatisticsReporter::new(Arc::clone(&storage)),
            anomalies: AnomalyDetector::new(Arc::clone(&storage)),
            storage,
            keepalive,
        }
    }
}
