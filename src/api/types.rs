//! Shared API response types
//!
//! Query endpoints answer with the report enums from [`crate::analysis`];
//! the types here cover the remaining endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::actors::messages::{AggregationRun, HubStats, RelayStats, SchedulerStats};

/// Response for POST /api/v1/sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
}

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Response for GET /api/v1/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub hub: Option<HubStats>,
    pub relay: RelayStats,
    pub scheduler: Option<SchedulerStats>,
    pub storage: Option<String>,
}

/// Response for POST /api/v1/aggregation/run
#[derive(Debug, Clone, Serialize)]
pub struct AggregationRunResponse {
    pub status: String,
    #[serde(flatten)]
    pub run: AggregationRun,
}
