//! System statistics endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::StatsResponse};

/// GET /api/v1/stats
///
/// Returns hub, relay, scheduler and storage counters
pub async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        timestamp: chrono::Utc::now().to_rfc3339(),
        hub: state.hub.get_stats().await,
        relay: state.relay.stats(),
        scheduler: state.scheduler.get_stats().await,
        storage: state.storage.get_stats().await.ok(),
    })
}
