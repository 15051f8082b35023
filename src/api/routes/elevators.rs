//! Per-elevator query endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::analysis::{AggregateReport, StatisticsReport};
use crate::api::state::ApiState;

/// GET /api/v1/elevators/:id/aggregates
///
/// Daily aggregates, most recent first, each flagged with `anomalia`.
pub async fn get_aggregates(
    State(state): State<ApiState>,
    Path(elevator_id): Path<String>,
) -> Response {
    let report = state.anomalies.report(&elevator_id).await;
    let status = match report {
        AggregateReport::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    (status, Json(report)).into_response()
}

/// GET /api/v1/elevators/:id/statistics
pub async fn get_statistics(
    State(state): State<ApiState>,
    Path(elevator_id): Path<String>,
) -> Response {
    let report = state.statistics.report(&elevator_id).await;
    let status = match report {
        StatisticsReport::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    (status, Json(report)).into_response()
}
