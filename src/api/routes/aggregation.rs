//! Manual aggregation trigger

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::actors::scheduler::reference_date_for;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::AggregationRunResponse,
};

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    /// Day to aggregate (YYYY-MM-DD, default: yesterday in UTC)
    date: Option<NaiveDate>,
}

/// POST /api/v1/aggregation/run
///
/// Runs through the scheduler actor, so it never overlaps a timer run.
/// Running a day twice stores its rows twice.
pub async fn run_aggregation(
    State(state): State<ApiState>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> ApiResult<Json<AggregationRunResponse>> {
    let Query(query) = query.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let date = query.date.unwrap_or_else(|| reference_date_for(Utc::now()));
    let run = state.scheduler.run_now(date).await?;

    Ok(Json(AggregationRunResponse {
        status: "success".to_string(),
        run,
    }))
}
