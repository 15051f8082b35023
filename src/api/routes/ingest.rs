//! Sensor ingestion endpoint

use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::{trace, warn};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::IngestResponse,
};
use crate::normalizer;

/// POST /api/v1/sensor
///
/// Normalizes the payload, then hands the reading to the persistence relay
/// and the broadcast hub. Neither outcome is reported to the sensor: once
/// the payload is a non-empty JSON object the answer is a success. Number
/// literals without a finite value are read as absent fields.
pub async fn receive_reading(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    let text = std::str::from_utf8(&body)
        .map_err(|e| ApiError::InvalidRequest(format!("payload is not UTF-8: {e}")))?;

    let raw = match serde_json::from_str::<Value>(&normalizer::null_non_finite(text)) {
        Ok(Value::Object(map)) if !map.is_empty() => map,
        Ok(_) => {
            return Err(ApiError::InvalidRequest(
                "payload must be a non-empty JSON object".to_string(),
            ));
        }
        Err(e) => {
            return Err(ApiError::InvalidRequest(format!("invalid JSON payload: {e}")));
        }
    };

    let reading = normalizer::normalize(&raw);
    trace!("normalized reading: {reading:?}");

    // The ticket is dropped: the write finishes on its own after we reply
    let _ticket = state.relay.persist(reading.clone());

    if let Err(e) = state.hub.publish(&reading).await {
        warn!("failed to broadcast reading: {e}");
    }

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        message: "reading normalized and relayed".to_string(),
    }))
}
