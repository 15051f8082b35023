//! REST API and WebSocket server for the telemetry hub
//!
//! ## Endpoints
//!
//! - `POST /api/v1/sensor` - Ingest one raw sensor payload
//! - `GET /api/v1/stream` - WebSocket stream of normalized readings
//! - `GET /api/v1/elevators/{id}/aggregates` - Daily aggregates with anomaly flags
//! - `GET /api/v1/elevators/{id}/statistics` - Descriptive statistics over history
//! - `POST /api/v1/aggregation/run?date=YYYY-MM-DD` - Manual aggregation run
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Pipeline counters

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, IngestResponse, StatsResponse};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::HttpConfig;

/// Build the router with every endpoint
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/sensor", post(routes::ingest::receive_reading))
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .route(
            "/api/v1/elevators/:id/aggregates",
            get(routes::elevators::get_aggregates),
        )
        .route(
            "/api/v1/elevators/:id/statistics",
            get(routes::elevators::get_statistics),
        )
        .route(
            "/api/v1/aggregation/run",
            post(routes::aggregation::run_aggregation),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: &HttpConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
