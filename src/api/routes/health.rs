//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (broker connected)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Ready once the broker connection is up; a broker outage is not fatal,
/// so liveness stays green while readiness reports 503.
pub async fn readiness(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    if state.broker.is_connected() {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::ServiceUnavailable(format!(
            "MQTT broker {}",
            state.broker.state()
        )))
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.status.status();

    let overall_status = if status.mqtt { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: overall_status.to_string(),
        mqtt: status.mqtt,
        broker_state: state.broker.state().to_string(),
        websocket: status.websocket,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
