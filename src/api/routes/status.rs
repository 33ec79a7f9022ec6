//! Status Route
//!
//! - GET /api/v1/status - Broker connectivity and subscriber count

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::status::ServiceStatus;

/// GET /api/v1/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ServiceStatus> {
    Json(state.status.status())
}
