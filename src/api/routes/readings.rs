//! Reading Routes
//!
//! Polling access to the current snapshot.
//!
//! - GET /api/v1/readings - Full snapshot
//! - GET /api/v1/readings/:quantity - One quantity with its unit

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::ReadingResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::readings::{Quantity, Snapshot};

/// GET /api/v1/readings
///
/// Current snapshot, identical to what WebSocket subscribers receive.
pub async fn current_snapshot(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.status.current_snapshot())
}

/// GET /api/v1/readings/:quantity
pub async fn get_reading(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ReadingResponse>> {
    let quantity = Quantity::from_name(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown quantity '{}'", name)))?;

    let snapshot = state.status.current_snapshot();

    Ok(Json(ReadingResponse {
        quantity,
        value: snapshot.value(quantity),
        unit: quantity.unit().to_string(),
        last_updated: snapshot.last_updated_string(),
        domain: snapshot.domain,
    }))
}
