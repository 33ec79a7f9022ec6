//! Data Transfer Objects
//!
//! Response types for the API endpoints that are not core types already.

use serde::Serialize;

use crate::readings::{Quantity, ReadingValue};

// ============================================
// READING DTOs
// ============================================

/// A single quantity's reading with its unit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    /// Quantity name
    pub quantity: Quantity,
    /// Value formatted to 2 decimals, or "N/A"
    pub value: ReadingValue,
    /// Unit of measure
    pub unit: String,
    /// Timestamp of the latest accepted message, or "N/A"
    pub last_updated: String,
    /// Deployment context
    pub domain: String,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Broker connection is up
    pub mqtt: bool,
    /// Broker connection state: connected, connecting, disconnected
    pub broker_state: String,
    /// Number of live WebSocket subscribers
    pub websocket: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
