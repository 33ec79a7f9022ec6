//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::readings::ReadingStore;
use crate::status::StatusReporter;
use crate::telemetry::BrokerStatus;
use crate::websocket::BroadcastHub;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Read-only snapshot and status views
    pub status: StatusReporter,
    /// Broker connection state
    pub broker: BrokerStatus,
    /// WebSocket broadcast hub for live updates
    pub hub: Arc<BroadcastHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState from the process-wide components
    pub fn new(
        store: Arc<ReadingStore>,
        broker: BrokerStatus,
        hub: Arc<BroadcastHub>,
        config: ApiConfig,
    ) -> Self {
        Self {
            status: StatusReporter::new(store, broker.clone(), Arc::clone(&hub)),
            broker,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            cors_origins: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&crate::config::ApiConfig> for ApiConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_origins: config.cors_origins.clone(),
        }
    }
}
