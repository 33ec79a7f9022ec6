//! # Envwatch
//!
//! Real-time environmental sensor ingestion. Temperature and humidity
//! readings arrive over MQTT, land in a shared in-memory store and are
//! pushed to every connected WebSocket dashboard.
//!
//! ## Features
//!
//! - **Resilient ingestion**: Reconnects to the broker forever on a fixed interval
//! - **Consistent snapshots**: Readers always get a complete, copied snapshot
//! - **Live fan-out**: Every accepted reading is pushed to all subscribers
//! - **Self-healing hub**: Stalled or closed subscribers are evicted
//! - **Polling API**: Snapshot and status endpoints for plain HTTP clients
//!
//! ## Modules
//!
//! - [`readings`]: Shared reading store and snapshot types
//! - [`telemetry`]: MQTT client, message parsing and persistence hook
//! - [`websocket`]: Broadcast hub and WebSocket handler
//! - [`status`]: Read-only snapshot and status views
//! - [`api`]: HTTP API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use envwatch::readings::ReadingStore;
//! use envwatch::telemetry::{BrokerStatus, Ingestor, TelemetryClient, TelemetryConfig, TopicMap};
//! use envwatch::websocket::{BroadcastHub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(ReadingStore::new("greenhouse.example.com"));
//!     let hub = Arc::new(BroadcastHub::new(Arc::clone(&store), HubConfig::default()));
//!     let broker = BrokerStatus::new();
//!
//!     let ingestor = Ingestor::new(TopicMap::default(), Arc::clone(&store), Arc::clone(&hub));
//!     let telemetry = TelemetryClient::new(
//!         TelemetryConfig::new("localhost", 1883),
//!         ingestor,
//!         broker.clone(),
//!     )
//!     .start()?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     println!("connected: {}, snapshot: {:?}", broker.is_connected(), store.get());
//!
//!     telemetry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod readings;
pub mod status;
pub mod telemetry;
pub mod websocket;

// Re-export top-level types for convenience
pub use readings::{Quantity, Reading, ReadingStore, ReadingValue, Snapshot};

pub use telemetry::{
    BrokerStatus, ConnectionState, IngestError, Ingestor, ReadingSink, TelemetryClient,
    TelemetryConfig, TelemetryError, TelemetryHandle, TopicMap,
};

pub use websocket::{websocket_handler, BroadcastHub, HubConfig, HubError, ServerMessage};

pub use status::{ServiceStatus, StatusReporter};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, MonitorConfig, MqttConfig};
