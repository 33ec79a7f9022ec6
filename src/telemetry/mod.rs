//! Telemetry Client
//!
//! Keeps a subscription to the sensor topics on an MQTT broker and turns
//! inbound messages into reading updates.
//!
//! - **client**: rumqttc event loop, reconnect policy and shutdown
//! - **connection**: Broker connection state shared with the status API
//! - **ingest**: Message → store update → hub broadcast
//! - **parser**: Topic mapping and payload decoding
//! - **sink**: Persistence hook for accepted readings
//!
//! # Flow
//!
//! ```text
//! broker ──publish──▶ EventLoop task ──▶ Ingestor ──update──▶ ReadingStore
//!                                           │
//!                                           ├──broadcast──▶ BroadcastHub
//!                                           └──spawn──────▶ ReadingSink
//! ```
//!
//! Malformed payloads are dropped and logged. Connection errors flip the
//! broker state to disconnected and trigger a fixed-interval retry; they are
//! never fatal.

pub mod client;
pub mod connection;
pub mod ingest;
pub mod parser;
pub mod sink;

pub use client::{
    generate_client_id, Protocol, TelemetryClient, TelemetryConfig, TelemetryError,
    TelemetryHandle,
};
pub use connection::{BrokerStatus, ConnectionState};
pub use ingest::Ingestor;
pub use parser::{
    parse_payload, IngestError, TopicMap, DEFAULT_HUMIDITY_TOPIC, DEFAULT_TEMPERATURE_TOPIC,
};
pub use sink::{LogSink, NoopSink, ReadingRecord, ReadingSink, SinkError};
