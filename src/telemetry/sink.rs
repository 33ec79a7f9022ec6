//! Persistence hook
//!
//! Accepted readings can be handed to a [`ReadingSink`] after the store is
//! updated. Records reach the sink through a bounded queue drained by one
//! worker task, so a slow or failing sink never delays or fails ingestion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::readings::Reading;

/// One accepted reading, as handed to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRecord {
    pub reading: Reading,
    pub recorded_at: DateTime<Utc>,
    pub domain: String,
}

/// Receiver of accepted readings (history writer, forwarder, ...)
#[async_trait]
pub trait ReadingSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Persist one reading
    async fn record(&self, record: &ReadingRecord) -> Result<(), SinkError>;
}

/// Errors a sink may report; they are logged and dropped
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Sink rejected reading: {0}")]
    Rejected(String),
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl ReadingSink for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    async fn record(&self, _record: &ReadingRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink that emits each reading as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ReadingSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn record(&self, record: &ReadingRecord) -> Result<(), SinkError> {
        tracing::info!(
            target: "envwatch::readings",
            quantity = %record.reading.quantity,
            value = %record.reading.value,
            unit = record.reading.unit,
            domain = %record.domain,
            recorded_at = %record.recorded_at,
            "Reading recorded"
        );
        Ok(())
    }
}
