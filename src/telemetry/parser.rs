//! Topic and payload parsing
//!
//! Maps broker topics to quantities and decodes plain-text decimal payloads.

use thiserror::Error;

use crate::readings::Quantity;

/// Default topic for temperature readings
pub const DEFAULT_TEMPERATURE_TOPIC: &str = "sensor/temperature";
/// Default topic for humidity readings
pub const DEFAULT_HUMIDITY_TOPIC: &str = "sensor/humidity";

/// Configured topic for each quantity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    topics: Vec<(Quantity, String)>,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE_TOPIC, DEFAULT_HUMIDITY_TOPIC)
    }
}

impl TopicMap {
    pub fn new(temperature: impl Into<String>, humidity: impl Into<String>) -> Self {
        Self {
            topics: vec![
                (Quantity::Temperature, temperature.into()),
                (Quantity::Humidity, humidity.into()),
            ],
        }
    }

    /// Topic configured for `quantity`
    pub fn topic(&self, quantity: Quantity) -> Option<&str> {
        self.topics
            .iter()
            .find(|(q, _)| *q == quantity)
            .map(|(_, t)| t.as_str())
    }

    /// Every configured topic, one per quantity
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|(_, t)| t.as_str())
    }

    /// Determine which quantity an inbound topic carries
    ///
    /// An exact match on a configured topic wins; otherwise the first
    /// quantity whose name appears in the topic is used.
    pub fn resolve(&self, topic: &str) -> Option<Quantity> {
        self.topics
            .iter()
            .find(|(_, t)| t == topic)
            .map(|(q, _)| *q)
            .or_else(|| {
                Quantity::ALL
                    .into_iter()
                    .find(|q| topic.contains(q.as_str()))
            })
    }
}

/// Decode a UTF-8 decimal payload
pub fn parse_payload(payload: &[u8]) -> Result<f64, IngestError> {
    let text = std::str::from_utf8(payload).map_err(|_| IngestError::InvalidUtf8)?;
    let trimmed = text.trim();

    let value: f64 = trimmed
        .parse()
        .map_err(|_| IngestError::InvalidPayload(truncate(trimmed)))?;

    if !value.is_finite() {
        return Err(IngestError::NonFinite(truncate(trimmed)));
    }

    Ok(value)
}

/// Keep log lines bounded when a device sends junk
fn truncate(text: &str) -> String {
    const MAX: usize = 64;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Reasons an inbound message is dropped
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("No quantity matches topic {0}")]
    UnknownTopic(String),

    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Payload is not a number: {0:?}")]
    InvalidPayload(String),

    #[error("Payload is not a finite number: {0:?}")]
    NonFinite(String),
}
