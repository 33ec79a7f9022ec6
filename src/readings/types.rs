//! Core data types for sensor readings
//!
//! This module defines the values flowing from the broker to dashboards:
//! - `Quantity`: What is being measured
//! - `ReadingValue`: A number or the "unavailable" sentinel
//! - `Reading`: One quantity's latest value
//! - `Snapshot`: Every reading plus the last-updated timestamp and domain

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Wire representation of a value that has never been received
pub const UNAVAILABLE: &str = "N/A";

/// A monitored physical quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    Temperature,
    Humidity,
}

impl Quantity {
    /// Every quantity the store tracks, in wire order
    pub const ALL: [Quantity; 2] = [Quantity::Temperature, Quantity::Humidity];

    /// Name used in topics and JSON keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
        }
    }

    /// Look up a quantity by its wire name
    pub fn from_name(name: &str) -> Option<Quantity> {
        Quantity::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(name))
    }

    /// Unit implied by the quantity
    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Temperature => "°C",
            Quantity::Humidity => "%RH",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest value of a quantity, or the sentinel before the first message
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ReadingValue {
    #[default]
    Unavailable,
    Value(f64),
}

impl ReadingValue {
    /// The numeric value, if one has been received
    pub fn value(&self) -> Option<f64> {
        match self {
            ReadingValue::Value(v) => Some(*v),
            ReadingValue::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ReadingValue::Value(_))
    }
}

impl fmt::Display for ReadingValue {
    /// Fixed 2-decimal precision, or `N/A`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Value(v) => write!(f, "{:.2}", v),
            ReadingValue::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl Serialize for ReadingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One quantity's latest value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub quantity: Quantity,
    pub value: ReadingValue,
    pub unit: &'static str,
}

impl Reading {
    pub fn new(quantity: Quantity, value: ReadingValue) -> Self {
        Self {
            quantity,
            value,
            unit: quantity.unit(),
        }
    }
}

/// The full current set of readings
///
/// One field per quantity, so a snapshot can never be missing a key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub temperature: ReadingValue,
    pub humidity: ReadingValue,
    /// Timestamp of the most recent accepted message (any quantity)
    #[serde(serialize_with = "serialize_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Deployment context the readings belong to
    pub domain: String,
}

impl Snapshot {
    /// A snapshot with every quantity unavailable
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            temperature: ReadingValue::Unavailable,
            humidity: ReadingValue::Unavailable,
            last_updated: None,
            domain: domain.into(),
        }
    }

    /// Value of a single quantity
    pub fn value(&self, quantity: Quantity) -> ReadingValue {
        match quantity {
            Quantity::Temperature => self.temperature,
            Quantity::Humidity => self.humidity,
        }
    }

    /// All readings in wire order
    pub fn readings(&self) -> Vec<Reading> {
        Quantity::ALL
            .iter()
            .map(|q| Reading::new(*q, self.value(*q)))
            .collect()
    }

    /// `last_updated` as it appears on the wire
    pub fn last_updated_string(&self) -> String {
        format_timestamp(self.last_updated.as_ref())
    }

    pub(crate) fn set(&mut self, quantity: Quantity, value: ReadingValue) {
        match quantity {
            Quantity::Temperature => self.temperature = value,
            Quantity::Humidity => self.humidity = value,
        }
    }
}

fn format_timestamp(ts: Option<&DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => UNAVAILABLE.to_string(),
    }
}

fn serialize_timestamp<S: Serializer>(
    ts: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts.as_ref()))
}
