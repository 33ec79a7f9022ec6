//! Broker connection state
//!
//! Owned and written by the telemetry event loop; everyone else gets a
//! read-only view through [`BrokerStatus`].

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle of the link to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Shared handle on the broker connection state
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone, Default)]
pub struct BrokerStatus {
    state: Arc<AtomicU8>,
}

impl BrokerStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True only between a ConnAck and the next error or close
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        let previous = ConnectionState::from_u8(self.state.swap(state.as_u8(), Ordering::AcqRel));
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Broker connection state changed");
        }
    }
}

impl fmt::Debug for BrokerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerStatus")
            .field("state", &self.state())
            .finish()
    }
}
