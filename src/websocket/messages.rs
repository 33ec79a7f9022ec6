//! WebSocket Message Types
//!
//! Defines the messages pushed from the server to dashboard clients.
//! The live-update channel accepts no client-to-server application messages.

use serde::Serialize;

use crate::readings::Snapshot;

/// Messages sent from server to client
///
/// Untagged: a snapshot goes over the wire as the bare snapshot object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Full current snapshot, sent on connect and on every change
    Snapshot(Snapshot),
    /// Sent once before closing a connection the hub refused
    Error {
        /// Error description
        error: String,
    },
}

impl ServerMessage {
    /// The snapshot carried by this message, if any
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            ServerMessage::Snapshot(snapshot) => Some(snapshot),
            ServerMessage::Error { .. } => None,
        }
    }
}

impl From<Snapshot> for ServerMessage {
    fn from(snapshot: Snapshot) -> Self {
        ServerMessage::Snapshot(snapshot)
    }
}
