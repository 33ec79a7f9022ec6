//! Broadcast Hub
//!
//! Manages the set of live subscribers and fans snapshots out to them.
//! Each subscriber owns a bounded channel; delivery never waits on a
//! subscriber, and a full or closed channel evicts it.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::readings::{ReadingStore, Snapshot};

/// Unique identifier for a subscriber
pub type SubscriberId = String;

/// Manages all live subscribers
pub struct BroadcastHub {
    /// Active subscribers in registration order
    subscribers: Mutex<Vec<Subscriber>>,
    /// Source of the initial snapshot for new subscribers
    store: Arc<ReadingStore>,
    config: HubConfig,
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent subscribers
    pub max_connections: usize,
    /// Per-subscriber channel capacity before it counts as stalled
    pub send_buffer: usize,
    /// Upper bound on a single socket write
    pub send_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            send_buffer: 32,
            send_timeout_ms: 5_000,
        }
    }
}

/// A registered delivery target
struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<ServerMessage>,
}

impl BroadcastHub {
    /// Create a new hub reading initial state from `store`
    pub fn new(store: Arc<ReadingStore>, config: HubConfig) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            store,
            config,
        }
    }

    /// Create a channel sized for this hub
    pub fn channel(&self) -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
        mpsc::channel(self.config.send_buffer.max(1))
    }

    /// Register a subscriber and send it the current snapshot
    ///
    /// The snapshot is queued before the subscriber becomes visible to
    /// `broadcast`, so it is always the first message the subscriber sees.
    pub fn register(&self, sender: mpsc::Sender<ServerMessage>) -> Result<SubscriberId, HubError> {
        let mut subscribers = self.subscribers.lock();
        if subscribers.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let snapshot = self.store.get();
        sender
            .try_send(ServerMessage::Snapshot(snapshot))
            .map_err(|_| HubError::SendFailed)?;

        let id = Uuid::new_v4().to_string();
        subscribers.push(Subscriber {
            id: id.clone(),
            sender,
        });

        tracing::info!(subscriber_id = %id, subscribers = subscribers.len(), "Subscriber registered");
        Ok(id)
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unregister(&self, id: &str) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);

        if subscribers.len() < before {
            tracing::info!(subscriber_id = %id, subscribers = subscribers.len(), "Subscriber unregistered");
        }
    }

    /// Deliver `snapshot` to every subscriber
    ///
    /// Subscribers whose channel is full or closed are evicted. Returns the
    /// number of successful deliveries.
    pub fn broadcast(&self, snapshot: &Snapshot) -> usize {
        let mut subscribers = self.subscribers.lock();
        let mut delivered = 0;

        subscribers.retain(|subscriber| {
            match subscriber
                .sender
                .try_send(ServerMessage::Snapshot(snapshot.clone()))
            {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = %subscriber.id, "Subscriber stalled, evicting");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %subscriber.id, "Subscriber closed, evicting");
                    false
                }
            }
        });

        tracing::trace!(delivered, remaining = subscribers.len(), "Broadcast snapshot");
        delivered
    }

    /// Number of registered subscribers
    pub fn count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.count())
            .field("config", &self.config)
            .finish()
    }
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Failed to send initial snapshot")]
    SendFailed,
}
