//! Snapshot/Status API
//!
//! Synchronous, read-only views for request/response callers. Neither
//! accessor blocks on I/O or fails; missing data shows up as `N/A`.

use serde::Serialize;
use std::sync::Arc;

use crate::readings::{ReadingStore, Snapshot};
use crate::telemetry::BrokerStatus;
use crate::websocket::BroadcastHub;

/// Connection status as reported to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// Broker connection is up
    pub mqtt: bool,
    /// Number of live WebSocket subscribers
    pub websocket: usize,
}

/// Read-only facade over the store, broker state and hub
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<ReadingStore>,
    broker: BrokerStatus,
    hub: Arc<BroadcastHub>,
}

impl StatusReporter {
    pub fn new(store: Arc<ReadingStore>, broker: BrokerStatus, hub: Arc<BroadcastHub>) -> Self {
        Self { store, broker, hub }
    }

    /// The store's current snapshot
    pub fn current_snapshot(&self) -> Snapshot {
        self.store.get()
    }

    /// Broker connectivity and subscriber count
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            mqtt: self.broker.is_connected(),
            websocket: self.hub.count(),
        }
    }
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::{Quantity, ReadingValue};
    use crate::telemetry::{ConnectionState, Ingestor, TopicMap};
    use crate::websocket::HubConfig;

    struct Fixture {
        reporter: StatusReporter,
        ingestor: Ingestor,
        broker: BrokerStatus,
        hub: Arc<BroadcastHub>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(ReadingStore::new("acme.io"));
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&store), HubConfig::default()));
        let broker = BrokerStatus::new();
        let ingestor = Ingestor::new(TopicMap::default(), Arc::clone(&store), Arc::clone(&hub));
        let reporter = StatusReporter::new(store, broker.clone(), Arc::clone(&hub));
        Fixture {
            reporter,
            ingestor,
            broker,
            hub,
        }
    }

    #[test]
    fn test_initial_snapshot_is_unavailable() {
        let f = fixture();
        let snapshot = f.reporter.current_snapshot();

        assert_eq!(snapshot.temperature, ReadingValue::Unavailable);
        assert_eq!(snapshot.humidity, ReadingValue::Unavailable);
        assert_eq!(snapshot.domain, "acme.io");
        assert_eq!(
            f.reporter.status(),
            ServiceStatus {
                mqtt: false,
                websocket: 0
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_reflects_latest_values() {
        let f = fixture();
        for (topic, payload) in [
            ("sensor/temperature", "20.1"),
            ("sensor/humidity", "40"),
            ("sensor/temperature", "23.40"),
        ] {
            f.ingestor.handle_message(topic, payload.as_bytes()).unwrap();
        }

        let snapshot = f.reporter.current_snapshot();
        assert_eq!(snapshot.value(Quantity::Temperature).to_string(), "23.40");
        assert_eq!(snapshot.value(Quantity::Humidity).to_string(), "40.00");
    }

    #[test]
    fn test_status_tracks_broker_state() {
        let f = fixture();

        f.broker.set(ConnectionState::Connecting);
        assert!(!f.reporter.status().mqtt);

        f.broker.set(ConnectionState::Connected);
        assert!(f.reporter.status().mqtt);

        f.broker.set(ConnectionState::Disconnected);
        assert!(!f.reporter.status().mqtt);
    }

    #[tokio::test]
    async fn test_disconnect_keeps_last_values() {
        let f = fixture();
        f.broker.set(ConnectionState::Connected);
        f.ingestor
            .handle_message("sensor/humidity", b"61.5")
            .unwrap();
        let before = f.reporter.current_snapshot();

        f.broker.set(ConnectionState::Disconnected);

        assert!(!f.reporter.status().mqtt);
        assert_eq!(f.reporter.current_snapshot(), before);
    }

    #[tokio::test]
    async fn test_failed_subscriber_is_removed_from_count() {
        let f = fixture();
        let (tx_a, rx_a) = f.hub.channel();
        let (tx_b, mut rx_b) = f.hub.channel();
        f.hub.register(tx_a).unwrap();
        f.hub.register(tx_b).unwrap();
        assert_eq!(f.reporter.status().websocket, 2);
        let _ = rx_b.try_recv();

        drop(rx_a);
        f.ingestor
            .handle_message("sensor/temperature", b"22")
            .unwrap();

        assert_eq!(f.reporter.status().websocket, 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_status_serializes_wire_shape() {
        let json = serde_json::to_string(&ServiceStatus {
            mqtt: true,
            websocket: 3,
        })
        .unwrap();
        assert_eq!(json, r#"{"mqtt":true,"websocket":3}"#);
    }
}
