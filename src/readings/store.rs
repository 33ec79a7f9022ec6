//! Reading store
//!
//! The one piece of shared mutable state in the service. Writes are
//! serialized behind a `parking_lot::RwLock`; reads copy the snapshot out.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::types::{Quantity, ReadingValue, Snapshot};

/// Latest readings, shared by the telemetry client, hub and status API
pub struct ReadingStore {
    snapshot: RwLock<Snapshot>,
}

impl ReadingStore {
    /// Create a store with every quantity unavailable
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            snapshot: RwLock::new(Snapshot::empty(domain)),
        }
    }

    /// Current snapshot, by value
    pub fn get(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Record a new value for `quantity` and bump `last_updated`
    ///
    /// Only the telemetry event loop calls this. Returns the snapshot as it
    /// stands after the write, so the caller can broadcast exactly what was
    /// stored.
    pub fn update(&self, quantity: Quantity, value: f64, timestamp: DateTime<Utc>) -> Snapshot {
        let mut snapshot = self.snapshot.write();
        snapshot.set(quantity, ReadingValue::Value(value));
        snapshot.last_updated = Some(timestamp);
        snapshot.clone()
    }

    pub fn domain(&self) -> String {
        self.snapshot.read().domain.clone()
    }
}

impl std::fmt::Debug for ReadingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingStore")
            .field("snapshot", &*self.snapshot.read())
            .finish()
    }
}
