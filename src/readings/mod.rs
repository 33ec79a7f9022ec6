//! Shared Reading Store
//!
//! Holds the single authoritative in-memory snapshot of the latest sensor
//! readings.
//!
//! - **types**: Quantity, ReadingValue, Reading and Snapshot
//! - **store**: The lock-guarded store with copy-out reads
//!
//! # Write discipline
//!
//! ```text
//! Telemetry Client ──update()──▶ ReadingStore ──get()──▶ Broadcast Hub / Status API
//! ```
//!
//! Only the telemetry event loop calls [`ReadingStore::update`]. Every read
//! returns an owned [`Snapshot`], so no caller ever holds a live reference
//! into the store.

pub mod store;
pub mod types;

pub use store::ReadingStore;
pub use types::{Quantity, Reading, ReadingValue, Snapshot, UNAVAILABLE};
