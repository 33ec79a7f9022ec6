//! WebSocket Live Updates
//!
//! Pushes the current snapshot to dashboard clients over WebSocket.
//!
//! ## Architecture
//!
//! - **BroadcastHub**: Owns the subscriber set and fans snapshots out
//! - **Handler**: Handles WebSocket upgrade and the connection lifecycle
//! - **Messages**: Defines the server message format
//!
//! ## Usage
//!
//! Clients connect to `/ws`. The server sends the current snapshot right
//! away and again after every accepted sensor message. Anything the client
//! sends is ignored.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:8082/ws');
//!
//! ws.onmessage = (event) => {
//!   const snapshot = JSON.parse(event.data);
//!   console.log(snapshot.temperature, snapshot.humidity, snapshot.lastUpdated);
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{BroadcastHub, HubConfig, HubError, SubscriberId};
pub use messages::ServerMessage;
