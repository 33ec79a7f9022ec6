//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use super::hub::BroadcastHub;
use super::messages::ServerMessage;
use crate::api::AppState;

/// WebSocket upgrade handler
///
/// Upgrades the HTTP connection and registers the socket with the hub.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (sender, receiver) = socket.split();
    serve_subscriber(sender, receiver, hub).await;
}

/// Run one subscriber until either side of the connection ends
///
/// Registers with the hub, forwards every queued message to `sender` and
/// drains `receiver` until the client closes. The subscriber is always
/// unregistered before returning.
async fn serve_subscriber<S, R, E>(mut sender: S, mut receiver: R, hub: Arc<BroadcastHub>)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, mut rx) = hub.channel();

    // Register with hub; this queues the initial snapshot
    let subscriber_id = match hub.register(tx) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register WebSocket subscriber");
            let error_msg = ServerMessage::Error {
                error: e.to_string(),
            };
            if let Ok(text) = serde_json::to_string(&error_msg) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    let send_timeout = Duration::from_millis(hub.config().send_timeout_ms);
    let sub_id_for_send = subscriber_id.clone();

    // Task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize message");
                    continue;
                }
            };

            match tokio::time::timeout(send_timeout, sender.send(Message::Text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(
                        subscriber_id = %sub_id_for_send,
                        error = %e,
                        "WebSocket send failed, closing connection"
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber_id = %sub_id_for_send,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "WebSocket send timed out, closing connection"
                    );
                    break;
                }
            }
        }
    });

    let sub_id_for_recv = subscriber_id.clone();

    // Task to drain the client side until it closes
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&sub_id_for_recv, msg) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        subscriber_id = %sub_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&subscriber_id);
}

/// Handle a received WebSocket message
///
/// The channel is push-only, so application messages are ignored.
/// Returns false if the connection should be closed.
fn handle_ws_message(subscriber_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            tracing::debug!(
                subscriber_id = %subscriber_id,
                len = text.len(),
                "Ignoring client text message"
            );
            true
        }
        Message::Binary(data) => {
            tracing::debug!(
                subscriber_id = %subscriber_id,
                len = data.len(),
                "Ignoring client binary message"
            );
            true
        }
        // Axum answers pings automatically
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(subscriber_id = %subscriber_id, "Client requested close");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::ReadingStore;
    use crate::telemetry::{Ingestor, TopicMap};
    use crate::websocket::HubConfig;
    use futures_util::{sink, stream};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    struct TestClient {
        /// Frames the server wrote to the client
        outbound: mpsc::UnboundedReceiver<Message>,
        /// Frames the client sends to the server
        inbound: mpsc::UnboundedSender<Result<Message, &'static str>>,
        task: JoinHandle<()>,
    }

    impl TestClient {
        fn connect(hub: &Arc<BroadcastHub>) -> Self {
            let (out_tx, outbound) = mpsc::unbounded_channel();
            let (inbound, in_rx) = mpsc::unbounded_channel();

            let sender = Box::pin(sink::unfold(
                out_tx,
                |tx: mpsc::UnboundedSender<Message>, msg: Message| async move {
                    tx.send(msg).map_err(|_| "client gone")?;
                    Ok::<_, &'static str>(tx)
                },
            ));
            let receiver = Box::pin(stream::unfold(in_rx, |mut rx| async move {
                rx.recv().await.map(|msg| (msg, rx))
            }));

            let task = tokio::spawn(serve_subscriber(sender, receiver, Arc::clone(hub)));
            Self {
                outbound,
                inbound,
                task,
            }
        }

        async fn next_json(&mut self) -> serde_json::Value {
            let msg = tokio::time::timeout(Duration::from_secs(1), self.outbound.recv())
                .await
                .unwrap()
                .unwrap();
            match msg {
                Message::Text(text) => serde_json::from_str(&text).unwrap(),
                other => panic!("Expected text frame, got {:?}", other),
            }
        }

        async fn close(self) {
            self.inbound.send(Ok(Message::Close(None))).unwrap();
            tokio::time::timeout(Duration::from_secs(1), self.task)
                .await
                .unwrap()
                .unwrap();
        }
    }

    fn setup(config: HubConfig) -> (Arc<BroadcastHub>, Ingestor) {
        let store = Arc::new(ReadingStore::new("lab-3"));
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&store), config));
        let ingestor = Ingestor::new(TopicMap::default(), store, Arc::clone(&hub));
        (hub, ingestor)
    }

    #[tokio::test]
    async fn test_connection_lifecycle() {
        let (hub, ingestor) = setup(HubConfig::default());
        let mut client = TestClient::connect(&hub);

        let initial = client.next_json().await;
        assert_eq!(initial["temperature"], "N/A");
        assert_eq!(initial["domain"], "lab-3");
        assert_eq!(hub.count(), 1);

        ingestor
            .handle_message("sensor/temperature", b"23.40")
            .unwrap();
        let update = client.next_json().await;
        assert_eq!(update["temperature"], "23.40");
        assert_eq!(update["humidity"], "N/A");

        // Client chatter is ignored
        client
            .inbound
            .send(Ok(Message::Text("hello".to_string())))
            .unwrap();

        client.close().await;
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn test_receive_error_unregisters() {
        let (hub, _ingestor) = setup(HubConfig::default());
        let mut client = TestClient::connect(&hub);
        client.next_json().await;

        client.inbound.send(Err("connection reset")).unwrap();
        tokio::time::timeout(Duration::from_secs(1), client.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hub.count(), 0);
    }

    #[tokio::test]
    async fn test_connection_over_limit_gets_error_frame() {
        let (hub, _ingestor) = setup(HubConfig {
            max_connections: 1,
            ..Default::default()
        });
        let mut first = TestClient::connect(&hub);
        first.next_json().await;

        let mut second = TestClient::connect(&hub);
        let refusal = second.next_json().await;
        assert!(refusal["error"].is_string());
        tokio::time::timeout(Duration::from_secs(1), second.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hub.count(), 1);

        first.close().await;
        assert_eq!(hub.count(), 0);
    }

    #[test]
    fn test_client_messages_keep_connection_open() {
        assert!(handle_ws_message("s1", Message::Text("hello".to_string())));
        assert!(handle_ws_message("s1", Message::Binary(vec![1, 2, 3])));
        assert!(handle_ws_message("s1", Message::Ping(vec![])));
    }

    #[test]
    fn test_close_ends_connection() {
        assert!(!handle_ws_message("s1", Message::Close(None)));
    }
}
