//! MQTT telemetry client
//!
//! Owns the broker connection. The rumqttc event loop runs on a dedicated
//! task, which makes it the single writer of the reading store: every
//! publish is handed to the [`Ingestor`] strictly in arrival order.
//!
//! On any connection error the state flips to Disconnected, the task waits
//! for the fixed reconnect interval and polls again, which makes rumqttc
//! reconnect. This repeats forever until shutdown.

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeReasonCode,
    Transport,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::connection::{BrokerStatus, ConnectionState};
use super::ingest::Ingestor;

/// How long shutdown waits for the DISCONNECT packet to go out
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Capacity of rumqttc's request channel
const REQUEST_CAPACITY: usize = 10;

/// Transport used to reach the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Plain TCP
    #[default]
    Mqtt,
    /// TLS with the platform's root certificates
    Mqtts,
}

impl FromStr for Protocol {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mqtt" | "tcp" => Ok(Protocol::Mqtt),
            "mqtts" | "ssl" | "tls" => Ok(Protocol::Mqtts),
            other => Err(TelemetryError::InvalidConfig(format!(
                "unsupported broker protocol: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Mqtt => f.write_str("mqtt"),
            Protocol::Mqtts => f.write_str("mqtts"),
        }
    }
}

/// Connection settings for the telemetry client
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    /// Fixed delay between reconnect attempts
    pub reconnect_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            protocol: Protocol::Mqtt,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            reconnect_interval: Duration::from_secs(1),
        }
    }
}

impl TelemetryConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Builder method: set credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Builder method: set transport
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Builder method: set reconnect interval
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Build rumqttc options for a given client id
    pub fn mqtt_options(&self, client_id: &str) -> Result<MqttOptions, TelemetryError> {
        if self.host.trim().is_empty() {
            return Err(TelemetryError::InvalidConfig(
                "broker host is required".to_string(),
            ));
        }

        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.credentials {
            options.set_credentials(username, password);
        }

        if self.protocol == Protocol::Mqtts {
            options.set_transport(Transport::tls_with_default_config());
        }

        Ok(options)
    }
}

/// A fresh client identifier for this process instance
///
/// Random per start so a restarted process never takes over the broker
/// session of its previous incarnation.
pub fn generate_client_id() -> String {
    format!("envwatch-{}", Uuid::new_v4().simple())
}

/// Telemetry client, not yet running
pub struct TelemetryClient {
    config: TelemetryConfig,
    ingestor: Ingestor,
    status: BrokerStatus,
}

impl TelemetryClient {
    pub fn new(config: TelemetryConfig, ingestor: Ingestor, status: BrokerStatus) -> Self {
        Self {
            config,
            ingestor,
            status,
        }
    }

    /// Spawn the event loop task
    ///
    /// Returns immediately; the connection is established in the background.
    pub fn start(self) -> Result<TelemetryHandle, TelemetryError> {
        let client_id = generate_client_id();
        let options = self.config.mqtt_options(&client_id)?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            protocol = %self.config.protocol,
            client_id = %client_id,
            "Starting MQTT telemetry client"
        );

        self.status.set(ConnectionState::Connecting);

        let worker = EventLoopWorker {
            client: client.clone(),
            ingestor: self.ingestor,
            status: self.status.clone(),
            reconnect_interval: self.config.reconnect_interval,
        };
        let task = tokio::spawn(worker.run(event_loop, shutdown_rx));

        Ok(TelemetryHandle {
            client_id,
            status: self.status,
            shutdown_tx,
            task,
        })
    }
}

/// Handle on a running telemetry client
///
/// Dropping the handle stops the client.
pub struct TelemetryHandle {
    client_id: String,
    status: BrokerStatus,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TelemetryHandle {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn status(&self) -> &BrokerStatus {
        &self.status
    }

    /// Disconnect from the broker and wait for the event loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Telemetry task ended abnormally");
        }
        tracing::info!(client_id = %self.client_id, "MQTT telemetry client stopped");
    }
}

impl fmt::Debug for TelemetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryHandle")
            .field("client_id", &self.client_id)
            .field("status", &self.status)
            .finish()
    }
}

/// State owned by the event loop task
struct EventLoopWorker {
    client: AsyncClient,
    ingestor: Ingestor,
    status: BrokerStatus,
    reconnect_interval: Duration,
}

impl EventLoopWorker {
    async fn run(self, mut event_loop: EventLoop, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            let backoff = tokio::select! {
                _ = shutdown_rx.changed() => break,
                event = event_loop.poll() => match event {
                    Ok(event) => {
                        self.handle_event(event);
                        false
                    }
                    Err(e) => {
                        self.status.set(ConnectionState::Disconnected);
                        tracing::warn!(
                            error = %e,
                            retry_in_ms = self.reconnect_interval.as_millis() as u64,
                            "MQTT connection error"
                        );
                        true
                    }
                },
            };

            if backoff {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(self.reconnect_interval) => {
                        self.status.set(ConnectionState::Connecting);
                    }
                }
            }
        }

        self.disconnect(&mut event_loop).await;
    }

    fn handle_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                self.status.set(ConnectionState::Connected);
                tracing::info!(code = ?connack.code, "Connected to MQTT broker");
                self.subscribe_all();
            }
            Event::Incoming(Packet::SubAck(suback)) => {
                for code in &suback.return_codes {
                    if matches!(code, SubscribeReasonCode::Failure) {
                        tracing::error!(pkid = suback.pkid, "Broker rejected topic subscription");
                    }
                }
                tracing::debug!(pkid = suback.pkid, "MQTT subscription acknowledged");
            }
            Event::Incoming(Packet::Publish(publish)) => {
                if let Err(e) = self.ingestor.handle_message(&publish.topic, &publish.payload) {
                    tracing::warn!(topic = %publish.topic, error = %e, "Dropping MQTT message");
                }
            }
            Event::Incoming(Packet::Disconnect) => {
                self.status.set(ConnectionState::Disconnected);
                tracing::info!("MQTT broker closed the connection");
            }
            _ => {}
        }
    }

    /// Queue a subscription for every configured topic
    ///
    /// Failures are logged and not retried; the next reconnect subscribes
    /// again.
    fn subscribe_all(&self) {
        for topic in self.ingestor.topics().topics() {
            match self.client.try_subscribe(topic, QoS::AtMostOnce) {
                Ok(()) => tracing::debug!(topic = %topic, "Subscribing to topic"),
                Err(e) => tracing::error!(topic = %topic, error = %e, "Failed to subscribe"),
            }
        }
    }

    async fn disconnect(&self, event_loop: &mut EventLoop) {
        if self.status.is_connected() && self.client.try_disconnect().is_ok() {
            let _ = tokio::time::timeout(DISCONNECT_GRACE, async {
                loop {
                    match event_loop.poll().await {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            })
            .await;
        }
        self.status.set(ConnectionState::Disconnected);
    }
}

/// Errors raised while setting up the telemetry client
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid telemetry configuration: {0}")]
    InvalidConfig(String),
}
