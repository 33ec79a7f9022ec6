//! Envwatch server
//!
//! Run with: cargo run --bin envwatch -- --config config.toml
//!
//! Connects to the MQTT broker, serves the HTTP API and streams live
//! snapshots over WebSocket until Ctrl+C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use envwatch::api::{serve, ApiConfig, AppState};
use envwatch::config::Config;
use envwatch::readings::ReadingStore;
use envwatch::telemetry::{BrokerStatus, Ingestor, LogSink, TelemetryClient};
use envwatch::websocket::{BroadcastHub, HubConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "envwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time temperature and humidity ingestion with live WebSocket fan-out")]
struct Args {
    /// Config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default().context("loading config from default locations")?,
    };

    envwatch::logging::init(&config.logging);

    tracing::info!("Starting Envwatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        temperature_topic = %config.mqtt.temperature_topic,
        humidity_topic = %config.mqtt.humidity_topic,
        domain = %config.monitor.domain,
        "Monitoring configuration"
    );

    // Process-wide components, owned here and shared by reference
    let store = Arc::new(ReadingStore::new(config.monitor.domain.clone()));
    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&store),
        HubConfig::from(&config.hub),
    ));
    let broker = BrokerStatus::new();

    let mut ingestor = Ingestor::new(config.mqtt.topic_map(), Arc::clone(&store), Arc::clone(&hub));
    if config.monitor.log_readings {
        ingestor = ingestor.with_sink(Arc::new(LogSink));
    }

    let telemetry_config = config
        .mqtt
        .telemetry_config()
        .context("invalid [mqtt] configuration")?;
    let telemetry = TelemetryClient::new(telemetry_config, ingestor, broker.clone())
        .start()
        .context("starting telemetry client")?;

    let api_config = ApiConfig::from(&config.api);
    let state = AppState::new(store, broker, hub, api_config.clone());

    serve(state, &api_config)
        .await
        .with_context(|| format!("serving API on {}", api_config.addr()))?;

    telemetry.shutdown().await;
    tracing::info!("Envwatch stopped");

    Ok(())
}
