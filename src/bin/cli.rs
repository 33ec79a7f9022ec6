//! Envwatch CLI
//!
//! Command-line interface for a running Envwatch server:
//! - Show current readings
//! - Check broker and subscriber status
//! - Print a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "envwatch-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query a running Envwatch server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8082", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show current readings
    Readings,

    /// Show broker connection and subscriber count
    Status,

    /// Show full health report
    Health,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Readings => {
            let data = fetch_json(&client, &cli.api_url, "/api/v1/readings").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_readings(&data);
            }
        }

        Commands::Status => {
            let data = fetch_json(&client, &cli.api_url, "/api/v1/status").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let mqtt = data["mqtt"].as_bool().unwrap_or(false);
                println!(
                    "MQTT broker:     {}",
                    if mqtt { "connected" } else { "disconnected" }
                );
                println!(
                    "Live dashboards: {}",
                    data["websocket"].as_u64().unwrap_or(0)
                );
            }
        }

        Commands::Health => {
            let data = fetch_json(&client, &cli.api_url, "/health").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!(
                    "Envwatch v{}",
                    data["version"].as_str().unwrap_or(env!("CARGO_PKG_VERSION"))
                );
                println!();
                println!("Status: {}", data["status"].as_str().unwrap_or("unknown"));
                println!(
                    "Broker: {}",
                    data["broker_state"].as_str().unwrap_or("unknown")
                );
                println!("Subscribers: {}", data["websocket"].as_u64().unwrap_or(0));
                if let Some(uptime) = data["uptime_seconds"].as_u64() {
                    println!("Uptime: {}", format_duration(uptime));
                }
            }
        }

        Commands::Config { output } => {
            let content = envwatch::config::generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// GET a JSON document, exiting with a helpful message when the server is unreachable
async fn fetch_json(
    client: &reqwest::Client,
    api_url: &str,
    path: &str,
) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", api_url.trim_end_matches('/'), path);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Cannot connect to Envwatch API at {}", api_url);
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Make sure the Envwatch server is running:");
            eprintln!("  cargo run --bin envwatch");
            std::process::exit(1);
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        eprintln!("Request failed ({}): {}", status, text);
        std::process::exit(1);
    }

    Ok(response.json().await?)
}

fn print_readings(data: &serde_json::Value) {
    println!("{:<14} {:>10}", "Quantity", "Value");
    println!("{}", "-".repeat(25));
    for (quantity, unit) in [("temperature", "°C"), ("humidity", "%RH")] {
        let value = data[quantity].as_str().unwrap_or("N/A");
        let unit = if value == "N/A" { "" } else { unit };
        println!("{:<14} {:>10} {}", quantity, value, unit);
    }
    println!();
    println!(
        "Last updated: {}",
        data["lastUpdated"].as_str().unwrap_or("N/A")
    );
    if let Some(domain) = data["domain"].as_str().filter(|d| !d.is_empty()) {
        println!("Domain:       {}", domain);
    }
}

fn format_duration(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, seconds % 60)
    }
}
