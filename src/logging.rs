//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and HTTP tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str) -> String {
    format!("envwatch={level},tower_http={level},rumqttc=warn")
}

/// Install the global tracing subscriber
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
