//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::telemetry::{
    Protocol, TelemetryConfig, TopicMap, DEFAULT_HUMIDITY_TOPIC, DEFAULT_TEMPERATURE_TOPIC,
};
use crate::websocket::HubConfig as HubSettings;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// `mqtt` or `mqtts`
    #[serde(default = "default_mqtt_protocol")]
    pub protocol: String,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_temperature_topic")]
    pub temperature_topic: String,

    #[serde(default = "default_humidity_topic")]
    pub humidity_topic: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_protocol() -> String {
    "mqtt".to_string()
}

fn default_temperature_topic() -> String {
    DEFAULT_TEMPERATURE_TOPIC.to_string()
}

fn default_humidity_topic() -> String {
    DEFAULT_HUMIDITY_TOPIC.to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_reconnect_interval() -> u64 {
    1000 // 1 second
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            protocol: default_mqtt_protocol(),
            username: None,
            password: None,
            temperature_topic: default_temperature_topic(),
            humidity_topic: default_humidity_topic(),
            keep_alive_secs: default_keep_alive(),
            reconnect_interval_ms: default_reconnect_interval(),
        }
    }
}

impl MqttConfig {
    /// Connection settings for the telemetry client
    pub fn telemetry_config(&self) -> Result<TelemetryConfig, ConfigError> {
        let protocol: Protocol = self
            .protocol
            .parse()
            .map_err(|e: crate::telemetry::TelemetryError| ConfigError::Invalid(e.to_string()))?;

        let mut config = TelemetryConfig::new(&self.host, self.port)
            .protocol(protocol)
            .reconnect_interval(Duration::from_millis(self.reconnect_interval_ms));
        config.keep_alive = Duration::from_secs(self.keep_alive_secs);

        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => config = config.credentials(user, pass),
            (Some(user), None) => config = config.credentials(user, ""),
            (None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "mqtt.password is set without mqtt.username".to_string(),
                ))
            }
            (None, None) => {}
        }

        Ok(config)
    }

    /// Topic for each monitored quantity
    pub fn topic_map(&self) -> TopicMap {
        TopicMap::new(&self.temperature_topic, &self.humidity_topic)
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Live-update hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,

    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_send_buffer() -> usize {
    32
}

fn default_send_timeout() -> u64 {
    5000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            send_buffer: default_send_buffer(),
            send_timeout_ms: default_send_timeout(),
        }
    }
}

impl From<&HubConfig> for HubSettings {
    fn from(config: &HubConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            send_buffer: config.send_buffer,
            send_timeout_ms: config.send_timeout_ms,
        }
    }
}

/// What the readings belong to
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    /// Domain context reported with every snapshot
    #[serde(default)]
    pub domain: String,

    /// Emit every accepted reading as a log event
    #[serde(default)]
    pub log_readings: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// The first config file that exists wins. A file that exists but
    /// cannot be read or parsed is an error; defaults apply only when no
    /// file is present.
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("envwatch").join("config.toml")),
            Some(PathBuf::from("/etc/envwatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first_existing(&config_paths)
    }

    fn load_first_existing(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => {
                let config = Self::load_with_env(path)?;
                tracing::info!("Loaded config from {:?}", path);
                Ok(config)
            }
            None => {
                tracing::info!("Using default config with environment overrides");
                Ok(Self::from_env())
            }
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // MQTT overrides
        if let Some(host) = lookup("ENVWATCH_MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("ENVWATCH_MQTT_PORT") {
            if let Ok(p) = port.parse() {
                self.mqtt.port = p;
            }
        }
        if let Some(protocol) = lookup("ENVWATCH_MQTT_PROTOCOL") {
            self.mqtt.protocol = protocol;
        }
        if let Some(username) = lookup("ENVWATCH_MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("ENVWATCH_MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(topic) = lookup("ENVWATCH_TOPIC_TEMPERATURE") {
            self.mqtt.temperature_topic = topic;
        }
        if let Some(topic) = lookup("ENVWATCH_TOPIC_HUMIDITY") {
            self.mqtt.humidity_topic = topic;
        }

        // Monitor overrides
        if let Some(domain) = lookup("ENVWATCH_DOMAIN") {
            self.monitor.domain = domain;
        }

        // API overrides
        if let Some(host) = lookup("ENVWATCH_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("ENVWATCH_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("ENVWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ENVWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Socket address string for the API server
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Envwatch Configuration
#
# Environment variables override these settings:
# - ENVWATCH_MQTT_HOST, ENVWATCH_MQTT_PORT, ENVWATCH_MQTT_PROTOCOL
# - ENVWATCH_MQTT_USERNAME, ENVWATCH_MQTT_PASSWORD
# - ENVWATCH_TOPIC_TEMPERATURE, ENVWATCH_TOPIC_HUMIDITY
# - ENVWATCH_DOMAIN
# - ENVWATCH_API_HOST, ENVWATCH_API_PORT
# - ENVWATCH_LOG_LEVEL, ENVWATCH_LOG_FORMAT

[mqtt]
# Broker host and port
host = "localhost"
port = 1883

# Transport: mqtt (plain TCP) or mqtts (TLS)
protocol = "mqtt"

# Optional credentials
# username = "sensor"
# password = "secret"

# One topic per monitored quantity; payload is a plain decimal number
temperature_topic = "sensor/temperature"
humidity_topic = "sensor/humidity"

# Keep-alive interval (seconds)
keep_alive_secs = 30

# Fixed delay between reconnect attempts (ms)
reconnect_interval_ms = 1000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty = any)
cors_origins = []

[hub]
# Maximum concurrent WebSocket subscribers
max_connections = 1000

# Messages buffered per subscriber before it is evicted as stalled
send_buffer = 32

# Upper bound on a single WebSocket write (ms)
send_timeout_ms = 5000

[monitor]
# Domain context reported with every snapshot
domain = ""

# Log every accepted reading
log_readings = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.temperature_topic, "sensor/temperature");
        assert_eq!(config.mqtt.humidity_topic, "sensor/humidity");
        assert_eq!(config.mqtt.reconnect_interval_ms, 1000);
        assert_eq!(config.api.port, 8082);
        assert_eq!(config.hub.max_connections, 1000);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.api_addr(), "0.0.0.0:8082");
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config = Config::parse(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.mqtt.host, defaults.mqtt.host);
        assert_eq!(config.mqtt.protocol, defaults.mqtt.protocol);
        assert_eq!(config.hub.send_buffer, defaults.hub.send_buffer);
        assert_eq!(config.api.port, defaults.api.port);
        assert!(config.mqtt.username.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse(
            r#"
[mqtt]
host = "broker.internal"
temperature_topic = "greenhouse/t"

[monitor]
domain = "acme.io"
"#,
        )
        .unwrap();

        assert_eq!(config.mqtt.host, "broker.internal");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.temperature_topic, "greenhouse/t");
        assert_eq!(config.mqtt.humidity_topic, "sensor/humidity");
        assert_eq!(config.monitor.domain, "acme.io");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = 9000").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mqtt\nhost = ").unwrap();

        match Config::load(file.path()) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_first_existing_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("config.toml");
        std::fs::write(&present, "[api]\nport = 9100\n").unwrap();

        let config =
            Config::load_first_existing(&[dir.path().join("missing.toml"), present]).unwrap();
        assert_eq!(config.api.port, 9100);
    }

    #[test]
    fn test_broken_default_file_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("config.toml");
        std::fs::write(&broken, "[mqtt\nhost = \"broker.prod\"\n").unwrap();

        match Config::load_first_existing(&[dir.path().join("missing.toml"), broken.clone()]) {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, broken),
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_first_existing(&[dir.path().join("missing.toml")]).unwrap();
        assert_eq!(config.api.port, Config::from_env().api.port);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("ENVWATCH_MQTT_HOST", "mqtt.example.com"),
            ("ENVWATCH_MQTT_PORT", "8883"),
            ("ENVWATCH_MQTT_PROTOCOL", "mqtts"),
            ("ENVWATCH_MQTT_USERNAME", "sensor"),
            ("ENVWATCH_MQTT_PASSWORD", "hunter2"),
            ("ENVWATCH_TOPIC_HUMIDITY", "lab/rh"),
            ("ENVWATCH_DOMAIN", "lab.example.com"),
            ("ENVWATCH_API_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.mqtt.host, "mqtt.example.com");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.protocol, "mqtts");
        assert_eq!(config.mqtt.username.as_deref(), Some("sensor"));
        assert_eq!(config.mqtt.humidity_topic, "lab/rh");
        assert_eq!(config.monitor.domain, "lab.example.com");
        // Unparsable values keep the default
        assert_eq!(config.api.port, 8082);
    }

    #[test]
    fn test_telemetry_config() {
        let mut mqtt = MqttConfig {
            protocol: "mqtts".to_string(),
            username: Some("sensor".to_string()),
            password: Some("secret".to_string()),
            reconnect_interval_ms: 250,
            ..Default::default()
        };

        let telemetry = mqtt.telemetry_config().unwrap();
        assert_eq!(telemetry.protocol, Protocol::Mqtts);
        assert_eq!(telemetry.reconnect_interval, Duration::from_millis(250));
        assert_eq!(
            telemetry.credentials,
            Some(("sensor".to_string(), "secret".to_string()))
        );

        mqtt.protocol = "carrier-pigeon".to_string();
        assert!(matches!(
            mqtt.telemetry_config(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_password_without_username_is_invalid() {
        let mqtt = MqttConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            mqtt.telemetry_config(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_hub_settings_conversion() {
        let hub = HubConfig {
            max_connections: 5,
            send_buffer: 8,
            send_timeout_ms: 100,
        };
        let settings = HubSettings::from(&hub);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.send_buffer, 8);
        assert_eq!(settings.send_timeout_ms, 100);
    }
}
