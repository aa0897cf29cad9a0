//! Gateway configuration.
//!
//! Two mappings drive the gateway: the broker endpoint table and the
//! sensor-address-to-label table, plus a `[gateway]` section of behavior
//! knobs. Loaded once at startup; edits take effect on restart.
//!
//! ```toml
//! [brokers.local]
//! host = "127.0.0.1"
//! port = 1883
//!
//! [sensors]
//! "AA:BB:CC:DD:EE:FF" = "living_room"
//!
//! [gateway]
//! resend_interval_secs = 3600
//! hub_status_topic = "homeassistant/status"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Behavior knobs.
    pub gateway: GatewayConfig,
    /// Broker endpoints to fan out to, keyed by a display name.
    pub brokers: BTreeMap<String, BrokerConfig>,
    /// Beacon address to room-label mapping.
    pub sensors: BTreeMap<String, String>,
}

impl Config {
    /// Load and validate configuration from the path in `RUUVIBRIDGE_CONFIG`,
    /// falling back to the default location (missing default file yields
    /// defaults; a missing explicitly-named file is an error).
    pub fn load_startup() -> Result<Self, ConfigError> {
        match std::env::var_os("RUUVIBRIDGE_CONFIG") {
            Some(path) => Self::load_validated(PathBuf::from(path)),
            None => {
                let config = Self::load_default()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// An empty broker table is the one fatal startup condition: with
    /// nothing to publish to, the gateway has no reason to run. Everything
    /// else the gateway tolerates at runtime is still validated here so a
    /// typo surfaces at startup rather than as silent misbehavior.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.brokers.is_empty() {
            errors.push(ValidationError {
                field: "brokers".to_string(),
                message: "at least one broker endpoint must be configured".to_string(),
            });
        }
        for (name, broker) in &self.brokers {
            errors.extend(broker.validate(&format!("brokers.{name}")));
        }

        for (address, label) in &self.sensors {
            let prefix = format!("sensors.\"{address}\"");
            if address.is_empty() {
                errors.push(ValidationError {
                    field: prefix.clone(),
                    message: "sensor address cannot be empty".to_string(),
                });
            }
            if label.is_empty() {
                errors.push(ValidationError {
                    field: prefix.clone(),
                    message: "label cannot be empty".to_string(),
                });
            } else if label.contains(['#', '+', '/', ' ']) {
                errors.push(ValidationError {
                    field: prefix,
                    message: format!(
                        "label '{label}' contains characters not allowed in a topic segment"
                    ),
                });
            }
        }

        errors.extend(self.gateway.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// One broker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_port() -> u16 {
    1883
}

impl BrokerConfig {
    /// Validate one broker endpoint.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.is_empty() {
            errors.push(ValidationError {
                field: format!("{prefix}.host"),
                message: "host cannot be empty".to_string(),
            });
        }
        if self.port == 0 {
            errors.push(ValidationError {
                field: format!("{prefix}.port"),
                message: "port cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Gateway behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds between periodic discovery resends.
    pub resend_interval_secs: u64,
    /// Warn when no readings arrive for this many seconds.
    pub silence_warning_secs: u64,
    /// Prefix of the reading topic (`<prefix>/<label>`).
    pub reading_topic_prefix: String,
    /// Prefix of the discovery topic (`<prefix>/<label>_<field>/config`).
    pub discovery_topic_prefix: String,
    /// Topic the hub announces its liveness on.
    pub hub_status_topic: String,
    /// Append-only log of auto-labeled sensors.
    pub unknown_sensor_log: PathBuf,
    /// MQTT QoS level (0, 1 or 2).
    pub qos: u8,
    /// MQTT keep-alive in seconds.
    pub keep_alive_secs: u64,
    /// Length of each BLE scan cycle in seconds.
    pub scan_duration_secs: u64,
    /// Pause between BLE scan cycles in seconds.
    pub scan_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            resend_interval_secs: 3600,
            silence_warning_secs: 300,
            reading_topic_prefix: "home".to_string(),
            discovery_topic_prefix: "discovery".to_string(),
            hub_status_topic: "homeassistant/status".to_string(),
            unknown_sensor_log: PathBuf::from("detected_ruuvis.txt"),
            qos: 0,
            keep_alive_secs: 60,
            scan_duration_secs: 5,
            scan_interval_secs: 1,
        }
    }
}

impl GatewayConfig {
    /// Validate the gateway knobs.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.qos > 2 {
            errors.push(ValidationError {
                field: "gateway.qos".to_string(),
                message: format!("QoS {} is invalid, must be 0, 1 or 2", self.qos),
            });
        }
        if self.resend_interval_secs == 0 {
            errors.push(ValidationError {
                field: "gateway.resend_interval_secs".to_string(),
                message: "resend interval cannot be 0".to_string(),
            });
        }
        for (field, value) in [
            ("gateway.reading_topic_prefix", &self.reading_topic_prefix),
            ("gateway.discovery_topic_prefix", &self.discovery_topic_prefix),
            ("gateway.hub_status_topic", &self.hub_status_topic),
        ] {
            if value.is_empty() {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        if self.unknown_sensor_log.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "gateway.unknown_sensor_log".to_string(),
                message: "log path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g. `brokers.local.port`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ruuvibridge")
        .join("config.toml")
}
