//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the flood-config.toml file.
//! It names the stations to monitor and tunes how the Environment Agency API is polled.
//!
//! ```toml
//! [api]
//! timeout_secs = 10
//! scan_interval_minutes = 15
//!
//! [[sensor]]
//! id = "E70024"
//! name = "River Test at Romsey"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "flood-config.toml";

/// Root of the Environment Agency flood-monitoring API.
pub const DEFAULT_BASE_URL: &str = "https://environment.data.gov.uk/flood-monitoring";

/// Longest accepted scan interval: one week.
pub const MAX_SCAN_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration loaded from flood-config.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Upstream API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Stations to expose as sensors
    #[serde(default, rename = "sensor")]
    pub sensors: Vec<SensorConfig>,
}

/// Upstream API and polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Root URL; endpoints are appended to it
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Minutes between update cycles
    pub scan_interval_minutes: u64,
}

/// One monitored station
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Station code (e.g. "E70024")
    pub id: String,
    /// Display name; the station label from the API is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            scan_interval_minutes: 15,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.saturating_mul(60))
    }
}

impl Config {
    /// Load and validate configuration from the specified path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        info!(
            path = %path.display(),
            sensors = config.sensors.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the poller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[sensor]] entry is required".to_string(),
            ));
        }
        for sensor in &self.sensors {
            let id = sensor.id.trim();
            if id.is_empty() {
                return Err(ConfigError::Invalid("sensor id must not be empty".to_string()));
            }
            if !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(ConfigError::Invalid(format!(
                    "sensor id '{}' is not a station code",
                    sensor.id
                )));
            }
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".to_string()));
        }
        if self.api.scan_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "scan_interval_minutes must be positive".to_string(),
            ));
        }
        if self.api.scan_interval_minutes > MAX_SCAN_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "scan_interval_minutes must be at most {}",
                MAX_SCAN_INTERVAL_MINUTES
            )));
        }
        Ok(())
    }

    /// Save current configuration to the specified path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), "configuration saved");
        Ok(())
    }
}
