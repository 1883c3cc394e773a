//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::{DEFAULT_PING_COMMAND, Host, MIN_INTERVAL, ProbeSettings};

use super::validation::ConfigError;

/// Default probe interval (1 second).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Top-level application configuration.
///
/// Loaded from an optional YAML file and then overridden by command line
/// arguments, so [`AppConfig::load`] does not validate; call
/// [`AppConfig::validate`] once all sources are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Hosts to monitor (hostnames or IP addresses), in display order.
    pub hosts: Vec<String>,

    /// Probe interval (default: 1s).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// TCP port to probe. Without one, hosts are probed with ICMP echo.
    pub port: Option<u16>,

    /// Echo command for ICMP probes (default: "ping").
    pub ping_command: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            interval: DEFAULT_INTERVAL,
            port: None,
            ping_command: DEFAULT_PING_COMMAND.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one host is required".to_string(),
            ));
        }

        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "host names cannot be empty".to_string(),
            ));
        }

        if self.interval < MIN_INTERVAL {
            return Err(ConfigError::ValidationError(format!(
                "interval {:?} is below the minimum of {:?}",
                self.interval, MIN_INTERVAL
            )));
        }

        if self.port == Some(0) {
            return Err(ConfigError::ValidationError(
                "port must be between 1 and 65535".to_string(),
            ));
        }

        if self.ping_command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ping_command cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Probe settings shared by every host.
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            ping_command: self.ping_command.clone(),
        }
    }

    /// One [`Host`] per configured host name, in order.
    pub fn build_hosts(&self) -> Vec<Host> {
        self.hosts
            .iter()
            .map(|address| Host::new(address.trim(), self.port, self.interval))
            .collect()
    }
}
