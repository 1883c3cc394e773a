//! Configuration module for hostwatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Hosts to monitor
//! - Probe interval and optional TCP port
//! - Echo command used for ICMP probes

mod app;
mod validation;

pub use app::{AppConfig, DEFAULT_INTERVAL};
pub use validation::{ConfigError, parse_duration, parse_interval};
