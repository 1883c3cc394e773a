//! Configuration validation utilities.

use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `500ms`, `1m30s`, etc.
///
/// # Examples
///
/// ```
/// use hostwatch::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("500ms").unwrap().as_millis(), 500);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a probe interval: plain seconds (`0.5`, `2`) or a humantime
/// duration (`500ms`, `2s`).
///
/// # Examples
///
/// ```
/// use hostwatch::config::parse_interval;
/// use std::time::Duration;
///
/// assert_eq!(parse_interval("0.5").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_interval("2s").unwrap(), Duration::from_secs(2));
/// ```
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    match s.parse::<f64>() {
        Ok(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("invalid interval '{}': must be a finite, non-negative number", s)),
        Err(_) => parse_duration(s),
    }
}
