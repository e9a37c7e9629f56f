//! Logging configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Environment variable holding the log filter.
pub const LOG_FILTER_ENV: &str = "CONSTRUCTFLOW_LOG";
/// Environment variable holding the log format.
pub const LOG_FORMAT_ENV: &str = "CONSTRUCTFLOW_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON, one object per event.
    Json,
    /// Multi-line, human-readable.
    Pretty,
    /// Single-line.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Configuration for [`super::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info,constructflow=debug`.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Include the event target.
    pub include_target: bool,
    /// Include file and line.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `CONSTRUCTFLOW_LOG` (falling back to `RUST_LOG`) and
    /// `CONSTRUCTFLOW_LOG_FORMAT`, keeping defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let filter = env::var(LOG_FILTER_ENV)
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or(defaults.filter);
        let format = env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or(defaults.format);
        Self {
            filter,
            format,
            ..defaults
        }
    }

    /// Checks that the filter directive parses.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming `filter`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        tracing_subscriber::EnvFilter::try_new(&self.filter)
            .map(|_| ())
            .map_err(|e| ConfigError::invalid("filter", e.to_string()))
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether targets are included.
    #[must_use]
    pub const fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets whether file and line are included.
    #[must_use]
    pub const fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("anything".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::new()
            .with_filter("debug")
            .with_format(LogFormat::Json)
            .with_location(true);
        assert_eq!(config.filter, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_location);
        assert!(config.include_target);
    }

    #[test]
    fn test_validate_filter() {
        assert!(LoggingConfig::default().validate().is_ok());
        assert!(LoggingConfig::new()
            .with_filter("constructflow=debug,warn")
            .validate()
            .is_ok());
        assert!(LoggingConfig::new().with_filter("=[").validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LoggingConfig = serde_json::from_str(r#"{"format": "pretty"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "info");
    }
}
