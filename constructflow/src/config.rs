//! Engine-wide configuration.
//!
//! Aggregates the per-concern configs so an application can load them from
//! one JSON document. Every section is optional and falls back to its
//! default.

use serde::{Deserialize, Serialize};

use crate::combinators::{FixConfig, RetryConfig};
use crate::diagnostics::DebugOptions;
use crate::errors::ConfigError;
use crate::observability::LoggingConfig;

/// Aggregate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default retry policy.
    pub retry: RetryConfig,
    /// Default fixpoint limits.
    pub fix: FixConfig,
    /// Default debug options.
    pub debug: DebugOptions,
    /// Logging setup.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for values that fail validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with logging taken from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            logging: LoggingConfig::from_env(),
            ..Self::default()
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.fix.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
