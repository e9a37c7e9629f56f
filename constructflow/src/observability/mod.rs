//! Logging setup for applications embedding the engine.

mod config;
mod logging;

pub use config::{LogFormat, LoggingConfig, LOG_FILTER_ENV, LOG_FORMAT_ENV};
pub use logging::init_logging;
