//! Logging and tracing utilities

use crate::config::{LogConfig, LogFormat};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber was already installed
    #[error("Tracing already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initialize tracing subscriber with default configuration
///
/// Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    if let Err(e) = try_init_tracing(&LogConfig::default()) {
        eprintln!("Tracing not initialized: {e}");
    }
}

/// Initialize tracing subscriber from a [`LogConfig`]
///
/// `RUST_LOG` takes precedence over `config.default_filter`.
pub fn try_init_tracing(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)
            .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
