//! Subscriber set-up for the `hiveden` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary so embedding applications keep control of their output.

use std::io;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that overrides the configured level.
pub const LOG_ENV_VAR: &str = "RUST_LOG";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// Raised when the filter directive cannot be parsed.
    #[error("invalid log filter '{0}'")]
    InvalidFilter(String),
    /// Raised when a global subscriber is already installed.
    #[error("logging initialisation failed: {0}")]
    Init(String),
}

/// Builds the filter from `RUST_LOG`, falling back to `default_level`.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] when the chosen directive does
/// not parse.
pub fn build_filter(env_value: Option<&str>, default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = env_value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default_level);
    EnvFilter::try_new(directive).map_err(|_| LoggingError::InvalidFilter(directive.to_owned()))
}

/// Installs a formatting subscriber that writes to stderr, leaving stdout
/// to command output.
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(default_level: &str) -> Result<(), LoggingError> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(env_value.as_deref(), default_level)?;
    let fmt_layer = fmt::layer().with_writer(io::stderr).with_target(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}
