//! Structured tracing helpers.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";

/// Raised when a global subscriber is already installed.
#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {reason}")]
pub struct TelemetryError {
    reason: String,
}

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (or `info`).
///
/// # Errors
///
/// Fails when another global subscriber has already been set.
pub fn try_init(default_filter: Option<&str>) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or(DEFAULT_FILTER)));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError {
            reason: err.to_string(),
        })
}

/// Like [`try_init`] with the default filter; a second call is a no-op.
pub fn init() {
    if let Err(err) = try_init(None) {
        tracing::debug!(%err, "tracing already initialised");
    }
}
