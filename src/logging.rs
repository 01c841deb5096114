//! Structured Logging for the Relayer
//!
//! Initialises `tracing` once at startup. Pretty output for local
//! development, JSON output for log aggregation in deployments.
//!
//! # Usage
//!
//! ```rust,ignore
//! use atlas_relayer::logging;
//!
//! logging::init("info", false)?;
//! tracing::info!(txn_hash = %hash, "deposit observed");
//! ```

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("logging already initialised")]
    AlreadyInitialised,
}

/// Initialise the global tracing subscriber
///
/// `level` is an env-filter directive (e.g. "info" or
/// "atlas_relayer=debug,hyper=warn"). `RUST_LOG` takes precedence when set.
pub fn init(level: &str, json: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;

    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialised)?;

    Ok(())
}
