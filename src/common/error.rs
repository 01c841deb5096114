//! Common Error Types for the Relayer
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

/// Root error type for the relayer
#[derive(Debug, Error)]
pub enum RelayerError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Bitcoin chain access errors
    #[error("bitcoin error: {0}")]
    Bitcoin(#[from] crate::relay::btc::BtcClientError),

    /// Ledger chain access errors
    #[error("ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    /// Cursor persistence errors
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Retry request errors
    #[error("retry error: {0}")]
    Retry(#[from] crate::relay::retry::RetryError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayerError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the owning loop should retry on its next tick
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayerError::Bitcoin(_) | RelayerError::Ledger(_) | RelayerError::Io(_)
        )
    }

    /// Get error code for API responses and log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayerError::Config(_) => "CONFIG_ERROR",
            RelayerError::Bitcoin(_) => "BITCOIN_ERROR",
            RelayerError::Ledger(_) => "LEDGER_ERROR",
            RelayerError::Storage(_) => "STORAGE_ERROR",
            RelayerError::Retry(_) => "RETRY_ERROR",
            RelayerError::Validation(_) => "VALIDATION_ERROR",
            RelayerError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using RelayerError
pub type Result<T> = std::result::Result<T, RelayerError>;
