//! Storage Trait Definitions
//!
//! Narrow key-value interface for the scanner's durable cursors. The
//! backing store (SQLite, in-memory) is swappable without touching
//! scanner logic.

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid data for {0}: {1}")]
    InvalidData(String, String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable cursor store
///
/// Implementations:
/// - `SqliteCursorStore` - Production storage with SQLite
/// - `MemoryCursorStore` - In-memory storage for testing
///
/// `set` must persist durably before returning; the scanner relies on this
/// to guarantee a crash never silently skips a block range. Values default
/// to 0 for absent keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Read a cursor value, 0 when the key has never been written
    async fn get(&self, key: &str) -> StorageResult<i64>;

    /// Durably persist a cursor value
    async fn set(&self, key: &str, value: i64) -> StorageResult<()>;
}
