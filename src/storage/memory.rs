//! In-Memory Storage Implementation
//!
//! Cursor storage for testing and development. Data is lost when the
//! service restarts, so it must never back a deployed scanner.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{CursorStore, StorageError, StorageResult};

/// In-memory cursor store
///
/// Thread-safe via Arc<RwLock<>> for concurrent access.
#[derive(Clone, Default)]
pub struct MemoryCursorStore {
    values: Arc<RwLock<HashMap<String, i64>>>,
    /// When set, every `set` call fails; used to exercise batch-abort paths
    fail_writes: Arc<RwLock<bool>>,
}

impl MemoryCursorStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated write failures (test hook)
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, key: &str) -> StorageResult<i64> {
        let values = self.values.read().await;
        Ok(values.get(key).copied().unwrap_or(0))
    }

    async fn set(&self, key: &str, value: i64) -> StorageResult<()> {
        if *self.fail_writes.read().await {
            return Err(StorageError::Database("simulated write failure".to_string()));
        }

        let mut values = self.values.write().await;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
