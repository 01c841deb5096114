//! SQLite Persistent Storage for Scan Cursors
//!
//! Durable storage that survives service restarts. Uses connection pooling
//! via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{CursorStore, StorageError, StorageResult};

/// SQLite-backed cursor store with connection pooling
pub struct SqliteCursorStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCursorStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;

            CREATE TABLE IF NOT EXISTS scan_cursors (
                stream_key TEXT PRIMARY KEY,
                value INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_sync(&self, key: &str) -> StorageResult<i64> {
        let conn = self.conn()?;

        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM scan_cursors WHERE stream_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(value.unwrap_or(0))
    }

    fn set_sync(&self, key: &str, value: i64) -> StorageResult<()> {
        let conn = self.conn()?;
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            r#"
            INSERT INTO scan_cursors (stream_key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (stream_key) DO UPDATE
            SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, now],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn get(&self, key: &str) -> StorageResult<i64> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: i64) -> StorageResult<()> {
        self.set_sync(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_key_defaults_to_zero() {
        let store = SqliteCursorStore::in_memory().unwrap();
        assert_eq!(store.get("btc:testnet:last_scanned_height").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SqliteCursorStore::in_memory().unwrap();

        store.set("btc:testnet:last_scanned_height", 4_210).await.unwrap();
        assert_eq!(
            store.get("btc:testnet:last_scanned_height").await.unwrap(),
            4_210
        );
    }

    #[tokio::test]
    async fn test_overwrite() {
        let store = SqliteCursorStore::in_memory().unwrap();

        store.set("k", 1).await.unwrap();
        store.set("k", 2).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let store = SqliteCursorStore::in_memory().unwrap();

        store.set("btc:testnet:last_scanned_height", 100).await.unwrap();
        store
            .set("btc:testnet:last_processed_confirmed_time", 1_700_000_000_000)
            .await
            .unwrap();

        assert_eq!(
            store.get("btc:testnet:last_scanned_height").await.unwrap(),
            100
        );
        assert_eq!(
            store
                .get("btc:testnet:last_processed_confirmed_time")
                .await
                .unwrap(),
            1_700_000_000_000
        );
    }
}
