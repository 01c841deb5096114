//! Durable key-value persistence for scan cursors

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryCursorStore;
pub use sqlite::SqliteCursorStore;
pub use traits::{CursorStore, StorageError, StorageResult};
