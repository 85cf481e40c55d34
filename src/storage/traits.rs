//! Storage traits and error types
//!
//! This module defines the two persistence seams of the harvester: a
//! key-value checkpoint store and an append-only record collection.

use crate::state::HarvestRecord;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to replace {path}: {message}")]
    Persist { path: String, message: String },

    #[error("Missing results collection: {0}")]
    MissingCollection(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable key-value progress record
///
/// Implementations serialize all writes through one lock, and a write either
/// lands completely or not at all. Readers always see the latest committed
/// value.
pub trait CheckpointStore: Send + Sync {
    /// Reads the value stored under `key`
    fn read(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Stores `candidate` only if it exceeds the current value (or no value
    /// exists yet)
    ///
    /// Returns whether the store was advanced.
    fn write_if_greater(&self, key: &str, candidate: i64) -> StoreResult<bool>;

    /// Unconditionally overwrites the value stored under `key`
    fn advance(&self, key: &str, value: i64) -> StoreResult<()>;

    /// Returns every stored entry
    fn entries(&self) -> StoreResult<BTreeMap<String, i64>>;
}

/// Durable append-only collection of harvest records
pub trait RecordCollection: Send + Sync {
    /// Loads the full collection in insertion order
    fn load(&self) -> StoreResult<Vec<HarvestRecord>>;

    /// Appends records as one atomic unit
    fn append(&self, records: &[HarvestRecord]) -> StoreResult<()>;

    /// Number of stored records
    fn count(&self) -> StoreResult<usize> {
        Ok(self.load()?.len())
    }
}
