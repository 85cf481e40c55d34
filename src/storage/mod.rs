//! Storage module for persisting harvest progress
//!
//! This module handles all durable state of the harvester:
//! - Checkpoint stores (discovery high-water mark, per-item page numbers)
//! - The append-only results collection
//! - JSON file and SQLite backends, selected by configuration

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::{write_bytes_atomic, write_json_atomic, JsonCheckpointStore, JsonRecordCollection};
pub use sqlite::{SqliteCheckpointStore, SqliteRecordCollection, SqliteStore};
pub use traits::{CheckpointStore, RecordCollection, StoreError, StoreResult};

use crate::config::{StorageBackend, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Checkpoint key holding the discovery high-water mark
pub const MAX_ITER_KEY: &str = "max_iter";

/// Value of the discovery checkpoint before anything was recorded
pub const NO_PROGRESS: i64 = -1;

const DISCOVERY_NAMESPACE: &str = "discovery";
const RETRIEVAL_NAMESPACE: &str = "retrieval";

/// The pair of stores one pass works against
#[derive(Clone)]
pub struct Stores {
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub records: Arc<dyn RecordCollection>,
}

/// Opens the stores used by the discovery pass, creating them if missing
pub fn open_discovery_stores(config: &StorageConfig) -> StoreResult<Stores> {
    match config.backend {
        StorageBackend::Json => Ok(Stores {
            checkpoints: Arc::new(JsonCheckpointStore::open(
                &config.discovery_checkpoint_path,
                &[(MAX_ITER_KEY, NO_PROGRESS)],
            )?),
            records: Arc::new(JsonRecordCollection::open(&config.results_path)?),
        }),
        StorageBackend::Sqlite => {
            let store = SqliteStore::open(Path::new(&config.database_path))?;
            Ok(Stores {
                checkpoints: Arc::new(store.checkpoints(DISCOVERY_NAMESPACE)),
                records: Arc::new(store.records()),
            })
        }
    }
}

/// Opens the stores used by the retrieval pass
///
/// The results collection must already exist; the retrieval checkpoint is
/// created on first use.
pub fn open_retrieval_stores(config: &StorageConfig) -> StoreResult<Stores> {
    match config.backend {
        StorageBackend::Json => {
            let records = JsonRecordCollection::open_existing(&config.results_path)?;
            Ok(Stores {
                checkpoints: Arc::new(JsonCheckpointStore::open(
                    &config.retrieval_checkpoint_path,
                    &[],
                )?),
                records: Arc::new(records),
            })
        }
        StorageBackend::Sqlite => {
            let path = Path::new(&config.database_path);
            if !path.exists() {
                return Err(StoreError::MissingCollection(path.display().to_string()));
            }
            let store = SqliteStore::open(path)?;
            Ok(Stores {
                checkpoints: Arc::new(store.checkpoints(RETRIEVAL_NAMESPACE)),
                records: Arc::new(store.records()),
            })
        }
    }
}

/// Stores of both passes, opened for inspection
pub struct StatusStores {
    pub records: Arc<dyn RecordCollection>,
    pub discovery: Arc<dyn CheckpointStore>,
    pub retrieval: Arc<dyn CheckpointStore>,
}

/// Opens every store without creating anything that is missing
///
/// Fails with `StoreError::MissingCollection` when no results exist yet.
pub fn open_status_stores(config: &StorageConfig) -> StoreResult<StatusStores> {
    match config.backend {
        StorageBackend::Json => Ok(StatusStores {
            records: Arc::new(JsonRecordCollection::open_existing(&config.results_path)?),
            discovery: Arc::new(JsonCheckpointStore::open_existing(
                &config.discovery_checkpoint_path,
            )?),
            retrieval: Arc::new(JsonCheckpointStore::open_existing(
                &config.retrieval_checkpoint_path,
            )?),
        }),
        StorageBackend::Sqlite => {
            let path = Path::new(&config.database_path);
            if !path.exists() {
                return Err(StoreError::MissingCollection(path.display().to_string()));
            }
            let store = SqliteStore::open(path)?;
            Ok(StatusStores {
                records: Arc::new(store.records()),
                discovery: Arc::new(store.checkpoints(DISCOVERY_NAMESPACE)),
                retrieval: Arc::new(store.checkpoints(RETRIEVAL_NAMESPACE)),
            })
        }
    }
}
