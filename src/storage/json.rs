//! JSON file storage backend
//!
//! Each store is one pretty-printed JSON document. Every write serializes the
//! whole document into a temporary file in the same directory, syncs it, and
//! renames it over the target, so a crash leaves either the old or the new
//! document on disk.

use crate::state::HarvestRecord;
use crate::storage::traits::{CheckpointStore, RecordCollection, StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `bytes`
///
/// The content is written to a temporary file in the target's directory,
/// synced, and renamed over the target.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.display().to_string(),
        message: e.error.to_string(),
    })?;
    Ok(())
}

/// Atomically replaces `path` with the JSON encoding of `value`
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes_atomic(path, &bytes)
}

/// Reads a JSON document, returning `None` if the file does not exist
fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Checkpoint store backed by a flat JSON object of integer values
///
/// The document is cached in memory. A write builds the next version, persists
/// it, and only then publishes it to readers.
pub struct JsonCheckpointStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, i64>>,
}

impl JsonCheckpointStore {
    /// Opens the checkpoint file, creating it with `initial` entries if missing
    pub fn open(path: impl Into<PathBuf>, initial: &[(&str, i64)]) -> StoreResult<Self> {
        let path = path.into();

        let entries = match read_json::<BTreeMap<String, i64>>(&path)? {
            Some(entries) => entries,
            None => {
                let entries: BTreeMap<String, i64> = initial
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect();
                write_json_atomic(&path, &entries)?;
                tracing::debug!("Created checkpoint file {}", path.display());
                entries
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Reads the checkpoint file without creating it; a missing file has no
    /// entries
    pub fn open_existing(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let entries: BTreeMap<String, i64> = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn commit(&self, entries: &mut BTreeMap<String, i64>, key: &str, value: i64) -> StoreResult<()> {
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        write_json_atomic(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn read(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.entries.lock().unwrap().get(key).copied())
    }

    fn write_if_greater(&self, key: &str, candidate: i64) -> StoreResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        if matches!(entries.get(key), Some(current) if *current >= candidate) {
            return Ok(false);
        }
        self.commit(&mut entries, key, candidate)?;
        Ok(true)
    }

    fn advance(&self, key: &str, value: i64) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        self.commit(&mut entries, key, value)
    }

    fn entries(&self) -> StoreResult<BTreeMap<String, i64>> {
        Ok(self.entries.lock().unwrap().clone())
    }
}

/// Record collection backed by a JSON array
pub struct JsonRecordCollection {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRecordCollection {
    /// Opens the collection, creating an empty array if the file is missing
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if !path.exists() {
            write_json_atomic(&path, &Vec::<HarvestRecord>::new())?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Opens a collection that must already exist
    pub fn open_existing(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(StoreError::MissingCollection(path.display().to_string()));
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn load_unlocked(&self) -> StoreResult<Vec<HarvestRecord>> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }
}

impl RecordCollection for JsonRecordCollection {
    fn load(&self) -> StoreResult<Vec<HarvestRecord>> {
        let _guard = self.lock.lock().unwrap();
        self.load_unlocked()
    }

    fn append(&self, records: &[HarvestRecord]) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.lock.lock().unwrap();
        let mut all = self.load_unlocked()?;
        all.extend_from_slice(records);
        write_json_atomic(&self.path, &all)
    }
}
