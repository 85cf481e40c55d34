//! SQLite storage implementation
//!
//! One database file holds both checkpoint namespaces and the results
//! collection. The connection is shared behind a mutex, which serializes every
//! write; each write is a single statement or transaction, so it commits
//! completely or not at all.

use crate::state::{DiscoveredItem, FaultRecord, HarvestRecord};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, RecordCollection, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite storage backend
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns the checkpoint store for one namespace
    pub fn checkpoints(&self, namespace: &str) -> SqliteCheckpointStore {
        SqliteCheckpointStore {
            conn: self.conn.clone(),
            namespace: namespace.to_string(),
        }
    }

    /// Returns the results collection
    pub fn records(&self) -> SqliteRecordCollection {
        SqliteRecordCollection {
            conn: self.conn.clone(),
        }
    }
}

/// Checkpoint entries of one namespace
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl CheckpointStore for SqliteCheckpointStore {
    fn read(&self, key: &str) -> StoreResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM checkpoints WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_if_greater(&self, key: &str, candidate: i64) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT INTO checkpoints (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at
             WHERE excluded.value > checkpoints.value",
            params![self.namespace, key, candidate, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    fn advance(&self, key: &str, value: i64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checkpoints (namespace, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(namespace, key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.namespace, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn entries(&self) -> StoreResult<BTreeMap<String, i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key, value FROM checkpoints WHERE namespace = ?1")?;
        let rows = stmt.query_map(params![self.namespace], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            entries.insert(key, value);
        }
        Ok(entries)
    }
}

/// Results collection stored in the `records` table
pub struct SqliteRecordCollection {
    conn: Arc<Mutex<Connection>>,
}

const KIND_DISCOVERED: &str = "discovered";
const KIND_FAULT: &str = "fault";

impl RecordCollection for SqliteRecordCollection {
    fn load(&self) -> StoreResult<Vec<HarvestRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT kind, iter, url, title, error, recorded_at FROM records ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (kind, iter, url, title, error, recorded_at) = row?;
            let iter = iter as u64;
            let record = match kind.as_str() {
                KIND_DISCOVERED => HarvestRecord::Discovered(DiscoveredItem::new(
                    iter,
                    url,
                    title.unwrap_or_default(),
                )),
                KIND_FAULT => HarvestRecord::Fault(FaultRecord {
                    iter,
                    url,
                    error: error.unwrap_or_default(),
                    recorded_at: recorded_at
                        .as_deref()
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                }),
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "unknown record kind '{}' for iter {}",
                        other, iter
                    )))
                }
            };
            records.push(record);
        }
        Ok(records)
    }

    fn append(&self, records: &[HarvestRecord]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (kind, iter, url, title, error, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                match record {
                    HarvestRecord::Discovered(item) => {
                        stmt.execute(params![
                            KIND_DISCOVERED,
                            item.sequence_index as i64,
                            item.source_url,
                            item.title,
                            Option::<String>::None,
                            Option::<String>::None,
                        ])?;
                    }
                    HarvestRecord::Fault(fault) => {
                        stmt.execute(params![
                            KIND_FAULT,
                            fault.iter as i64,
                            fault.url,
                            Option::<String>::None,
                            fault.error,
                            fault.recorded_at.map(|dt| dt.to_rfc3339()),
                        ])?;
                    }
                    HarvestRecord::Filtered(_) => {}
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
