//! Buffered result accumulation
//!
//! Records produced by discovery tasks are collected in memory and written to
//! the durable collection in batches. Appending and flushing share one mutex,
//! so two flushes can never interleave their load/append/persist steps.
//!
//! When a checkpoint is attached, every flush that persists discovered items
//! also advances the checkpoint to the highest index among them. The
//! checkpoint therefore never points past an item that is not on disk.

use crate::state::HarvestRecord;
use crate::storage::{CheckpointStore, RecordCollection, StoreResult};
use std::sync::{Arc, Mutex};

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flushed {
    /// Number of records persisted
    pub records: usize,
    /// New checkpoint value, if the flush advanced it
    pub checkpoint: Option<i64>,
}

/// In-memory accumulator in front of a record collection
pub struct ResultBuffer {
    limit: usize,
    collection: Arc<dyn RecordCollection>,
    checkpoint: Option<(Arc<dyn CheckpointStore>, String)>,
    pending: Mutex<Vec<HarvestRecord>>,
}

impl ResultBuffer {
    pub fn new(limit: usize, collection: Arc<dyn RecordCollection>) -> Self {
        Self {
            limit: limit.max(1),
            collection,
            checkpoint: None,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Advances `key` in `store` whenever discovered items are persisted
    pub fn with_checkpoint(mut self, store: Arc<dyn CheckpointStore>, key: impl Into<String>) -> Self {
        self.checkpoint = Some((store, key.into()));
        self
    }

    /// Buffers a record, flushing once the limit is reached
    ///
    /// Filtered records are ignored.
    pub fn offer(&self, record: HarvestRecord) -> StoreResult<Option<Flushed>> {
        if record.is_filtered() {
            return Ok(None);
        }

        let mut pending = self.pending.lock().unwrap();
        pending.push(record);
        if pending.len() >= self.limit {
            return self.flush_locked(&mut pending).map(Some);
        }
        Ok(None)
    }

    /// Persists all buffered records
    ///
    /// A no-op on an empty buffer. If the collection rejects the batch, the
    /// records stay buffered for the next flush.
    pub fn flush(&self) -> StoreResult<Flushed> {
        let mut pending = self.pending.lock().unwrap();
        self.flush_locked(&mut pending)
    }

    /// Number of records waiting for the next flush
    pub fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn flush_locked(&self, pending: &mut Vec<HarvestRecord>) -> StoreResult<Flushed> {
        if pending.is_empty() {
            return Ok(Flushed::default());
        }

        self.collection.append(pending)?;

        let records = pending.len();
        let highest = pending
            .iter()
            .filter_map(|r| r.as_discovered())
            .map(|item| item.sequence_index as i64)
            .max();
        pending.clear();
        tracing::debug!("Flushed {} records", records);

        let mut checkpoint = None;
        if let (Some((store, key)), Some(highest)) = (&self.checkpoint, highest) {
            if store.write_if_greater(key, highest)? {
                tracing::debug!("Checkpoint {} advanced to {}", key, highest);
                checkpoint = Some(highest);
            }
        }

        Ok(Flushed {
            records,
            checkpoint,
        })
    }
}

impl Drop for ResultBuffer {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().map(|p| p.len()).unwrap_or(0);
        if pending > 0 {
            tracing::warn!("Result buffer dropped with {} unflushed records", pending);
        }
    }
}
