//! Discovery orchestrator
//!
//! Probes randomly sampled identifiers through a bounded worker pool. Each task
//! index maps to one sample; the index is only a progress token, the sample
//! selects the remote document.
//!
//! Outcomes feed three shared pieces of state:
//! - the result buffer (discovered items and fault records),
//! - the discovery checkpoint (advanced by the buffer as items are persisted),
//! - the failure breaker, which aborts the run after a streak of faults.

use crate::config::DiscoveryConfig;
use crate::harvest::breaker::FailureBreaker;
use crate::harvest::buffer::ResultBuffer;
use crate::harvest::pool::WorkerPool;
use crate::remote::{Probe, Prober};
use crate::state::{DiscoveredItem, FaultRecord, HarvestRecord, ProbeOutcome};
use crate::storage::{Stores, MAX_ITER_KEY, NO_PROGRESS};
use crate::HarvestError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Summary of one discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// First task index of this run
    pub start_index: u64,
    /// Probes that completed
    pub attempted: u64,
    pub relevant: u64,
    pub irrelevant: u64,
    pub not_found: u64,
    pub faults: u64,
    /// Checkpoint value after the final flush
    pub checkpoint: i64,
    /// Whether the run stopped because of an operator interrupt
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Discovery {}", if self.interrupted { "interrupted" } else { "finished" })?;
        writeln!(f, "  Started at index:  {}", self.start_index)?;
        writeln!(f, "  Probes completed:  {}", self.attempted)?;
        writeln!(f, "  Relevant:          {}", self.relevant)?;
        writeln!(f, "  Excluded:          {}", self.irrelevant)?;
        writeln!(f, "  Not found:         {}", self.not_found)?;
        writeln!(f, "  Faults:            {}", self.faults)?;
        writeln!(f, "  Checkpoint:        {}", self.checkpoint)?;
        write!(f, "  Elapsed:           {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// Discovery pass over the task range `[checkpoint + 1, total_iterations)`
pub struct Discovery {
    config: DiscoveryConfig,
    prober: Arc<dyn Prober>,
    stores: Stores,
}

/// State shared by all tasks of one run
struct RunState {
    buffer: ResultBuffer,
    breaker: FailureBreaker,
    abort: CancellationToken,
    aborted: AtomicBool,
    attempted: AtomicU64,
    relevant: AtomicU64,
    irrelevant: AtomicU64,
    not_found: AtomicU64,
    faults: AtomicU64,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, prober: Arc<dyn Prober>, stores: Stores) -> Self {
        Self {
            config,
            prober,
            stores,
        }
    }

    /// Runs the discovery pass until the range is exhausted, the failure
    /// threshold is crossed, or `cancel` fires
    ///
    /// The result buffer is flushed on every exit path. Crossing the failure
    /// threshold returns `HarvestError::FailureThreshold` after the flush;
    /// an interrupt returns a report with `interrupted` set.
    pub async fn run(&self, cancel: CancellationToken) -> Result<DiscoveryReport, HarvestError> {
        let started = Instant::now();
        let checkpoint = self
            .stores
            .checkpoints
            .read(MAX_ITER_KEY)?
            .unwrap_or(NO_PROGRESS);
        let start_index = u64::try_from(checkpoint.saturating_add(1)).unwrap_or(0);
        let total = self.config.total_iterations;

        tracing::info!(
            "Starting discovery from index {} (checkpoint {}), {} tasks remaining",
            start_index,
            checkpoint,
            total.saturating_sub(start_index)
        );

        // A threshold abort cancels the child only, so it never looks like an
        // operator interrupt to the caller.
        let abort = cancel.child_token();
        let state = Arc::new(RunState {
            buffer: ResultBuffer::new(self.config.buffer_limit, self.stores.records.clone())
                .with_checkpoint(self.stores.checkpoints.clone(), MAX_ITER_KEY),
            breaker: FailureBreaker::new(self.config.max_consecutive_failures),
            abort: abort.clone(),
            aborted: AtomicBool::new(false),
            attempted: AtomicU64::new(0),
            relevant: AtomicU64::new(0),
            irrelevant: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        });

        let pool = WorkerPool::new(self.config.workers, abort);
        let prober = self.prober.clone();
        let max_id = self.config.max_id;
        let task_state = state.clone();

        let summary = pool
            .run(start_index..total, move |index| {
                let prober = prober.clone();
                let state = task_state.clone();
                async move {
                    let identifier = fastrand::u64(0..=max_id);
                    let probe = prober.probe(identifier).await;
                    state.settle(index, probe);
                }
            })
            .await;

        if summary.panicked > 0 {
            tracing::warn!("{} probes panicked and were not recorded", summary.panicked);
        }

        let flushed = state.buffer.flush();
        if let Err(e) = &flushed {
            tracing::error!("Final flush of discovery results failed: {}", e);
        }

        let checkpoint = self
            .stores
            .checkpoints
            .read(MAX_ITER_KEY)?
            .unwrap_or(NO_PROGRESS);

        if state.aborted.load(Ordering::SeqCst) {
            return Err(HarvestError::FailureThreshold {
                consecutive: state.breaker.consecutive(),
            });
        }
        flushed?;

        let report = DiscoveryReport {
            start_index,
            attempted: state.attempted.load(Ordering::Relaxed),
            relevant: state.relevant.load(Ordering::Relaxed),
            irrelevant: state.irrelevant.load(Ordering::Relaxed),
            not_found: state.not_found.load(Ordering::Relaxed),
            faults: state.faults.load(Ordering::Relaxed),
            checkpoint,
            interrupted: cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };

        if report.interrupted {
            tracing::info!("Discovery interrupted after {} probes, results flushed", report.attempted);
        } else {
            tracing::info!(
                "Discovery complete: {} relevant, {} faults in {:.1}s",
                report.relevant,
                report.faults,
                report.elapsed.as_secs_f64()
            );
        }
        Ok(report)
    }
}

impl RunState {
    /// Applies the outcome of one probe
    fn settle(&self, index: u64, probe: Probe) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        let Probe { url, outcome } = probe;

        match outcome {
            ProbeOutcome::NotFound => {
                self.not_found.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("[{}] {} not found", index, url);
            }
            ProbeOutcome::Irrelevant(title) => {
                self.irrelevant.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("[{}] {} excluded: {}", index, url, title);
                self.offer(HarvestRecord::Filtered(DiscoveredItem::new(index, url, title)));
            }
            ProbeOutcome::Relevant(title) => {
                self.relevant.fetch_add(1, Ordering::Relaxed);
                tracing::info!("[{}] Found {}: {}", index, url, title);
                self.offer(HarvestRecord::Discovered(DiscoveredItem::new(index, url, title)));
                self.breaker.record_success();
            }
            ProbeOutcome::TransientError(message) | ProbeOutcome::FatalContentError(message) => {
                self.faults.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("[{}] {} failed: {}", index, url, message);
                self.offer(HarvestRecord::Fault(FaultRecord::new(index, url, message)));
                if self.breaker.record_failure() {
                    self.trip();
                }
            }
        }
    }

    fn offer(&self, record: HarvestRecord) {
        if let Err(e) = self.buffer.offer(record) {
            tracing::error!("Failed to persist discovery results: {}", e);
        }
    }

    /// Stops dispatch; the abort is reported once however many tasks see the
    /// threshold crossed
    fn trip(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::error!(
                "{} consecutive failures reached, aborting discovery",
                self.breaker.threshold()
            );
        }
        self.abort.cancel();
    }
}
