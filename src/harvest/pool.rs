//! Bounded worker pool
//!
//! A fixed number of workers pull units from a shared source and run each to
//! completion before taking the next. The cancellation token is checked before
//! every unit: once it fires, no new unit starts, while units already running
//! finish normally. Each unit runs as its own task, so a panic loses only that
//! unit and its worker moves on to the next one.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Counters describing one pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Units that ran to completion
    pub completed: usize,
    /// Units that panicked
    pub panicked: usize,
    /// Whether dispatch stopped because of cancellation
    pub cancelled: bool,
}

/// Fixed-size pool of async workers
pub struct WorkerPool {
    workers: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    /// Runs `work` once per unit until the source is exhausted or the pool is
    /// cancelled
    pub async fn run<T, I, F, Fut>(&self, units: I, work: F) -> PoolSummary
    where
        T: Send + 'static,
        I: Iterator<Item = T> + Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let units = Arc::new(Mutex::new(units));
        let work = Arc::new(work);
        let completed = Arc::new(AtomicUsize::new(0));
        let panicked = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();

        for worker_id in 0..self.workers {
            let units = units.clone();
            let work = work.clone();
            let completed = completed.clone();
            let panicked = panicked.clone();
            let cancel = self.cancel.clone();

            set.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = units.lock().unwrap().next();
                    let Some(unit) = next else {
                        break;
                    };
                    match tokio::spawn(work(unit)).await {
                        Ok(()) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            panicked.fetch_add(1, Ordering::Relaxed);
                            tracing::error!("Worker {} lost a unit: {}", worker_id, e);
                        }
                    }
                }
                tracing::trace!("Worker {} stopped", worker_id);
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker terminated abnormally: {}", e);
            }
        }

        PoolSummary {
            completed: completed.load(Ordering::Relaxed),
            panicked: panicked.load(Ordering::Relaxed),
            cancelled: self.cancel.is_cancelled(),
        }
    }
}
