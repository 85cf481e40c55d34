//! Retrieval orchestrator
//!
//! Downloads the page images of every discovered item. Items run
//! concurrently through the worker pool; the pages of one item are fetched
//! strictly in order, and the item's checkpoint is advanced after each stored
//! page. The remote host publishes no page count, so an item ends when the
//! next page cannot be fetched within the configured number of attempts.

use crate::config::RetrievalConfig;
use crate::harvest::pool::WorkerPool;
use crate::remote::{PageFetcher, PageUrlScheme};
use crate::state::DiscoveredItem;
use crate::storage::{write_bytes_atomic, CheckpointStore, StoreResult, Stores};
use crate::HarvestError;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Summary of one retrieval run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalReport {
    /// Items scheduled for retrieval
    pub items: u64,
    /// Fault records found in the collection and not scheduled
    pub faults_skipped: u64,
    /// Repeated discoveries of an already scheduled item
    pub duplicates_skipped: u64,
    /// Items whose stored page checkpoint is not a valid page number
    pub corrupt_checkpoints: u64,
    pub pages_fetched: u64,
    /// Items whose page sequence was followed to its end
    pub items_completed: u64,
    /// Items stopped by a storage failure
    pub item_errors: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl fmt::Display for RetrievalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Retrieval {}", if self.interrupted { "interrupted" } else { "finished" })?;
        writeln!(f, "  Items scheduled:   {}", self.items)?;
        writeln!(f, "  Items completed:   {}", self.items_completed)?;
        writeln!(f, "  Items failed:      {}", self.item_errors)?;
        writeln!(f, "  Pages fetched:     {}", self.pages_fetched)?;
        writeln!(f, "  Faults skipped:    {}", self.faults_skipped)?;
        writeln!(f, "  Duplicates:        {}", self.duplicates_skipped)?;
        writeln!(f, "  Bad checkpoints:   {}", self.corrupt_checkpoints)?;
        write!(f, "  Elapsed:           {:.1}s", self.elapsed.as_secs_f64())
    }
}

/// One item and the page its loop starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemJob {
    pub item: DiscoveredItem,
    pub start_page: u32,
}

/// Work derived from the results collection
#[derive(Debug, Default)]
struct Plan {
    jobs: Vec<ItemJob>,
    faults: u64,
    duplicates: u64,
    corrupt: u64,
}

/// Retrieval pass over the discovered items of the results collection
pub struct Retrieval {
    config: RetrievalConfig,
    downloads_dir: PathBuf,
    scheme: PageUrlScheme,
    fetcher: Arc<dyn PageFetcher>,
    stores: Stores,
}

/// State shared by all item loops of one run
struct ItemContext {
    config: RetrievalConfig,
    downloads_dir: PathBuf,
    scheme: PageUrlScheme,
    fetcher: Arc<dyn PageFetcher>,
    checkpoints: Arc<dyn CheckpointStore>,
    cancel: CancellationToken,
    pages_fetched: AtomicU64,
    items_completed: AtomicU64,
    item_errors: AtomicU64,
}

/// Result of fetching one page with retries
enum PageFetch {
    Fetched(Vec<u8>),
    /// Every attempt failed
    Exhausted,
    Interrupted,
}

/// How an item loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemEnd {
    /// The next page could not be fetched
    Exhausted,
    Interrupted,
}

impl Retrieval {
    pub fn new(
        config: RetrievalConfig,
        downloads_dir: impl Into<PathBuf>,
        scheme: PageUrlScheme,
        fetcher: Arc<dyn PageFetcher>,
        stores: Stores,
    ) -> Self {
        Self {
            config,
            downloads_dir: downloads_dir.into(),
            scheme,
            fetcher,
            stores,
        }
    }

    /// Lists the items this run would retrieve, with their start pages
    pub fn jobs(&self) -> StoreResult<Vec<ItemJob>> {
        Ok(self.plan()?.jobs)
    }

    fn plan(&self) -> StoreResult<Plan> {
        let records = self.stores.records.load()?;
        let progress = self.stores.checkpoints.entries()?;

        let mut plan = Plan::default();
        let mut seen = HashSet::new();
        for record in records {
            let Some(item) = record.as_discovered() else {
                plan.faults += 1;
                continue;
            };
            // Two loops on one item would race on its checkpoint
            if !seen.insert(item.sequence_index) {
                plan.duplicates += 1;
                continue;
            }

            let start_page = match progress.get(&item.item_id()) {
                None => self.config.start_page,
                Some(&last) => match u32::try_from(last.saturating_add(1)) {
                    Ok(next) => next,
                    // Restarting would move the checkpoint backwards
                    Err(_) => {
                        tracing::warn!(
                            "[{}] skipped: stored page checkpoint {} is not a page number",
                            item.item_id(),
                            last
                        );
                        plan.corrupt += 1;
                        continue;
                    }
                },
            };
            plan.jobs.push(ItemJob {
                item: item.clone(),
                start_page,
            });
        }
        Ok(plan)
    }

    /// Runs every item loop to its end or until `cancel` fires
    ///
    /// A failing item never affects its siblings. Running items stop at the
    /// next page boundary once cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RetrievalReport, HarvestError> {
        let started = Instant::now();
        let plan = self.plan()?;
        let items = plan.jobs.len() as u64;

        tracing::info!(
            "Retrieving {} items ({} fault records, {} duplicates skipped)",
            items,
            plan.faults,
            plan.duplicates
        );

        let context = Arc::new(ItemContext {
            config: self.config.clone(),
            downloads_dir: self.downloads_dir.clone(),
            scheme: self.scheme.clone(),
            fetcher: self.fetcher.clone(),
            checkpoints: self.stores.checkpoints.clone(),
            cancel: cancel.clone(),
            pages_fetched: AtomicU64::new(0),
            items_completed: AtomicU64::new(0),
            item_errors: AtomicU64::new(0),
        });

        let pool = WorkerPool::new(self.config.workers, cancel.clone());
        let task_context = context.clone();
        let summary = pool
            .run(plan.jobs.into_iter(), move |job| {
                let context = task_context.clone();
                async move { context.retrieve(job).await }
            })
            .await;

        if summary.panicked > 0 {
            tracing::warn!("{} item loops panicked", summary.panicked);
        }

        let report = RetrievalReport {
            items,
            faults_skipped: plan.faults,
            duplicates_skipped: plan.duplicates,
            corrupt_checkpoints: plan.corrupt,
            pages_fetched: context.pages_fetched.load(Ordering::Relaxed),
            items_completed: context.items_completed.load(Ordering::Relaxed),
            item_errors: context.item_errors.load(Ordering::Relaxed) + summary.panicked as u64,
            interrupted: cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Retrieval {}: {} pages across {} items",
            if report.interrupted { "interrupted" } else { "complete" },
            report.pages_fetched,
            report.items
        );
        Ok(report)
    }
}

impl ItemContext {
    async fn retrieve(&self, job: ItemJob) {
        let id = job.item.item_id();
        match self.page_loop(&job).await {
            Ok(ItemEnd::Exhausted) => {
                self.items_completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ItemEnd::Interrupted) => {
                tracing::debug!("[{}] interrupted", id);
            }
            Err(e) => {
                self.item_errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!("[{}] stopped: {}", id, e);
            }
        }
    }

    async fn page_loop(&self, job: &ItemJob) -> StoreResult<ItemEnd> {
        let item = &job.item;
        let id = item.item_id();
        let dir = item_dir(&self.downloads_dir, item);
        let delay = Duration::from_millis(self.config.delay_ms);

        let mut page = job.start_page;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(ItemEnd::Interrupted);
            }

            let url = self.scheme.build_page_url(&item.source_url, page);
            let bytes = match self.fetch_with_retries(&id, &url, page).await {
                PageFetch::Fetched(bytes) => bytes,
                PageFetch::Exhausted => {
                    tracing::info!("[{}] finished at page {}", id, page.saturating_sub(1));
                    return Ok(ItemEnd::Exhausted);
                }
                PageFetch::Interrupted => return Ok(ItemEnd::Interrupted),
            };

            write_bytes_atomic(&dir.join(page_file_name(page, &self.config.page_extension)), &bytes)?;
            self.checkpoints.advance(&id, i64::from(page))?;
            self.pages_fetched.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("[{}] downloaded page {}", id, page);

            page += 1;
            self.pause(delay).await;
        }
    }

    /// Fetches one page, trying up to `max_retries` times
    ///
    /// No attempt starts after cancellation, so an interrupted page is never
    /// mistaken for the end of the item.
    async fn fetch_with_retries(&self, id: &str, url: &str, page: u32) -> PageFetch {
        let attempts = self.config.max_retries.max(1);
        let delay = Duration::from_millis(self.config.delay_ms);

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return PageFetch::Interrupted;
            }
            match self.fetcher.fetch_bytes(url).await {
                Ok(bytes) => return PageFetch::Fetched(bytes),
                Err(e) => {
                    tracing::debug!("[{}] page {} attempt {}/{}: {}", id, page, attempt, attempts, e);
                    self.pause(delay).await;
                }
            }
        }
        PageFetch::Exhausted
    }

    /// Sleeps for `delay`, waking early on cancellation
    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// Directory holding the pages of one item: `<iter>_<title>`
pub fn item_dir(downloads_dir: &Path, item: &DiscoveredItem) -> PathBuf {
    let title: String = item
        .display_title()
        .trim()
        .chars()
        .filter(|c| !matches!(c, '/' | '\\'))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    downloads_dir.join(format!("{}_{}", item.sequence_index, title))
}

/// File name of one page; zero-padded so names sort in page order
pub fn page_file_name(page: u32, extension: &str) -> String {
    format!("page_{:04}.{}", page, extension)
}
