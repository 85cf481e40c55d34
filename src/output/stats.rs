//! Statistics generation from harvest state
//!
//! This module provides functionality for summarizing the durable state left
//! by the discovery and retrieval passes.

use crate::storage::{CheckpointStore, RecordCollection, StoreResult, MAX_ITER_KEY, NO_PROGRESS};
use crate::state::HarvestRecord;
use std::collections::{HashMap, HashSet};

/// Retrieval progress of one discovered item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    pub sequence_index: u64,
    pub title: String,
    /// Last page stored, `None` if retrieval never reached this item
    pub last_page: Option<i64>,
}

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Discovery high-water mark
    pub discovery_checkpoint: i64,

    /// Number of discovered-item records
    pub discovered: u64,

    /// Discovered items after collapsing repeated discoveries
    pub distinct_items: u64,

    /// Number of fault records
    pub faults: u64,

    /// Fault messages and their counts
    pub fault_summary: HashMap<String, u64>,

    /// Per-item retrieval progress, in discovery order
    pub items: Vec<ItemProgress>,
}

impl HarvestStatistics {
    /// Items with at least one stored page
    pub fn items_started(&self) -> usize {
        self.items.iter().filter(|i| i.last_page.is_some()).count()
    }
}

/// Loads statistics from the stores of both passes
///
/// # Arguments
///
/// * `records` - The results collection
/// * `discovery` - The discovery checkpoint store
/// * `retrieval` - The retrieval checkpoint store
pub fn load_statistics(
    records: &dyn RecordCollection,
    discovery: &dyn CheckpointStore,
    retrieval: &dyn CheckpointStore,
) -> StoreResult<HarvestStatistics> {
    let discovery_checkpoint = discovery.read(MAX_ITER_KEY)?.unwrap_or(NO_PROGRESS);
    let progress = retrieval.entries()?;

    let mut discovered = 0;
    let mut faults = 0;
    let mut fault_summary = HashMap::new();
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for record in records.load()? {
        match record {
            HarvestRecord::Discovered(item) => {
                discovered += 1;
                if seen.insert(item.sequence_index) {
                    items.push(ItemProgress {
                        sequence_index: item.sequence_index,
                        last_page: progress.get(&item.item_id()).copied(),
                        title: item.display_title(),
                    });
                }
            }
            HarvestRecord::Fault(fault) => {
                faults += 1;
                *fault_summary.entry(fault.error).or_insert(0) += 1;
            }
            HarvestRecord::Filtered(_) => {}
        }
    }

    Ok(HarvestStatistics {
        discovery_checkpoint,
        discovered,
        distinct_items: items.len() as u64,
        faults,
        fault_summary,
        items,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Discovery:");
    println!("  Checkpoint (max_iter): {}", stats.discovery_checkpoint);
    println!("  Discovered records: {}", stats.discovered);
    println!("  Distinct items: {}", stats.distinct_items);
    println!("  Fault records: {}", stats.faults);
    println!();

    if !stats.fault_summary.is_empty() {
        println!("Fault Summary:");
        let mut fault_counts: Vec<_> = stats.fault_summary.iter().collect();
        fault_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (message, count) in fault_counts {
            println!("  {}: {}", message, count);
        }
        println!();
    }

    println!("Retrieval:");
    let started = stats.items_started();
    let percentage = if stats.distinct_items > 0 {
        (started as f64 / stats.distinct_items as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Items started: {} / {} ({:.1}%)",
        started, stats.distinct_items, percentage
    );

    for item in &stats.items {
        match item.last_page {
            Some(page) => println!("  [{}] {}: page {}", item.sequence_index, item.title, page),
            None => println!("  [{}] {}: not started", item.sequence_index, item.title),
        }
    }
}
