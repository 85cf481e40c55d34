//! Output module for reporting harvest state
//!
//! Run reports are produced by the orchestrators themselves; this module
//! summarizes what is on disk between runs.

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics, ItemProgress};
