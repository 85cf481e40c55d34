//! State module for harvest records and probe outcomes
//!
//! # Components
//!
//! - `ProbeOutcome`: Classification of a single discovery probe
//! - `HarvestRecord`: Entries of the durable results collection (discovered
//!   items and fault audit records)

mod probe_outcome;
mod record;

// Re-export main types
pub use probe_outcome::ProbeOutcome;
pub use record::{DiscoveredItem, FaultRecord, HarvestRecord};
