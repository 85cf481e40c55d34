//! Harvesting engine
//!
//! This module contains the two orchestrated passes and the machinery they
//! share:
//! - A bounded worker pool with cooperative cancellation
//! - The buffered result accumulator
//! - The consecutive-failure breaker

mod breaker;
mod buffer;
mod discovery;
mod pool;
mod retrieval;

pub use breaker::FailureBreaker;
pub use buffer::{Flushed, ResultBuffer};
pub use discovery::{Discovery, DiscoveryReport};
pub use pool::{PoolSummary, WorkerPool};
pub use retrieval::{item_dir, page_file_name, ItemJob, Retrieval, RetrievalReport};
