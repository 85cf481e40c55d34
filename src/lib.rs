//! flipharvest: a resumable concurrent harvester for flipbook documents
//!
//! This crate probes a sparse identifier space for live documents, records the
//! relevant ones, and downloads their page images. Both passes checkpoint
//! their progress, survive restarts, and stop on their own when the remote
//! host starts failing requests in bulk.

pub mod config;
pub mod harvest;
pub mod output;
pub mod remote;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for flipharvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Aborted after {consecutive} consecutive failures")]
    FailureThreshold { consecutive: u64 },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for flipharvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Discovery, DiscoveryReport, Retrieval, RetrievalReport};
pub use state::{DiscoveredItem, FaultRecord, HarvestRecord, ProbeOutcome};
