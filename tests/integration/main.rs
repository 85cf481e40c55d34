//! Integration tests for the harvester
//!
//! These tests drive both passes against temporary storage, using wiremock
//! for the remote host where the HTTP collaborators are under test.

mod discovery_tests;
mod retrieval_tests;

use flipharvest::config::{StorageBackend, StorageConfig};
use std::path::Path;

/// Storage configuration rooted in a test directory
pub fn storage_config(dir: &Path, backend: StorageBackend) -> StorageConfig {
    let path = |name: &str| dir.join(name).display().to_string();
    StorageConfig {
        backend,
        results_path: path("results.json"),
        discovery_checkpoint_path: path("progress.json"),
        retrieval_checkpoint_path: path("progress_download.json"),
        database_path: path("harvest.db"),
        downloads_dir: path("downloads"),
    }
}
