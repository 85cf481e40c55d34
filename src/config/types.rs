use serde::Deserialize;

/// Main configuration structure for flipharvest
///
/// Every section and key has a default, so an empty file is a valid
/// configuration that targets the flipbook host with JSON storage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Discovery pass configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Number of concurrent probe workers
    pub workers: usize,

    /// Upper bound (exclusive) of the task index range
    #[serde(rename = "total-iterations")]
    pub total_iterations: u64,

    /// Largest identifier that may be sampled (inclusive)
    #[serde(rename = "max-id")]
    pub max_id: u64,

    /// Number of buffered records that triggers a flush
    #[serde(rename = "buffer-limit")]
    pub buffer_limit: usize,

    /// Consecutive failures that abort the run
    #[serde(rename = "max-consecutive-failures")]
    pub max_consecutive_failures: u32,

    /// Titles containing any of these strings are treated as irrelevant
    #[serde(rename = "exclude-titles")]
    pub exclude_titles: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            total_iterations: 1_000_000,
            max_id: 9_999_999,
            buffer_limit: 50,
            max_consecutive_failures: 1000,
            exclude_titles: vec!["Gdańskie Wydawnictwo Oświatowe".to_string()],
        }
    }
}

/// Retrieval pass configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of items downloaded concurrently
    pub workers: usize,

    /// First page fetched for items without a checkpoint
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Attempts per page before the item is considered finished
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay between requests (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// File extension of stored pages
    #[serde(rename = "page-extension")]
    pub page_extension: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            start_page: 1,
            max_retries: 3,
            delay_ms: 200,
            page_extension: "jpg".to_string(),
        }
    }
}

/// Remote host configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Document URL template, `{id}` is replaced by the sampled identifier
    #[serde(rename = "display-url")]
    pub display_url: String,

    /// Page image URL template with `{book}` and `{page}` placeholders
    #[serde(rename = "page-url")]
    pub page_url: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            display_url: "https://flipbook.apps.gwo.pl/display/{id}".to_string(),
            page_url: "https://flipbook.apps.gwo.pl/book/getImage/bookId:{book}/pageNo:{page}"
                .to_string(),
            request_timeout_secs: 10,
            user_agent: concat!("flipharvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Plain JSON files replaced atomically on every write
    #[default]
    Json,
    /// A single SQLite database holding checkpoints and records
    Sqlite,
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(rename = "results-path")]
    pub results_path: String,

    #[serde(rename = "discovery-checkpoint-path")]
    pub discovery_checkpoint_path: String,

    #[serde(rename = "retrieval-checkpoint-path")]
    pub retrieval_checkpoint_path: String,

    /// Path to the SQLite database file (sqlite backend only)
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for downloaded pages
    #[serde(rename = "downloads-dir")]
    pub downloads_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            results_path: "results.json".to_string(),
            discovery_checkpoint_path: "progress.json".to_string(),
            retrieval_checkpoint_path: "progress_download.json".to_string(),
            database_path: "harvest.db".to_string(),
            downloads_dir: "downloads".to_string(),
        }
    }
}
