//! flipharvest main entry point
//!
//! This is the command-line interface for the flipharvest document harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use flipharvest::config::{load_config_with_hash, validate, Config, StorageBackend};
use flipharvest::harvest::{Discovery, Retrieval};
use flipharvest::remote::{build_http_client, HttpPageFetcher, HttpProber, PageUrlScheme};
use flipharvest::storage::{open_discovery_stores, open_retrieval_stores, open_status_stores};
use flipharvest::HarvestError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// flipharvest: a resumable flipbook harvester
///
/// `discover` probes random document ids and records the relevant ones;
/// `retrieve` downloads the page images of every recorded document. Both
/// passes resume from their checkpoints and can be stopped with Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "flipharvest")]
#[command(version)]
#[command(about = "A resumable concurrent flipbook harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe random identifiers and record relevant documents
    Discover {
        /// Number of concurrent probes
        #[arg(long)]
        workers: Option<usize>,

        /// Upper bound of the task index range
        #[arg(long)]
        total_iterations: Option<u64>,
    },

    /// Download the pages of every recorded document
    Retrieve {
        /// Number of documents downloaded concurrently
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show checkpoints and recorded results, then exit
    Status,

    /// Validate the configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = load(&cli.config)?;

    match cli.command {
        Command::Discover {
            workers,
            total_iterations,
        } => {
            if let Some(workers) = workers {
                config.discovery.workers = workers;
            }
            if let Some(total) = total_iterations {
                config.discovery.total_iterations = total;
            }
            validate(&config)?;
            handle_discover(config).await
        }
        Command::Retrieve { workers } => {
            if let Some(workers) = workers {
                config.retrieval.workers = workers;
            }
            validate(&config)?;
            handle_retrieve(config).await
        }
        Command::Status => {
            handle_status(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckConfig => {
            validate(&config)?;
            handle_check_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("flipharvest=info,warn"),
            1 => EnvFilter::new("flipharvest=debug,info"),
            2 => EnvFilter::new("flipharvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: &Option<PathBuf>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Cancels the returned token on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight work...");
            token.cancel();
        }
    });
    cancel
}

/// Handles the discovery pass
async fn handle_discover(config: Config) -> anyhow::Result<ExitCode> {
    let stores = open_discovery_stores(&config.storage)?;
    let client = build_http_client(&config.remote, config.discovery.workers)?;
    let prober = HttpProber::new(client, &config.remote, config.discovery.exclude_titles.clone());

    let discovery = Discovery::new(config.discovery, Arc::new(prober), stores);
    match discovery.run(interrupt_token()).await {
        Ok(report) => {
            println!("{}", report);
            Ok(ExitCode::SUCCESS)
        }
        // Already reported when the breaker tripped
        Err(HarvestError::FailureThreshold { .. }) => Ok(ExitCode::FAILURE),
        Err(e) => Err(e.into()),
    }
}

/// Handles the retrieval pass
async fn handle_retrieve(config: Config) -> anyhow::Result<ExitCode> {
    let stores = open_retrieval_stores(&config.storage)
        .context("No discovery results to retrieve, run `flipharvest discover` first")?;
    let client = build_http_client(&config.remote, config.retrieval.workers)?;

    let retrieval = Retrieval::new(
        config.retrieval,
        &config.storage.downloads_dir,
        PageUrlScheme::new(&config.remote.page_url),
        Arc::new(HttpPageFetcher::new(client)),
        stores,
    );
    let report = retrieval.run(interrupt_token()).await?;
    println!("{}", report);
    Ok(ExitCode::SUCCESS)
}

/// Handles the status command: shows statistics from the stores
fn handle_status(config: &Config) -> anyhow::Result<()> {
    use flipharvest::output::{load_statistics, print_statistics};

    match config.storage.backend {
        StorageBackend::Json => println!("Results: {}\n", config.storage.results_path),
        StorageBackend::Sqlite => println!("Database: {}\n", config.storage.database_path),
    }

    // Read-only: status never creates checkpoint files
    let stores = match open_status_stores(&config.storage) {
        Ok(stores) => stores,
        Err(e) => {
            println!("No harvest state found ({})", e);
            return Ok(());
        }
    };

    let stats = load_statistics(
        stores.records.as_ref(),
        stores.discovery.as_ref(),
        stores.retrieval.as_ref(),
    )?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the check-config command: prints the effective configuration
fn handle_check_config(config: &Config) {
    println!("=== flipharvest Configuration ===\n");

    println!("Discovery:");
    println!("  Workers: {}", config.discovery.workers);
    println!("  Total iterations: {}", config.discovery.total_iterations);
    println!("  Max id: {}", config.discovery.max_id);
    println!("  Buffer limit: {}", config.discovery.buffer_limit);
    println!(
        "  Max consecutive failures: {}",
        config.discovery.max_consecutive_failures
    );
    println!(
        "  Excluded titles ({}):",
        config.discovery.exclude_titles.len()
    );
    for title in &config.discovery.exclude_titles {
        println!("    - {}", title);
    }

    println!("\nRetrieval:");
    println!("  Workers: {}", config.retrieval.workers);
    println!("  Start page: {}", config.retrieval.start_page);
    println!("  Max retries: {}", config.retrieval.max_retries);
    println!("  Delay: {}ms", config.retrieval.delay_ms);
    println!("  Page extension: {}", config.retrieval.page_extension);

    println!("\nRemote:");
    println!("  Display URL: {}", config.remote.display_url);
    println!("  Page URL: {}", config.remote.page_url);
    println!("  Timeout: {}s", config.remote.request_timeout_secs);
    println!("  User agent: {}", config.remote.user_agent);

    println!("\nStorage ({:?}):", config.storage.backend);
    match config.storage.backend {
        StorageBackend::Json => {
            println!("  Results: {}", config.storage.results_path);
            println!(
                "  Discovery checkpoint: {}",
                config.storage.discovery_checkpoint_path
            );
            println!(
                "  Retrieval checkpoint: {}",
                config.storage.retrieval_checkpoint_path
            );
        }
        StorageBackend::Sqlite => println!("  Database: {}", config.storage.database_path),
    }
    println!("  Downloads: {}", config.storage.downloads_dir);

    println!("\n✓ Configuration is valid");
}
