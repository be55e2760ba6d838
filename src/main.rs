//! Humidor main entry point
//!
//! This is the command-line interface for the humidor record harvester.

use anyhow::{Context, Result};
use clap::Parser;
use humidor::config::{load_config_with_hash, Config};
use humidor::harvest::{FanOut, Orchestrator, SelectorConnector};
use humidor::store::{open_store, RecordStore, DEFAULT_PAGE_SIZE};
use humidor::ResilientTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Humidor: a resilient product-record harvester
///
/// Humidor reads listing pages of a source page by page, fetches every item
/// page under a concurrency bound, and stores one JSON document per record.
/// Re-running a harvest overwrites records in place.
#[derive(Parser, Debug)]
#[command(name = "humidor")]
#[command(version)]
#[command(about = "A resilient product-record harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "read", "seek"])]
    dry_run: bool,

    /// Count the records in the store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "read", "seek"])]
    stats: bool,

    /// Print the stored record with this id and exit
    #[arg(long, value_name = "ID", conflicts_with_all = ["dry_run", "stats", "seek"])]
    read: Option<String>,

    /// Print the stored record with this name and exit
    #[arg(long, value_name = "NAME", conflicts_with_all = ["dry_run", "stats", "read"])]
    seek: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(id) = &cli.read {
        handle_read(&config, id)
    } else if let Some(name) = &cli.seek {
        handle_seek(&config, name)
    } else {
        handle_harvest(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("humidor=info,warn"),
            1 => EnvFilter::new("humidor=debug,info"),
            2 => EnvFilter::new("humidor=trace,debug"),
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

/// Handles the --dry-run mode: prints the validated configuration
fn handle_dry_run(config: &Config) -> Result<()> {
    println!("=== Humidor Dry Run ===\n");

    println!("Source: {}", config.connector.name);
    println!("  Listing: {}", config.connector.listing_url);
    println!("  Item links: {}", config.connector.item_link);
    if let Some(marker) = &config.connector.next_page {
        println!("  Next page marker: {}", marker);
    }
    if !config.connector.skip_patterns.is_empty() {
        println!("  Skipping: {}", config.connector.skip_patterns.join(", "));
    }

    println!("\nFields:");
    for (field, path) in config.connector.fields.iter() {
        println!("  {:<20} {}", field, path);
    }

    println!("\nHarvest:");
    let ceiling = match config.harvest.page_max {
        0 => "until exhausted".to_string(),
        max => max.to_string(),
    };
    println!("  Pages: {} to {}", config.harvest.page_min, ceiling);
    println!("  Items per page: {}", config.harvest.limit);
    println!("  Concurrency: {}", config.harvest.concurrency);
    println!("  Page delay: {}ms", config.harvest.page_delay_ms);

    println!("\nTransport:");
    println!(
        "  Backoff: {}ms + {}ms per retry, {} attempts",
        config.transport.initial_delay_ms, config.transport.backoff_ms, config.transport.max_attempts
    );
    println!("  User agent: {}", config.transport.user_agent);

    println!("\nStore:");
    println!("  Path: {}", config.store.path);
    println!("  Identity key: {}", config.store.identity_key);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: counts stored records page by page
fn handle_stats(config: &Config) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open store")?;

    let mut total = 0usize;
    let mut incomplete = 0usize;
    let mut page = 0;

    loop {
        let result = store.read_bulk(DEFAULT_PAGE_SIZE, page)?;
        total += result.records.len();
        incomplete += result.records.iter().filter(|r| !r.is_complete()).count();

        if result.next_page == 0 {
            break;
        }
        page = result.next_page;
    }

    println!("Store: {}\n", store.dir().display());
    println!("  Records: {}", total);
    println!("  With field warnings: {}", incomplete);

    Ok(())
}

/// Handles the --read mode: prints one record by id
fn handle_read(config: &Config, id: &str) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open store")?;
    let record = store.read(id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Handles the --seek mode: prints one record by name
fn handle_seek(config: &Config, name: &str) -> Result<()> {
    let store = open_store(&config.store).context("Failed to open store")?;
    let record = store.seek(name)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping harvest");
                cancel.cancel();
            }
        }
    });

    let transport = ResilientTransport::from_config(&config.transport)
        .context("Failed to build HTTP client")?
        .with_cancellation(cancel.clone());
    let fanout = FanOut::new(config.harvest.concurrency).with_cancellation(cancel.clone());
    let connector = SelectorConnector::new(&config.connector, Arc::new(transport), fanout)?;
    let store = open_store(&config.store).context("Failed to open store")?;

    tracing::info!(
        "Harvesting {} into {} (identity: {})",
        config.connector.name,
        config.store.path,
        config.store.identity_key
    );

    let orchestrator =
        Orchestrator::new(connector, store, config.harvest.clone()).with_cancellation(cancel);

    match orchestrator.run().await {
        Ok(summary) => {
            tracing::info!(
                "Harvest completed: {} pages, {} records, {} failed fetches, {} field warnings",
                summary.pages,
                summary.records_written,
                summary.task_failures,
                summary.field_warnings
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
