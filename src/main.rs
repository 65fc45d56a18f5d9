//! Shelfmap main entry point
//!
//! Command-line interface for the shelfmap catalog crawl orchestrator.

use clap::Parser;
use shelfmap::config::load_config_with_hash;
use shelfmap::fetch::{build_http_client, HttpFetchPort};
use shelfmap::scheduler::Coordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Shelfmap: a resumable retail catalog crawl orchestrator
///
/// Shelfmap collapses filter-variant category URLs onto canonical ids,
/// plans a minimal covering category subset, and crawls the store-by-category
/// space with checkpointed, resumable progress.
#[derive(Parser, Debug)]
#[command(name = "shelfmap")]
#[command(version = "1.0.0")]
#[command(about = "A resumable retail catalog crawl orchestrator", long_about = None)]
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

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Run planning only and show the selected categories without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_report"])]
    plan_only: bool,

    /// Show statistics from the checkpoint database and exit
    #[arg(long, conflicts_with_all = ["plan_only", "export_report"])]
    stats: bool,

    /// Generate a markdown report from existing data and exit
    #[arg(long, conflicts_with_all = ["plan_only", "stats"])]
    export_report: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.plan_only {
        handle_plan_only(&config).await?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_report {
        handle_export_report(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelfmap=info,warn"),
            1 => EnvFilter::new("shelfmap=debug,info"),
            2 => EnvFilter::new("shelfmap=trace,debug"),
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

/// Builds the HTTP reference fetch port from configuration
fn build_fetch_port(config: &shelfmap::Config) -> Result<HttpFetchPort, reqwest::Error> {
    let client = build_http_client(&config.fetch.user_agent)?;
    Ok(HttpFetchPort::new(client, config.fetch.base_url.clone()))
}

/// Handles --plan-only: runs the planning phase and prints the selection
async fn handle_plan_only(config: &shelfmap::Config) -> Result<(), Box<dyn std::error::Error>> {
    use shelfmap::planner::plan_crawl;

    println!("=== Shelfmap Planning ===\n");

    let fetch = build_fetch_port(config)?;
    let planned = plan_crawl(config, &fetch).await?;

    println!(
        "Sampled universe: {} products across {} categories",
        planned.plan.universe_size,
        planned.representatives.len()
    );
    println!(
        "Coverage: {:.1}% achieved vs {:.1}% target{}",
        planned.plan.achieved * 100.0,
        planned.plan.target * 100.0,
        if planned.plan.is_partial() {
            " (PARTIAL — some products are unreachable with this selection)"
        } else {
            ""
        }
    );

    println!("\nSelected Categories ({}):", planned.plan.selected.len());
    for target in &planned.representatives {
        if planned.plan.selected.contains(&target.canonical_id) {
            println!("  - {} ({})", target.canonical_id, target.raw_url);
        }
    }

    println!(
        "\nWould schedule {} units across {} stores",
        planned.plan.selected.len() * config.stores.len(),
        config.stores.len()
    );

    Ok(())
}

/// Handles --stats: shows statistics from the checkpoint database
fn handle_stats(config: &shelfmap::Config) -> Result<(), Box<dyn std::error::Error>> {
    use shelfmap::checkpoint::SqliteCheckpoint;
    use shelfmap::sink::{load_statistics, print_statistics};
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let checkpoint = SqliteCheckpoint::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&checkpoint)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --export-report: generates a markdown report from existing data
fn handle_export_report(config: &shelfmap::Config) -> Result<(), Box<dyn std::error::Error>> {
    use shelfmap::checkpoint::SqliteCheckpoint;
    use shelfmap::sink::{load_statistics, write_report};
    use std::path::Path;

    println!("=== Exporting Crawl Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.report_path);
    println!();

    let checkpoint = SqliteCheckpoint::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&checkpoint)?;
    write_report(&stats, Path::new(&config.output.report_path))?;

    println!("✓ Report exported to: {}", config.output.report_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: shelfmap::Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    use shelfmap::sink::{load_statistics, write_report};
    use std::path::Path;

    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }
    tracing::info!(
        "Stores: {}, category URLs: {}",
        config.stores.len(),
        config.categories.len()
    );

    let report_path = config.output.report_path.clone();
    let fetch = Arc::new(build_fetch_port(&config)?);
    let mut coordinator = Coordinator::new(config, config_hash, fetch, fresh)?;

    // Ctrl-C requests cancellation; the checkpoint stays cleanly resumable.
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Cancellation requested, letting in-flight fetches settle");
            cancel.cancel();
        }
    });

    let summary = coordinator.run().await?;

    println!("\n=== Run Summary ===");
    println!(
        "Units: {} restored, {} discovered, {} skipped",
        summary.seed.restored, summary.seed.discovered, summary.seed.skipped
    );
    println!("Pages fetched this run: {}", summary.pages_fetched);
    println!(
        "Products: {} unique ({} listings fetched)",
        summary.totals.unique_products, summary.totals.total_fetched
    );
    if let Some((achieved, target)) = summary.coverage {
        println!(
            "Coverage: {:.1}% achieved vs {:.1}% target",
            achieved * 100.0,
            target * 100.0
        );
    }
    if !summary.failed_units.is_empty() {
        println!("Permanently failed units ({}):", summary.failed_units.len());
        for unit in &summary.failed_units {
            println!(
                "  - store {} / category {} at page {}: {}",
                unit.store,
                unit.category,
                unit.next_cursor,
                unit.error_message.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if summary.cancelled {
        println!("Run was cancelled; rerun without --fresh to resume.");
    } else {
        let stats = load_statistics(&*coordinator.checkpoint().lock().unwrap())?;
        write_report(&stats, Path::new(&report_path))?;
        println!("Report written to {}", report_path);
    }

    Ok(())
}
