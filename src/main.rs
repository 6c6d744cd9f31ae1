//! GeoEvidence - forensic location evidence aggregation for Android artifacts
//!
//! A CLI tool that runs a fixed set of collectors over raw text artifacts
//! extracted from a device, scores and de-duplicates the location points
//! they yield, and persists them with a complete audit trail.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, missing artifacts, timeout, etc.)
//!   3 - No data (query/audit before any collection run)

mod analysis;
mod audit;
mod cli;
mod collectors;
mod config;
mod error;
mod models;
mod query;
mod report;
mod store;

use analysis::Aggregator;
use anyhow::{bail, Context, Result};
use cli::{Args, AuditArgs, Command, ConfidenceArg, OutputFormat, QueryArgs, SourceArg};
use collectors::LookupOptions;
use config::{Config, CONFIG_FILE};
use error::StoreError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{ConfidenceLevel, SourceType};
use query::QueryFilter;
use report::OperationResult;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use store::{Snapshot, SnapshotStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const EXIT_NO_DATA: i32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GeoEvidence v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, args.verbose);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    let verbose = config.general.verbose;

    let outcome = match &args.command {
        Command::Collect(_) => run_collect(&config, args.quiet).await,
        Command::Query(query) => run_query(&config, query),
        Command::Audit(audit) => run_audit(&config, audit),
        Command::InitConfig => Ok(0),
    };

    match outcome {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            report_error(&e, verbose);
            std::process::exit(1);
        }
    }
}

/// Print an error: full debug chain when verbose, message chain otherwise.
fn report_error(e: &anyhow::Error, verbose: bool) {
    if verbose {
        eprintln!("\n❌ Error: {:?}", e);
    } else {
        eprintln!("\n❌ Error: {:#}", e);
    }
}

/// Handle init-config: generate a default .geoevidence.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to point at your artifact directory and file names.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run every collector and persist the snapshot. Returns exit code.
async fn run_collect(config: &Config, quiet: bool) -> Result<i32> {
    let start_time = Instant::now();

    let artifact_dir = PathBuf::from(&config.artifacts.directory);
    let external_lookup = config.collection.external_lookup;

    let options = LookupOptions {
        external_lookup,
        geolocator: None,
        wifi_max_networks: config.collection.wifi_max_networks,
    };
    if external_lookup {
        warn!("External lookup enabled; any cell/Wi-Fi positions will be marked as inferred");
    }

    let aggregator = Aggregator::from_artifacts(&config.artifacts, &artifact_dir, options)?;

    if !quiet {
        println!("📂 Artifacts: {}", artifact_dir.display());
        println!("   Collectors: {}", aggregator.collector_names().join(", "));
        println!(
            "   External lookup: {}",
            if external_lookup { "enabled" } else { "disabled" }
        );
    }

    let spinner = if quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        pb.set_message("Collecting location evidence...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    };

    let timeout = Duration::from_secs(config.collection.timeout_seconds);
    let task = tokio::task::spawn_blocking(move || aggregator.run());
    let outcome = tokio::time::timeout(timeout, task).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let result = match outcome {
        Ok(joined) => joined.context("Collection task failed")?,
        Err(_) => bail!(
            "Collection timed out after {}s; nothing was persisted",
            config.collection.timeout_seconds
        ),
    };

    let snapshot = Snapshot::new(result.points, result.audit_log, external_lookup);
    let store = SnapshotStore::new(&config.general.snapshot);
    store
        .save(&snapshot)
        .with_context(|| format!("Failed to persist snapshot to {}", store.path().display()))?;

    info!("Snapshot {} written", snapshot.run_id);

    if !quiet {
        println!("\n📊 Collection Summary:");
        print!("{}", report::generate_collection_summary(&snapshot));
        println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Snapshot saved to: {}", store.path().display());
    }

    Ok(0)
}

/// Filter the stored points and print the result. Returns exit code.
fn run_query(config: &Config, args: &QueryArgs) -> Result<i32> {
    let store = SnapshotStore::new(&config.general.snapshot);

    let points = match store.load_points() {
        Ok(points) => points,
        Err(e) => return handle_store_error(e, args.format),
    };

    let filter = QueryFilter {
        start_unix: args.start,
        end_unix: args.end,
        sources: args
            .source
            .as_ref()
            .map(|sources| sources.iter().copied().map(source_arg_to_type).collect()),
        min_confidence: args.min_confidence.map(confidence_arg_to_level),
    };
    debug!("Query filter: {:?}", filter);

    let result = query::run_query(&points, &filter);

    match args.format {
        OutputFormat::Json => println!("{}", report::generate_json(&OperationResult::ok(result))?),
        OutputFormat::Summary => print!("{}", report::generate_query_summary(&result)),
    }

    Ok(0)
}

/// Print the audit trail of the last run. Returns exit code.
fn run_audit(config: &Config, args: &AuditArgs) -> Result<i32> {
    let store = SnapshotStore::new(&config.general.snapshot);

    let trail = match store.load_audit() {
        Ok(trail) => trail,
        Err(e) => return handle_store_error(e, args.format),
    };

    match args.format {
        OutputFormat::Json => println!("{}", report::generate_json(&OperationResult::ok(trail))?),
        OutputFormat::Summary => print!("{}", report::generate_audit_summary(&trail)),
    }

    Ok(0)
}

/// Missing snapshot maps to the no-data exit code; anything else is an error.
fn handle_store_error(e: StoreError, format: OutputFormat) -> Result<i32> {
    match e {
        StoreError::NoData { .. } => {
            match format {
                OutputFormat::Json => {
                    let result: OperationResult<()> = OperationResult::failure(e.to_string());
                    println!("{}", report::generate_json(&result)?);
                }
                OutputFormat::Summary => eprintln!("⚠️  {}", e),
            }
            Ok(EXIT_NO_DATA)
        }
        other => Err(anyhow::Error::new(other).context("Failed to read snapshot")),
    }
}

fn source_arg_to_type(arg: SourceArg) -> SourceType {
    match arg {
        SourceArg::Gps => SourceType::Gps,
        SourceArg::Network => SourceType::Network,
        SourceArg::Wifi => SourceType::Wifi,
        SourceArg::Cell => SourceType::Cell,
        SourceArg::Fused => SourceType::Fused,
        SourceArg::App => SourceType::App,
    }
}

fn confidence_arg_to_level(arg: ConfidenceArg) -> ConfidenceLevel {
    match arg {
        ConfidenceArg::Low => ConfidenceLevel::Low,
        ConfidenceArg::Medium => ConfidenceLevel::Medium,
        ConfidenceArg::High => ConfidenceLevel::High,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
