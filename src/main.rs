//! review-handoff - Review findings aggregator
//!
//! A CLI tool that merges the JSON reports of several review agents
//! into a prioritized, deduplicated list of patch candidates and writes
//! a handoff document plus a confirmation template for the decision step.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (malformed report, unwritable run directory, bad config, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Local;
use cli::Args;
use config::{Config, CONFIG_FILE};
use report::HandoffArtifacts;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration decides the default log level, so it is resolved first
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("review-handoff v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Invalid(path, e) => {
            warn!("Ignoring config {}: {:#}", path.display(), e)
        }
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
    }

    if let Err(e) = run_handoff(&args, &config) {
        error!("Handoff failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .review-handoff.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

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
    println!("   Edit it to customize the terminal summary and logging.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Aggregate, deduplicate and write the handoff for one run.
fn run_handoff(args: &Args, config: &Config) -> Result<()> {
    let run = args
        .run_context()
        .context("Run directory, run id, session name and plan path are required")?;

    info!("Building handoff for run {} in {}", run.run_id, run.run_dir.display());

    let generated_at = report::timestamp(Local::now().naive_local());
    let artifacts = HandoffArtifacts::prepare(&run, generated_at)?;

    if config.summary.enabled {
        println!(
            "{}",
            report::generate_summary(
                &artifacts.document,
                config.summary.format,
                config.summary.max_rows
            )
        );
    }

    if args.dry_run {
        println!("✅ Dry run complete. No files were written.");
        return Ok(());
    }

    let paths = artifacts.write(&run.run_dir)?;

    println!("✅ Handoff written to: {}", paths.handoff.display());
    println!("   Confirmation template: {}", paths.confirmation.display());
    Ok(())
}

/// Where the effective configuration came from.
enum ConfigSource {
    File(PathBuf),
    /// A discovered (not explicitly requested) file that failed to load.
    Invalid(PathBuf, anyhow::Error),
    Defaults,
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` must load; a discovered file that fails to
/// parse is reported and skipped.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Run directory first, then the current directory
    let mut candidates = Vec::new();
    if let Some(ref run_dir) = args.run_dir {
        candidates.push(run_dir.clone());
    }
    candidates.push(PathBuf::from("."));

    for dir in candidates {
        match Config::load_from_dir(&dir) {
            Ok(Some(config)) => return Ok((config, ConfigSource::File(dir.join(CONFIG_FILE)))),
            Ok(None) => continue,
            Err(e) => {
                return Ok((
                    Config::default(),
                    ConfigSource::Invalid(dir.join(CONFIG_FILE), e),
                ))
            }
        }
    }

    Ok((Config::default(), ConfigSource::Defaults))
}
