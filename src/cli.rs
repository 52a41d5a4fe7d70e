//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::RunContext;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// review-handoff - merge review agent findings into a patch handoff
///
/// Reads the agent reports of a review run, deduplicates their findings
/// into patch candidates and writes handoff.json plus
/// patch-confirmation-template.json into the run directory.
///
/// Examples:
///   review-handoff runs/audit-1 audit-1 phase-2 docs/plan.md
///   review-handoff runs/audit-1 audit-1 phase-2 docs/plan.md --summary markdown
///   review-handoff runs/audit-1 audit-1 phase-2 docs/plan.md --dry-run
///   review-handoff --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Run directory holding the agent reports
    ///
    /// The handoff documents are written here as well.
    #[arg(value_name = "RUN_DIR", required_unless_present = "init_config")]
    pub run_dir: Option<PathBuf>,

    /// Identifier of the review run
    #[arg(value_name = "RUN_ID", required_unless_present = "init_config")]
    pub run_id: Option<String>,

    /// Session name recorded in the handoff
    #[arg(value_name = "SESSION_NAME", required_unless_present = "init_config")]
    pub session_name: Option<String>,

    /// Path of the plan document recorded in the handoff
    #[arg(value_name = "PLAN_PATH", required_unless_present = "init_config")]
    pub plan_path: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .review-handoff.toml in the run
    /// directory, then in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Terminal summary format (text, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub summary: Option<SummaryFormat>,

    /// Do not print the terminal summary
    #[arg(long, conflicts_with = "summary")]
    pub no_summary: bool,

    /// Dry run: aggregate and deduplicate without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .review-handoff.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Format of the terminal summary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// Markdown
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match self.run_dir {
            Some(ref run_dir) if !run_dir.exists() => {
                return Err(format!("Run directory does not exist: {}", run_dir.display()));
            }
            Some(ref run_dir) if !run_dir.is_dir() => {
                return Err(format!(
                    "Run path is not a directory: {}",
                    run_dir.display()
                ));
            }
            Some(_) => {}
            None => return Err("Run directory is required".to_string()),
        }

        if self.run_id.is_none() || self.session_name.is_none() || self.plan_path.is_none() {
            return Err("Run id, session name and plan path are required".to_string());
        }

        Ok(())
    }

    /// The run identity, if all positional arguments are present.
    pub fn run_context(&self) -> Option<RunContext> {
        Some(RunContext {
            run_dir: self.run_dir.clone()?,
            run_id: self.run_id.clone()?,
            session_name: self.session_name.clone()?,
            plan_path: self.plan_path.clone()?,
        })
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` comes from the configuration file; `--quiet` wins.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
