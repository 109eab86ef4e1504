//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// expsummary - cross-experiment report for multi-agent QA results
///
/// Reads every per-experiment JSON result file in a directory and prints a
/// combined summary: weighted accuracy, per-agent performance, agreement,
/// reasoning rounds, answer revisions, retrieval usage and problem questions.
///
/// Examples:
///   expsummary
///   expsummary --results-dir ./runs/debate
///   expsummary --format json --output summary.json
///   expsummary --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing per-experiment `*.json` result files
    ///
    /// Defaults to `./results` unless set in .expsummary.toml.
    #[arg(long, value_name = "DIR", env = "EXPSUMMARY_RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// Write the report to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .expsummary.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Agreement rate below which agents are flagged as disagreeing (0.0 - 1.0)
    #[arg(long, value_name = "RATE")]
    pub agreement_threshold: Option<f64>,

    /// Number of globally failed question ids to list in the report
    #[arg(long, value_name = "COUNT")]
    pub max_failed_ids: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .expsummary.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text (default)
    #[default]
    Text,
    /// JSON format
    Json,
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

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(threshold) = self.agreement_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("Agreement threshold must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_failed_ids == Some(0) {
            return Err("Max failed ids must be at least 1".to_string());
        }

        if let Some(ref dir) = self.results_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(format!(
                    "Results path is not a directory: {}",
                    dir.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
