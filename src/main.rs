//! expsummary - cross-experiment summaries for multi-agent QA evaluations
//!
//! Loads every per-experiment JSON result file from a directory, aggregates
//! them into a single question-weighted summary and prints a text (or JSON)
//! report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (bad arguments, unreadable directory, malformed result file,
//!       nothing to aggregate)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use loader::ResultLoader;
use report::{ReportMetadata, ReportOptions};
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

    // Load configuration before logging so the file can turn on verbose output
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    if let Err(e) = config.validate() {
        eprintln!("Error: invalid configuration: {:#}", e);
        std::process::exit(1);
    }

    init_logging(log_level(&args, &config));

    info!("expsummary v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run(&args, &config) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .expsummary.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to change the results directory, report format and thresholds.");
    Ok(())
}

/// Effective log level: `--quiet` wins, then `--verbose` or the config file.
fn log_level(args: &Args, config: &Config) -> tracing::Level {
    if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging. Logs go to stderr so stdout carries only the report.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Load, aggregate, render and emit the report.
fn run(args: &Args, config: &Config) -> Result<()> {
    let output = render(config)?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, format!("{}\n", output))
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to: {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Build the report text for the configured results directory and format.
fn render(config: &Config) -> Result<String> {
    let results_dir = &config.general.results_dir;
    let loader = ResultLoader::new(results_dir);

    let experiments = loader.load_all().with_context(|| {
        format!(
            "Failed to load experiment results from {}",
            results_dir.display()
        )
    })?;

    let summary =
        analysis::aggregate(&experiments).context("Failed to aggregate experiment results")?;

    info!(
        "Aggregated {} experiments ({} questions)",
        summary.experiments_count, summary.total_questions
    );

    match config.report.format {
        OutputFormat::Text => {
            let options = ReportOptions::from(&config.report);
            Ok(report::generate_text_report(&summary, &options).join("\n"))
        }
        OutputFormat::Json => {
            let metadata = ReportMetadata {
                generated_at: Utc::now(),
                results_dir: loader.results_dir().display().to_string(),
                files_loaded: experiments.len(),
            };
            report::generate_json_report(&summary, &metadata)
        }
    }
}

/// Where the effective configuration came from.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    /// The default file exists but could not be used.
    Fallback(String),
    Builtin,
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE_NAME),
            ConfigSource::Fallback(reason) => warn!("Failed to load config: {}", reason),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(format!("{:#}", e)))),
    }
}
