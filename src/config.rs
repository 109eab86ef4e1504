//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.expsummary.toml` files.

use crate::cli::OutputFormat;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".expsummary.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding the per-experiment JSON files.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            verbose: false,
        }
    }
}

pub fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Agreement rates below this value trigger a coordination insight.
    #[serde(default = "default_agreement_threshold")]
    pub agreement_threshold: f64,

    /// How many globally failed question ids to list.
    #[serde(default = "default_max_failed_ids")]
    pub max_failed_ids: usize,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            agreement_threshold: default_agreement_threshold(),
            max_failed_ids: default_max_failed_ids(),
            format: OutputFormat::default(),
        }
    }
}

fn default_agreement_threshold() -> f64 {
    0.9
}

fn default_max_failed_ids() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via the
    /// environment) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref results_dir) = args.results_dir {
            self.general.results_dir = results_dir.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(threshold) = args.agreement_threshold {
            self.report.agreement_threshold = threshold;
        }
        if let Some(max_ids) = args.max_failed_ids {
            self.report.max_failed_ids = max_ids;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the effective settings, after file values and CLI overrides are merged.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.report.agreement_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            bail!(
                "report.agreement_threshold must be between 0.0 and 1.0, got {}",
                threshold
            );
        }

        if self.report.max_failed_ids == 0 {
            bail!("report.max_failed_ids must be at least 1");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.results_dir, PathBuf::from("./results"));
        assert_eq!(config.report.agreement_threshold, 0.9);
        assert_eq!(config.report.max_failed_ids, 10);
        assert_eq!(config.report.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
results_dir = "runs/2024-06"
verbose = true

[report]
agreement_threshold = 0.75
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.results_dir, PathBuf::from("runs/2024-06"));
        assert!(config.general.verbose);
        assert_eq!(config.report.agreement_threshold, 0.75);
        assert_eq!(config.report.max_failed_ids, 10);
        assert_eq!(config.report.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_only_overrides_explicit_args() {
        let mut config: Config = toml::from_str(
            r#"
[general]
results_dir = "from-file"

[report]
max_failed_ids = 3
"#,
        )
        .unwrap();

        let mut args = make_args();
        args.agreement_threshold = Some(0.5);
        config.merge_with_args(&args);

        assert_eq!(config.general.results_dir, PathBuf::from("from-file"));
        assert_eq!(config.report.max_failed_ids, 3);
        assert_eq!(config.report.agreement_threshold, 0.5);

        args.results_dir = Some(PathBuf::from("from-cli"));
        config.merge_with_args(&args);
        assert_eq!(config.general.results_dir, PathBuf::from("from-cli"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_file_values() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[report]\nagreement_threshold = 1.5\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[report]\nmax_failed_ids = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_cli_fix_for_bad_file_value() {
        let mut config: Config = toml::from_str("[report]\nagreement_threshold = -0.2\n").unwrap();
        let mut args = make_args();
        args.agreement_threshold = Some(0.8);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("agreement_threshold"));
    }
}
