//! Loader for per-experiment result files.
//!
//! Reads every `*.json` file directly inside a results directory and turns it
//! into a validated [`ExperimentResult`]. Any bad file aborts the load.

use crate::error::{AnalysisError, Result};
use crate::models::ExperimentResult;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Keys every result file must carry. Nested keys use dotted paths.
pub const REQUIRED_FIELDS: &[&str] = &[
    "total_questions",
    "overall_final_accuracy",
    "agreement_rate",
    "average_round_count",
    "round_count_histogram",
    "per_agent_accuracy",
    "per_agent_changes",
    "retrieval.average_calls_per_question",
    "retrieval.questions_with_retrieval_used",
];

const RESULT_EXTENSION: &str = "json";

/// Discovers and parses result files in one directory.
pub struct ResultLoader {
    results_dir: PathBuf,
}

impl ResultLoader {
    /// Create a loader for `results_dir`.
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// List result files, sorted by file name. Subdirectories are not searched.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.results_dir;

        if !dir.exists() {
            return Err(AnalysisError::ResultsDir {
                path: dir.clone(),
                reason: "directory does not exist".to_string(),
            });
        }
        if !dir.is_dir() {
            return Err(AnalysisError::ResultsDir {
                path: dir.clone(),
                reason: "not a directory".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| AnalysisError::Io {
                path: dir.clone(),
                source: e.into(),
            })?;

            // Hidden files are skipped, as a `*.json` glob would.
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let is_result = !hidden
                && entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(RESULT_EXTENSION);

            if is_result {
                files.push(entry.into_path());
            } else {
                debug!("Skipping {}", entry.path().display());
            }
        }

        Ok(files)
    }

    /// Load every result file in the directory.
    pub fn load_all(&self) -> Result<Vec<ExperimentResult>> {
        let files = self.scan()?;
        info!(
            "Found {} result files in {}",
            files.len(),
            self.results_dir.display()
        );

        files.iter().map(|path| load_experiment(path)).collect()
    }
}

/// Parse and validate a single result file.
pub fn load_experiment(path: &Path) -> Result<ExperimentResult> {
    debug!("Loading {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut document: Value =
        serde_json::from_str(&content).map_err(|source| AnalysisError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(fields) = document.as_object_mut() else {
        return Err(AnalysisError::InvalidValue {
            path: path.to_path_buf(),
            field: "<root>".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    };
    fields
        .entry("exp_name")
        .or_insert_with(|| Value::String(default_experiment_name(path)));

    if let Some(missing) = first_missing_field(&document) {
        return Err(AnalysisError::MissingField {
            path: path.to_path_buf(),
            field: missing.to_string(),
        });
    }

    let experiment: ExperimentResult =
        serde_json::from_value(document).map_err(|source| AnalysisError::Schema {
            path: path.to_path_buf(),
            source,
        })?;

    experiment
        .validate()
        .map_err(|violation| AnalysisError::InvalidValue {
            path: path.to_path_buf(),
            field: violation.field,
            reason: violation.reason,
        })?;

    debug!(
        "Loaded experiment '{}' ({} questions)",
        experiment.exp_name, experiment.total_questions
    );
    Ok(experiment)
}

/// The first required key that is absent or null.
fn first_missing_field(document: &Value) -> Option<&'static str> {
    REQUIRED_FIELDS.iter().copied().find(|field| {
        let pointer = format!("/{}", field.replace('.', "/"));
        document.pointer(&pointer).map_or(true, Value::is_null)
    })
}

/// File base name, e.g. `run_a.json`.
fn default_experiment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
