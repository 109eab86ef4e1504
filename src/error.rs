//! Error types for loading and aggregating experiment results.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a run can fail. All of them abort the run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Results directory {path} is not usable: {reason}")]
    ResultsDir { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required field `{field}` in {path}")]
    MissingField { path: PathBuf, field: String },

    #[error("Field type mismatch in {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for `{field}` in {path}: {reason}")]
    InvalidValue {
        path: PathBuf,
        field: String,
        reason: String,
    },

    #[error("No experiment results to aggregate")]
    NoExperiments,

    #[error("Total question count across {experiments} experiments is zero")]
    ZeroQuestions { experiments: usize },

    #[error("No per-agent accuracy found in any experiment")]
    NoAgents,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
