// src/errors.rs

//! Crate-wide error types.
//!
//! - [`SaltdagError`] covers everything that goes wrong *before* a run starts
//!   (manifest problems, graph construction). These abort the invocation and
//!   no report is produced.
//! - [`TaskError`] is the per-task failure detail recorded in the run report.
//!   It never aborts the run; it only cascades to dependents.

use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum SaltdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown task kind: {0}")]
    UnknownKind(String),

    #[error("Cycle detected in task graph: {}", format_path(.path))]
    Cycle { path: Vec<TaskId> },

    #[error(
        "Parameter conflict for task {id}: already requested with {existing}, now with {requested}"
    )]
    ParameterConflict {
        id: TaskId,
        existing: String,
        requested: String,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a single task did not succeed.
///
/// Cloneable so the scheduler can keep it in its state table and hand a copy
/// to the report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("task body failed: {0}")]
    Execution(String),

    #[error("target check failed: {0}")]
    TargetCheck(String),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task finished but its output {0} does not exist")]
    OutputMissing(String),

    #[error("upstream task {0} failed")]
    UpstreamFailed(TaskId),

    #[error("run cancelled")]
    Cancelled,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SaltdagError>;
