// src/report.rs

//! Final per-run summary.
//!
//! Built once by the scheduler when the run reaches a terminal state (or is
//! cancelled). Serializable so an external collaborator can persist it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dag::TaskStatus;
use crate::task::TaskId;

/// Final record for a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub kind: String,
    pub status: TaskStatus,
    /// Number of times the body was dispatched (0 for skipped tasks and for
    /// tasks failed by an upstream failure).
    pub attempts: u32,
    pub elapsed_ms: u64,
    /// Description of the task's output target.
    pub target: String,
    /// Failure detail for `Failed` tasks (also set for `Cancelled` ones).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub tasks: BTreeMap<TaskId, TaskReport>,
    /// Whether the run was cancelled before it completed on its own.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Tasks that never reached a terminal status (only possible in a
    /// report snapshotted mid-run).
    pub unfinished: usize,
}

impl RunReport {
    /// `true` iff no task ended `Failed`.
    pub fn all_succeeded(&self) -> bool {
        !self
            .tasks
            .values()
            .any(|t| t.status == TaskStatus::Failed)
    }

    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks.get(id).map(|t| t.status)
    }

    /// Look a task up by its canonical identity string.
    pub fn get(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.get(&TaskId::from_canonical(id))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&TaskId, &TaskReport)> {
        self.tasks
            .iter()
            .filter(|(_, t)| t.status == TaskStatus::Failed)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
                TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Running => {
                    counts.unfinished += 1
                }
            }
        }
        counts
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing run report")
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parsing run report")
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::write(path, self.to_json()?)
            .with_context(|| format!("writing run report {:?}", path))?;
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.counts();
        writeln!(
            f,
            "{} tasks: {} done, {} skipped, {} failed, {} cancelled ({} ms){}",
            self.tasks.len(),
            c.done,
            c.skipped,
            c.failed,
            c.cancelled,
            self.elapsed_ms,
            if self.cancelled { " [cancelled]" } else { "" }
        )?;
        for (id, task) in &self.tasks {
            write!(f, "  {:<9} {id}", format!("{:?}", task.status).to_lowercase())?;
            if let Some(err) = &task.error {
                if task.status == TaskStatus::Failed {
                    write!(f, ": {err}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
