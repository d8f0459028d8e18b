// src/dag/task_info.rs

//! Per-task run state and the dispatch payload handed to executors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::TaskError;
use crate::task::{Target, Task, TaskId};

/// Status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for dependencies.
    Pending,
    /// All dependencies satisfied; waiting for the completion check, a worker
    /// slot, or a retry timer.
    Ready,
    /// Handed to the worker pool.
    Running,
    /// Body ran and succeeded.
    Done,
    /// Body (or completion check) failed, or an upstream task failed.
    Failed,
    /// Target already existed; body never ran.
    Skipped,
    /// The run was cancelled before this task reached another terminal state.
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
        )
    }

    /// Whether dependents may proceed past this task.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Skipped)
    }
}

/// Mutable per-run record for one node (internal to the scheduler).
#[derive(Debug, Clone)]
pub(crate) struct TaskInfo {
    pub status: TaskStatus,
    /// Dependencies that have not yet reached `Done`/`Skipped`.
    pub remaining_deps: usize,
    /// Number of times the body has been dispatched.
    pub attempts: u32,
    /// Number of failed attempts (body failures and completion-check faults).
    pub failures: u32,
    /// Accumulated body run time in milliseconds.
    pub elapsed_ms: u64,
    pub error: Option<TaskError>,
}

impl TaskInfo {
    pub fn new(remaining_deps: usize) -> Self {
        Self {
            status: TaskStatus::Pending,
            remaining_deps,
            attempts: 0,
            failures: 0,
            elapsed_ms: 0,
            error: None,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Arc<Task>,
    /// Output targets of the direct dependencies, in declaration order.
    pub inputs: Vec<Arc<dyn Target>>,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl ScheduledTask {
    pub fn id(&self) -> &TaskId {
        &self.task.id
    }
}
