// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use std::sync::Arc;
use std::time::Duration;

use crate::dag::task_info::ScheduledTask;
use crate::task::{Task, TaskId};

/// A retry timer the runtime should arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryScheduled {
    pub id: TaskId,
    /// Attempt number the retry will run as.
    pub attempt: u32,
    pub delay: Duration,
}

/// Structured result of a single scheduler "step".
///
/// The runtime turns these into IO; tests step the scheduler by hand and make
/// assertions on them directly.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became eligible and whose targets must now be checked.
    pub to_check: Vec<Arc<Task>>,
    /// Tasks handed to the worker pool in this step.
    pub dispatched: Vec<ScheduledTask>,
    /// Retry timers to arm.
    pub retries: Vec<RetryScheduled>,
    /// Tasks newly marked `Skipped` (target already existed).
    pub newly_skipped: Vec<TaskId>,
    /// Tasks newly marked `Failed`, the failing task first, then its
    /// cascaded dependents.
    pub newly_failed: Vec<TaskId>,
    /// Tasks newly marked `Cancelled`.
    pub newly_cancelled: Vec<TaskId>,
    /// Running tasks whose executions must be aborted.
    pub to_abort: Vec<TaskId>,
    /// Whether this step made every task terminal.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn dispatched_ids(&self) -> Vec<TaskId> {
        self.dispatched.iter().map(|t| t.id().clone()).collect()
    }

    pub fn check_ids(&self) -> Vec<TaskId> {
        self.to_check.iter().map(|t| t.id.clone()).collect()
    }
}
