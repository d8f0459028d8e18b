// src/engine/mod.rs

//! Orchestration engine for saltdag.
//!
//! This module ties together:
//! - the scheduler (pure per-run state machine from [`crate::dag`])
//! - the retry policy consulted when attempts fail
//! - the main runtime event loop that reacts to:
//!   - completion-check results
//!   - task completion events
//!   - retry timers
//!   - cancellation requests (Ctrl-C, timeout, [`RunHandle`])
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::errors::TaskError;
use crate::task::TaskId;

/// Outcome of one task attempt as reported by the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success,
    Failed(TaskError),
}

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Ctrl-C / SIGINT.
    Signal,
    /// The configured run timeout elapsed.
    Timeout,
    /// Requested programmatically through a [`RunHandle`].
    Requested,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// What to do with running tasks on cancellation.
    pub cancel_policy: CancelPolicy,
    /// Cancel the run if it has not finished after this long.
    pub timeout: Option<Duration>,
}

/// Events flowing into the runtime from checkers, executors and timers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A completion check finished.
    TargetChecked {
        task: TaskId,
        result: Result<bool, TaskError>,
    },
    /// A task attempt finished with a concrete outcome.
    TaskCompleted {
        task: TaskId,
        outcome: TaskOutcome,
        elapsed: Duration,
    },
    /// A retry timer fired.
    RetryDue { task: TaskId },
    /// Cancellation requested.
    CancelRequested { reason: CancelReason },
}

pub mod core;
pub mod event_handlers;
pub mod retry;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use retry::{Backoff, RetryPolicy};
pub use runtime::{RunHandle, Runtime};
pub use crate::types::CancelPolicy;
