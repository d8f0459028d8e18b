// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel
//! - running completion checks on the blocking pool
//! - sending `ScheduledTask`s to the executor
//! - retry timers, the run timeout and Ctrl+C
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use std::time::Duration;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    CoreStep, handle_cancel, handle_retry_due, handle_start, handle_target_checked,
    handle_task_completion,
};
use crate::engine::{RuntimeEvent, RuntimeOptions};
use crate::report::RunReport;

/// Pure core runtime state.
///
/// This owns the scheduler (and through it the whole run state) plus the
/// runtime options. It has **no** channels, no Tokio types, and does not
/// perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self { scheduler, options }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether every task is terminal (for tests).
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Seed the run; must be called once before feeding events.
    pub fn start(&mut self) -> CoreStep {
        handle_start(&mut self.scheduler)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TargetChecked { task, result } => {
                handle_target_checked(&mut self.scheduler, task, result)
            }
            RuntimeEvent::TaskCompleted {
                task,
                outcome,
                elapsed,
            } => handle_task_completion(&mut self.scheduler, task, outcome, elapsed),
            RuntimeEvent::RetryDue { task } => handle_retry_due(&mut self.scheduler, task),
            RuntimeEvent::CancelRequested { reason } => {
                handle_cancel(&mut self.scheduler, &self.options, reason)
            }
        }
    }

    pub fn report(&self, elapsed: Duration) -> RunReport {
        self.scheduler.report(elapsed)
    }
}
