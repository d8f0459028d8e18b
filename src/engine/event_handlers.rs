// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::sync::Arc;

use tracing::info;

use crate::dag::{RetryScheduled, ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::{CancelReason, RuntimeOptions, TaskOutcome};
use crate::errors::TaskError;
use crate::task::{Task, TaskId};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Run the completion checks of these tasks off the coordinator.
    CheckTargets(Vec<Arc<Task>>),
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Arm these retry timers.
    ScheduleRetries(Vec<RetryScheduled>),
    /// Abort the executions of these running tasks.
    AbortTasks(Vec<TaskId>),
    /// Every task is terminal; produce the report and stop.
    Finish,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Translate a scheduler step into shell commands.
///
/// Aborts go first so a cancelled execution cannot race with anything
/// dispatched afterwards; `Finish` always goes last.
pub fn commands_from_step(step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();

    if !step.to_abort.is_empty() {
        commands.push(CoreCommand::AbortTasks(step.to_abort));
    }
    if !step.to_check.is_empty() {
        commands.push(CoreCommand::CheckTargets(step.to_check));
    }
    if !step.dispatched.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.dispatched));
    }
    if !step.retries.is_empty() {
        commands.push(CoreCommand::ScheduleRetries(step.retries));
    }

    let keep_running = !step.run_just_finished;
    if step.run_just_finished {
        commands.push(CoreCommand::Finish);
    }

    CoreStep {
        commands,
        keep_running,
    }
}

/// Seed the run.
pub fn handle_start(scheduler: &mut Scheduler) -> CoreStep {
    commands_from_step(scheduler.start())
}

/// Handle the result of a completion check.
pub fn handle_target_checked(
    scheduler: &mut Scheduler,
    task: TaskId,
    result: Result<bool, TaskError>,
) -> CoreStep {
    commands_from_step(scheduler.step_target_checked(&task, result))
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskId,
    outcome: TaskOutcome,
    elapsed: std::time::Duration,
) -> CoreStep {
    commands_from_step(scheduler.step_completion(&task, outcome, elapsed))
}

/// Handle a retry timer firing.
pub fn handle_retry_due(scheduler: &mut Scheduler, task: TaskId) -> CoreStep {
    commands_from_step(scheduler.step_retry_due(&task))
}

/// Handle a cancellation request.
///
/// A second request while draining is ignored by the scheduler, so the run
/// still waits for in-flight tasks.
pub fn handle_cancel(
    scheduler: &mut Scheduler,
    options: &RuntimeOptions,
    reason: CancelReason,
) -> CoreStep {
    info!(?reason, policy = ?options.cancel_policy, "cancellation requested");
    commands_from_step(scheduler.step_cancel(options.cancel_policy))
}
