use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::{RetryScheduled, SchedulerStep};
use crate::dag::state_manager::{ReadyPhase, StateManager};
use crate::dag::task_info::{ScheduledTask, TaskStatus};
use crate::engine::TaskOutcome;
use crate::engine::retry::RetryPolicy;
use crate::errors::TaskError;
use crate::report::{RunReport, TaskReport};
use crate::task::TaskId;
use crate::types::CancelPolicy;

/// Scheduler holds the immutable graph plus the mutable state of one run.
///
/// It is a synchronous state machine with no Tokio types: every method takes
/// one event (a check result, a completion, a timer, a cancellation), applies
/// all resulting state changes, and reports what the IO shell must do next as
/// a [`SchedulerStep`]. It is responsible for:
/// - releasing dependents once all of their dependencies are done/skipped
/// - skipping tasks whose target already exists
/// - keeping at most `concurrency` tasks running
/// - retrying failed attempts according to the [`RetryPolicy`]
/// - failing transitive dependents when a task fails for good
/// - cancelling everything not yet started when asked to
#[derive(Debug)]
pub struct Scheduler {
    graph: Arc<TaskGraph>,
    state: StateManager,
    concurrency: usize,
    retry: RetryPolicy,
    started: bool,
    cancelled: bool,
}

impl Scheduler {
    pub fn new(graph: Arc<TaskGraph>, concurrency: usize, retry: RetryPolicy) -> Self {
        let state = StateManager::new(&graph);
        Self {
            graph,
            state,
            concurrency: concurrency.max(1),
            retry,
            started: false,
            cancelled: false,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.state.status_of(id)
    }

    pub fn running(&self) -> usize {
        self.state.running()
    }

    /// Whether every task has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.state.all_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Begin the run: every task with no dependencies becomes `Ready` and has
    /// its target checked.
    pub fn start(&mut self) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.started {
            warn!("scheduler: start called twice; ignoring");
            return step;
        }
        self.started = true;

        info!(
            tasks = self.graph.len(),
            concurrency = self.concurrency,
            "scheduler: starting run"
        );

        let ready = self.state.initial_ready(&self.graph);
        self.make_ready(ready, &mut step);
        step.run_just_finished = self.state.all_terminal();
        step
    }

    /// Apply the result of a completion check for a `Ready` task.
    pub fn step_target_checked(
        &mut self,
        id: &TaskId,
        result: Result<bool, TaskError>,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if self.state.phase_of(id) != Some(ReadyPhase::Checking) {
            debug!(task = %id, "stale target check result; ignoring");
            return step;
        }

        match result {
            Ok(true) => {
                info!(task = %id, "target already exists; skipping");
                step.newly_skipped.push(id.clone());
                let released = self.state.mark_satisfied(&self.graph, id, TaskStatus::Skipped);
                self.make_ready(released, &mut step);
            }
            Ok(false) => {
                debug!(task = %id, "target missing; queueing for dispatch");
                self.state.set_ready(id, ReadyPhase::Queued);
            }
            Err(err) => {
                warn!(task = %id, error = %err, "target check failed");
                self.handle_failure(id, err, &mut step);
            }
        }

        self.fill_slots(&mut step);
        self.finish_step(&mut step);
        step
    }

    /// Apply the outcome of a dispatched task.
    pub fn step_completion(
        &mut self,
        id: &TaskId,
        outcome: TaskOutcome,
        elapsed: Duration,
    ) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if self.state.status_of(id) != Some(TaskStatus::Running) {
            debug!(task = %id, "completion for task that is not running; ignoring");
            return step;
        }
        self.state
            .add_elapsed(id, u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));

        match outcome {
            TaskOutcome::Success => {
                info!(task = %id, elapsed_ms = elapsed.as_millis() as u64, "task completed");
                let released = self.state.mark_satisfied(&self.graph, id, TaskStatus::Done);
                self.make_ready(released, &mut step);
            }
            TaskOutcome::Failed(err) => {
                warn!(task = %id, error = %err, "task attempt failed");
                self.handle_failure(id, err, &mut step);
            }
        }

        self.fill_slots(&mut step);
        self.finish_step(&mut step);
        step
    }

    /// A retry timer fired: check the target again before re-running.
    pub fn step_retry_due(&mut self, id: &TaskId) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        if self.state.phase_of(id) != Some(ReadyPhase::RetryWait) {
            debug!(task = %id, "retry timer for task not waiting on retry; ignoring");
            return step;
        }

        self.state.set_ready(id, ReadyPhase::Checking);
        if let Some(task) = self.graph.task(id) {
            step.to_check.push(Arc::clone(task));
        }
        step
    }

    /// Cancel the run.
    ///
    /// Everything not yet running becomes `Cancelled`. Running tasks are left
    /// to finish under [`CancelPolicy::Drain`] and cancelled (and reported in
    /// `to_abort`) under [`CancelPolicy::Abort`].
    pub fn step_cancel(&mut self, policy: CancelPolicy) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        if self.cancelled {
            return step;
        }
        self.cancelled = true;

        info!(?policy, running = self.state.running(), "scheduler: cancelling run");

        step.newly_cancelled = self.state.cancel_where(|s| s != TaskStatus::Running);
        if policy == CancelPolicy::Abort {
            let aborted = self.state.cancel_where(|s| s == TaskStatus::Running);
            step.to_abort = aborted.clone();
            step.newly_cancelled.extend(aborted);
        }

        self.finish_step(&mut step);
        step
    }

    /// Snapshot the current state as a report.
    ///
    /// Normally called once the run is finished, but works at any time.
    pub fn report(&self, elapsed: Duration) -> RunReport {
        let tasks = self
            .graph
            .tasks()
            .filter_map(|id| {
                let task = self.graph.task(id)?;
                let info = self.state.info(id)?;
                Some((
                    id.clone(),
                    TaskReport {
                        kind: task.kind_name().to_string(),
                        status: info.status,
                        attempts: info.attempts,
                        elapsed_ms: info.elapsed_ms,
                        target: task.output.description(),
                        error: info.error.as_ref().map(|e| e.to_string()),
                    },
                ))
            })
            .collect();

        RunReport {
            tasks,
            cancelled: self.cancelled,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Mark newly released tasks `Ready` and request their completion checks.
    fn make_ready(&mut self, ids: Vec<TaskId>, step: &mut SchedulerStep) {
        for id in ids {
            if self.cancelled {
                break;
            }
            debug!(task = %id, "dependencies satisfied; checking target");
            self.state.set_ready(&id, ReadyPhase::Checking);
            if let Some(task) = self.graph.task(&id) {
                step.to_check.push(Arc::clone(task));
            }
        }
    }

    /// Either arm a retry or fail the task (and its dependents) for good.
    fn handle_failure(&mut self, id: &TaskId, err: TaskError, step: &mut SchedulerStep) {
        let failures = self.state.record_failure(id);

        if !self.cancelled {
            if let Some(delay) = self.retry.next_delay(failures) {
                info!(
                    task = %id,
                    attempt = failures + 1,
                    max_attempts = self.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling retry"
                );
                self.state.record_error(id, err);
                self.state.set_ready(id, ReadyPhase::RetryWait);
                step.retries.push(RetryScheduled {
                    id: id.clone(),
                    attempt: failures + 1,
                    delay,
                });
                return;
            }
        }

        let failed = self.state.mark_failed(&self.graph, id, err);
        if failed.len() > 1 {
            warn!(
                task = %id,
                dependents = failed.len() - 1,
                "task failed; failing its dependents"
            );
        }
        step.newly_failed.extend(failed);
    }

    /// Dispatch queued tasks while worker slots are free.
    fn fill_slots(&mut self, step: &mut SchedulerStep) {
        if self.cancelled {
            return;
        }

        for id in self.state.take_dispatchable(self.concurrency) {
            let Some(task) = self.graph.task(&id) else {
                continue;
            };
            let inputs = task
                .deps
                .iter()
                .filter_map(|d| self.graph.task(d).map(|t| Arc::clone(&t.output)))
                .collect();
            let attempt = self.state.info(&id).map(|i| i.attempts).unwrap_or(1);

            info!(task = %id, attempt, "dispatching task");
            step.dispatched.push(ScheduledTask {
                task: Arc::clone(task),
                inputs,
                attempt,
            });
        }
    }

    fn finish_step(&self, step: &mut SchedulerStep) {
        if self.state.all_terminal() {
            info!("scheduler: all tasks terminal; run finished");
            step.run_just_finished = true;
        }
    }
}
