// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info, warn};

use crate::dag::{RetryScheduled, ScheduledTask};
use crate::errors::Result;
use crate::exec::{ExecutorBackend, check_target};
use crate::report::RunReport;
use crate::task::Task;

use super::core::CoreRuntime;
use super::{CancelReason, CoreCommand, CoreStep, RuntimeEvent};

/// Drives the DAG scheduler in response to `RuntimeEvent`s,
/// and delegates actual task execution to an `ExecutorBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, running completion checks on the blocking pool, arming retry
/// timers, enforcing the run timeout and dispatching tasks to the executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_tx: mpsc::Sender<RuntimeEvent>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    /// `event_tx` must be the sending half of `event_rx`; the executor should
    /// hold a clone of it for its completion events.
    pub fn new(
        core: CoreRuntime,
        event_tx: mpsc::Sender<RuntimeEvent>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
    ) -> Self {
        Self {
            core,
            event_tx,
            event_rx,
            executor,
        }
    }

    /// Handle for cancelling this run from elsewhere.
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            tx: self.event_tx.clone(),
        }
    }

    /// Main event loop.
    ///
    /// - Seeds the core and executes its first commands.
    /// - Consumes `RuntimeEvent`s from `event_rx` (and the timeout deadline).
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core until it issues `Finish`.
    pub async fn run(mut self) -> Result<RunReport> {
        let started = Instant::now();
        let timeout = self.core.options().timeout;
        // A timeout too large to represent as an instant never fires.
        let deadline = timeout.and_then(|t| started.checked_add(t));
        let mut timed_out = false;

        info!(
            tasks = self.core.scheduler().graph().len(),
            ?timeout,
            "saltdag runtime started"
        );

        let step = self.core.start();
        let mut finished = self.apply(step).await?;

        while !finished {
            let event = tokio::select! {
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    None => {
                        warn!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = wait_deadline(deadline), if !timed_out => {
                    timed_out = true;
                    warn!(?timeout, "run timeout elapsed; cancelling");
                    RuntimeEvent::CancelRequested { reason: CancelReason::Timeout }
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            finished = self.apply(step).await?;
        }

        let report = self.core.report(started.elapsed());
        let counts = report.counts();
        info!(
            done = counts.done,
            skipped = counts.skipped,
            failed = counts.failed,
            cancelled = counts.cancelled,
            elapsed_ms = report.elapsed_ms,
            "runtime exiting"
        );
        Ok(report)
    }

    /// Execute the commands of one core step. Returns `true` once the core
    /// says the run is over.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        let mut finished = !step.keep_running;
        for command in step.commands {
            match command {
                CoreCommand::AbortTasks(ids) => {
                    info!(count = ids.len(), "aborting running tasks");
                    self.executor.abort_tasks(&ids);
                }
                CoreCommand::CheckTargets(tasks) => self.check_targets(tasks),
                CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await?,
                CoreCommand::ScheduleRetries(retries) => self.arm_retries(retries),
                CoreCommand::Finish => {
                    info!("core issued Finish command");
                    finished = true;
                }
            }
        }
        Ok(finished)
    }

    fn check_targets(&self, tasks: Vec<Arc<Task>>) {
        for task in tasks {
            let tx = self.event_tx.clone();
            let id = task.id.clone();
            let target = Arc::clone(&task.output);
            tokio::spawn(async move {
                let result = check_target(target).await;
                if tx
                    .send(RuntimeEvent::TargetChecked {
                        task: id.clone(),
                        result,
                    })
                    .await
                    .is_err()
                {
                    debug!(task = %id, "runtime gone; dropping target check result");
                }
            });
        }
    }

    fn arm_retries(&self, retries: Vec<RetryScheduled>) {
        for retry in retries {
            let tx = self.event_tx.clone();
            tokio::spawn(async move {
                sleep(retry.delay).await;
                debug!(task = %retry.id, attempt = retry.attempt, "retry timer fired");
                let _ = tx.send(RuntimeEvent::RetryDue { task: retry.id }).await;
            });
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = tasks.iter().map(|t| t.id().as_str()).collect();
        debug!(?ids, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle that requests cancellation of a running [`Runtime`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl RunHandle {
    /// Request cancellation. Returns `false` if the run already ended.
    pub async fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::Requested).await
    }

    pub async fn cancel_with(&self, reason: CancelReason) -> bool {
        self.tx
            .send(RuntimeEvent::CancelRequested { reason })
            .await
            .is_ok()
    }

    /// Non-async variant; also fails if the event channel is momentarily full.
    pub fn try_cancel(&self) -> bool {
        self.tx
            .try_send(RuntimeEvent::CancelRequested {
                reason: CancelReason::Requested,
            })
            .is_ok()
    }
}
