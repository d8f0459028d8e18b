// src/exec/task_runner.rs

//! Individual task execution and completion checks.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::TaskError;
use crate::task::{Target, TaskContext};

/// Aborts the wrapped task when dropped, so aborting a runner also stops the
/// body it spawned.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one attempt of a task and report `TaskCompleted` to the runtime.
pub async fn run_task(
    scheduled: ScheduledTask,
    verify_outputs: bool,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let id = scheduled.id().clone();
    let attempt = scheduled.attempt;
    let started = Instant::now();

    let outcome = match execute(scheduled, verify_outputs).await {
        Ok(()) => TaskOutcome::Success,
        Err(err) => {
            error!(task = %id, attempt, error = %err, "task execution error");
            TaskOutcome::Failed(err)
        }
    };
    let elapsed = started.elapsed();

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: id.clone(),
            outcome,
            elapsed,
        })
        .await
        .is_err()
    {
        debug!(task = %id, "runtime gone; dropping completion event");
    }
}

/// Run the body of `scheduled` in its own Tokio task and, on success,
/// optionally confirm that the output now exists.
///
/// A panic inside the body is captured here and becomes
/// [`TaskError::Panicked`].
pub async fn execute(scheduled: ScheduledTask, verify_outputs: bool) -> Result<(), TaskError> {
    let task = Arc::clone(&scheduled.task);

    info!(
        task = %task.id,
        attempt = scheduled.attempt,
        target = %task.output.description(),
        "starting task"
    );

    let ctx = TaskContext {
        id: task.id.clone(),
        params: task.params.clone(),
        salt: task.salt.clone(),
        output: Arc::clone(&task.output),
        inputs: scheduled.inputs,
        attempt: scheduled.attempt,
    };

    let kind = Arc::clone(&task.kind);
    let mut body = AbortOnDrop(tokio::spawn(async move { kind.run(ctx).await }));

    match (&mut body.0).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return Err(err),
        Err(join_err) if join_err.is_panic() => {
            return Err(TaskError::Panicked(panic_message(join_err.into_panic())));
        }
        Err(join_err) => {
            return Err(TaskError::Execution(format!(
                "task body did not complete: {join_err}"
            )));
        }
    }

    if verify_outputs && task.output.declares_output() {
        match check_target(Arc::clone(&task.output)).await {
            Ok(true) => {}
            Ok(false) => return Err(TaskError::OutputMissing(task.output.description())),
            Err(err) => return Err(err),
        }
    }

    info!(task = %task.id, attempt = scheduled.attempt, "task body succeeded");
    Ok(())
}

/// Run `target.exists()` on the blocking thread pool.
///
/// Faults (including a panicking check) become [`TaskError::TargetCheck`].
pub async fn check_target(target: Arc<dyn Target>) -> Result<bool, TaskError> {
    let description = target.description();
    match tokio::task::spawn_blocking(move || target.exists()).await {
        Ok(Ok(exists)) => {
            debug!(target = %description, exists, "target checked");
            Ok(exists)
        }
        Ok(Err(err)) => Err(TaskError::TargetCheck(err.to_string())),
        Err(join_err) => Err(TaskError::TargetCheck(format!(
            "check of {description} did not complete: {join_err}"
        ))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
