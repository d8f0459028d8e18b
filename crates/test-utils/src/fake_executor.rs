use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use saltdag::dag::ScheduledTask;
use saltdag::engine::{RuntimeEvent, TaskOutcome};
use saltdag::errors::{Result, TaskError};
use saltdag::exec::ExecutorBackend;
use saltdag::task::TaskId;

/// A fake executor that:
/// - records which tasks were "run" (and which were aborted)
/// - immediately reports TaskCompleted for each scheduled task, failing the
///   ones listed in `failing`.
///
/// Task bodies and outputs are never touched, so every task that is not
/// skipped by its target check ends `Done` (or `Failed`).
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<TaskId>>>,
    aborted: Arc<Mutex<Vec<TaskId>>>,
    failing: HashSet<String>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<TaskId>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            aborted: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
        }
    }

    /// Report every attempt of the task with this canonical id as failed.
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn aborted(&self) -> Arc<Mutex<Vec<TaskId>>> {
        Arc::clone(&self.aborted)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                let id = t.id().clone();
                {
                    let mut guard = executed.lock().unwrap();
                    guard.push(id.clone());
                }

                let outcome = if failing.contains(id.as_str()) {
                    TaskOutcome::Failed(TaskError::Execution("scripted failure".to_string()))
                } else {
                    TaskOutcome::Success
                };

                tx.send(RuntimeEvent::TaskCompleted {
                    task: id,
                    outcome,
                    elapsed: Duration::from_millis(1),
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn abort_tasks(&mut self, tasks: &[TaskId]) {
        self.aborted.lock().unwrap().extend(tasks.iter().cloned());
    }
}
