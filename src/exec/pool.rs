// src/exec/pool.rs

//! Bounded worker pool that runs task bodies on Tokio.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::backend::ExecutorBackend;
use crate::exec::task_runner::run_task;
use crate::task::TaskId;

/// Production executor backend.
///
/// Each scheduled task runs in its own Tokio task, so one body's blocking or
/// panicking never stalls the runtime loop or other executions. At most
/// `concurrency` bodies hold a permit at the same time, and **per task id
/// and attempt there is never more than one execution in flight**: a second
/// dispatch of an attempt that is still running is ignored. A new attempt
/// always runs, even if the runner of the previous one has not wound down
/// after reporting its completion.
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    verify_outputs: bool,
    /// Latest execution per task: its attempt number and runner handle.
    active: HashMap<TaskId, (u32, JoinHandle<()>)>,
}

impl WorkerPool {
    pub fn new(
        concurrency: usize,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        verify_outputs: bool,
    ) -> Self {
        info!(concurrency, verify_outputs, "worker pool created");
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            runtime_tx,
            verify_outputs,
            active: HashMap::new(),
        }
    }

    fn spawn_one(&mut self, task: ScheduledTask) {
        let id = task.id().clone();

        if let Some((attempt, existing)) = self.active.get(&id) {
            if *attempt == task.attempt && !existing.is_finished() {
                warn!(
                    task = %id,
                    attempt = task.attempt,
                    "task already executing; ignoring duplicate dispatch"
                );
                return;
            }
        }

        let permits = Arc::clone(&self.permits);
        let tx = self.runtime_tx.clone();
        let verify = self.verify_outputs;
        let spawn_id = id.clone();
        let attempt = task.attempt;

        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => {
                    debug!(task = %spawn_id, "worker pool closed; dropping task");
                    return;
                }
            };
            run_task(task, verify, tx).await;
            debug!(task = %spawn_id, "task runner future finished");
        });

        self.active.insert(id, (attempt, handle));
    }
}

impl ExecutorBackend for WorkerPool {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.active.retain(|_, (_, h)| !h.is_finished());
        for task in tasks {
            self.spawn_one(task);
        }
        Box::pin(async { Ok(()) })
    }

    fn abort_tasks(&mut self, tasks: &[TaskId]) {
        for id in tasks {
            if let Some((_, handle)) = self.active.remove(id) {
                info!(task = %id, "aborting running task");
                handle.abort();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.permits.close();
    }
}
