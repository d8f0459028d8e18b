// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning task bodies
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation in [`super::pool`].
//!
//! - [`WorkerPool`](super::pool::WorkerPool) is the default implementation:
//!   it runs task bodies on Tokio, bounded by a semaphore.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskCompleted` events.

use std::future::Future;
use std::pin::Pin;

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::task::TaskId;

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution.
    ///
    /// Must not wait for the tasks to finish; outcomes are reported back as
    /// `RuntimeEvent::TaskCompleted`.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop the executions of the given tasks. No completion event is
    /// expected for them afterwards.
    fn abort_tasks(&mut self, _tasks: &[TaskId]) {}
}
