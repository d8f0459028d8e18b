// src/task/mod.rs

//! Task data model.
//!
//! - [`params`]: parameter values and canonical rendering.
//! - [`identity`]: content-derived [`TaskId`]s used for deduplication.
//! - [`salt`]: salted versions that tie outputs to upstream inputs.
//! - [`target`]: the [`Target`] existence-check interface and implementations.
//! - [`kind`]: the [`TaskKind`] body interface and [`TaskRequest`].
//! - [`registry`]: name → kind lookup used by the graph builder.

pub mod identity;
pub mod kind;
pub mod params;
pub mod registry;
pub mod salt;
pub mod target;

use std::fmt;
use std::sync::Arc;

pub use identity::TaskId;
pub use kind::{BoxFuture, TaskContext, TaskKind, TaskRequest};
pub use params::{ParamValue, Params};
pub use registry::Registry;
pub use target::{FileTarget, NoTarget, Target, TargetError};

/// A resolved task node.
///
/// Constructed once by the graph builder and then shared read-only (behind an
/// `Arc`) by the scheduler and the worker pool for the rest of the run.
pub struct Task {
    pub id: TaskId,
    pub kind: Arc<dyn TaskKind>,
    pub params: Params,
    pub salt: String,
    pub output: Arc<dyn Target>,
    /// Direct dependencies, deduplicated, in declaration order.
    pub deps: Vec<TaskId>,
}

impl Task {
    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("salt", &self.salt)
            .field("output", &self.output.description())
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}
