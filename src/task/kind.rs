// src/task/kind.rs

//! The task body interface.
//!
//! A [`TaskKind`] is the code side of a task: given parameters it declares
//! dependencies and an output, and it knows how to produce that output. The
//! graph builder instantiates one node per distinct identity of a kind.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaskError};
use crate::task::identity::TaskId;
use crate::task::params::Params;
use crate::task::target::Target;

/// Boxed future returned by task bodies.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request for a task instance: kind name plus parameters.
///
/// Used both for root tasks of a run and for dependency declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

impl TaskRequest {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
        }
    }

    pub fn param(
        mut self,
        name: impl Into<String>,
        value: impl Into<crate::task::ParamValue>,
    ) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Everything a task body gets to see when it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub id: TaskId,
    pub params: Params,
    pub salt: String,
    /// This task's own output.
    pub output: Arc<dyn Target>,
    /// Outputs of the direct dependencies, in declaration order.
    pub inputs: Vec<Arc<dyn Target>>,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// A named, parameterized unit of work.
pub trait TaskKind: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Code version; part of the salt, so bumping it invalidates outputs.
    fn version(&self) -> &str {
        "0"
    }

    /// Whether `param` takes part in the task identity and salt.
    ///
    /// Insignificant parameters still reach the body but two requests that
    /// only differ in them are the same task (and conflict if both are made).
    fn is_significant(&self, _param: &str) -> bool {
        true
    }

    /// Dependencies of the instance with the given parameters.
    fn requires(&self, _params: &Params) -> Result<Vec<TaskRequest>> {
        Ok(Vec::new())
    }

    /// Output target of the instance with the given parameters and salt.
    fn output(&self, params: &Params, salt: &str) -> Result<Arc<dyn Target>>;

    /// Produce the output.
    ///
    /// Bodies that block (synchronous file or network IO) should move that
    /// work onto `tokio::task::spawn_blocking`.
    fn run<'a>(&'a self, ctx: TaskContext) -> BoxFuture<'a, std::result::Result<(), TaskError>>;
}
