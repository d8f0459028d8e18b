// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually running task bodies and their
//! completion checks, and reporting back to the orchestration runtime via
//! `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ExecutorBackend` trait the runtime dispatches
//!   through, and which tests can replace with a fake implementation.
//! - [`pool`] is the production backend: a bounded pool of Tokio tasks.
//! - [`task_runner`] runs one attempt (body, panic capture, output
//!   verification) and the blocking-pool target checks.
//! - [`command`] implements manifest-declared shell-command task kinds.
//! - [`template`] renders `{placeholder}` templates for those kinds.

pub mod backend;
pub mod command;
pub mod pool;
pub mod task_runner;
pub mod template;

pub use backend::ExecutorBackend;
pub use command::{CommandKind, command_registry};
pub use pool::WorkerPool;
pub use task_runner::check_target;
