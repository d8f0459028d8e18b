// src/dag/mod.rs

//! Task graph construction and scheduling.
//!
//! - [`builder`] resolves root requests into a [`TaskGraph`], detecting
//!   cycles and parameter conflicts.
//! - [`graph`] holds the immutable graph with deps/dependents adjacency.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are checked, dispatched, retried, failed or cancelled.
//! - [`task_info`] provides task statuses and the scheduled task type.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod builder;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub(crate) mod state_manager;
pub mod task_info;

pub use builder::GraphBuilder;
pub use graph::TaskGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::{RetryScheduled, SchedulerStep};
pub use task_info::{ScheduledTask, TaskStatus};
