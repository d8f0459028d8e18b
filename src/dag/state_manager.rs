// src/dag/state_manager.rs

//! Per-run state table: statuses, readiness counters, dispatch queue.
//!
//! Every status change goes through [`StateManager::transition`] so the
//! running and unfinished counters can never drift from the table.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::{TaskInfo, TaskStatus};
use crate::errors::TaskError;
use crate::task::TaskId;

/// What a `Ready` task is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadyPhase {
    /// Completion check issued, result not back yet.
    Checking,
    /// Target missing; waiting in the dispatch queue for a worker slot.
    Queued,
    /// A failed attempt is waiting for its retry timer.
    RetryWait,
}

#[derive(Debug)]
pub(crate) struct StateManager {
    infos: HashMap<TaskId, TaskInfo>,
    phases: HashMap<TaskId, ReadyPhase>,
    dispatch_queue: VecDeque<TaskId>,
    running: usize,
    unfinished: usize,
}

impl StateManager {
    pub fn new(graph: &TaskGraph) -> Self {
        let infos: HashMap<TaskId, TaskInfo> = graph
            .tasks()
            .map(|id| (id.clone(), TaskInfo::new(graph.in_degree(id))))
            .collect();
        let unfinished = infos.len();

        Self {
            infos,
            phases: HashMap::new(),
            dispatch_queue: VecDeque::new(),
            running: 0,
            unfinished,
        }
    }

    pub fn info(&self, id: &TaskId) -> Option<&TaskInfo> {
        self.infos.get(id)
    }

    pub fn status_of(&self, id: &TaskId) -> Option<TaskStatus> {
        self.infos.get(id).map(|i| i.status)
    }

    pub fn phase_of(&self, id: &TaskId) -> Option<ReadyPhase> {
        self.phases.get(id).copied()
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn all_terminal(&self) -> bool {
        self.unfinished == 0
    }

    /// Change the status of `id`, keeping counters consistent.
    ///
    /// Terminal statuses are final; attempts to leave one are ignored.
    pub fn transition(&mut self, id: &TaskId, to: TaskStatus) -> bool {
        let Some(info) = self.infos.get_mut(id) else {
            warn!(task = %id, "status change for unknown task; ignoring");
            return false;
        };
        let from = info.status;
        if from.is_terminal() {
            return false;
        }

        info.status = to;
        if from == TaskStatus::Running {
            self.running -= 1;
        }
        if to == TaskStatus::Running {
            self.running += 1;
            info.attempts += 1;
        }
        if to != TaskStatus::Ready {
            self.phases.remove(id);
        }
        if to.is_terminal() {
            self.unfinished -= 1;
        }

        debug!(task = %id, ?from, ?to, "task status changed");
        true
    }

    /// Move a task into `Ready` (or keep it there) with the given phase.
    pub fn set_ready(&mut self, id: &TaskId, phase: ReadyPhase) {
        if self.transition(id, TaskStatus::Ready) {
            self.phases.insert(id.clone(), phase);
            if phase == ReadyPhase::Queued {
                self.dispatch_queue.push_back(id.clone());
            }
        }
    }

    /// Tasks whose in-degree is zero at the start of a run, in graph order.
    pub fn initial_ready(&self, graph: &TaskGraph) -> Vec<TaskId> {
        graph
            .tasks()
            .filter(|id| {
                self.infos
                    .get(*id)
                    .is_some_and(|i| i.status == TaskStatus::Pending && i.remaining_deps == 0)
            })
            .cloned()
            .collect()
    }

    /// Record that `id` reached `Done` or `Skipped` and release dependents.
    ///
    /// Returns the dependents whose last outstanding dependency this was.
    pub fn mark_satisfied(
        &mut self,
        graph: &TaskGraph,
        id: &TaskId,
        status: TaskStatus,
    ) -> Vec<TaskId> {
        debug_assert!(status.satisfies_dependents());
        if !self.transition(id, status) {
            return Vec::new();
        }

        let mut newly_ready = Vec::new();
        for dependent in graph.dependents_of(id) {
            if let Some(info) = self.infos.get_mut(dependent) {
                if info.status != TaskStatus::Pending {
                    continue;
                }
                info.remaining_deps = info.remaining_deps.saturating_sub(1);
                if info.remaining_deps == 0 {
                    newly_ready.push(dependent.clone());
                }
            }
        }
        newly_ready
    }

    /// Mark `failed` as `Failed` and cascade to every transitive dependent
    /// that has not reached a terminal status yet.
    ///
    /// Returns all tasks newly marked failed, starting with `failed` itself.
    pub fn mark_failed(
        &mut self,
        graph: &TaskGraph,
        failed: &TaskId,
        error: TaskError,
    ) -> Vec<TaskId> {
        if !self.transition(failed, TaskStatus::Failed) {
            return Vec::new();
        }
        if let Some(info) = self.infos.get_mut(failed) {
            info.error = Some(error);
        }

        let mut newly_failed = vec![failed.clone()];
        let mut queue: VecDeque<TaskId> = graph.dependents_of(failed).iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            let Some(status) = self.status_of(&id) else {
                continue;
            };
            if status.is_terminal() {
                continue;
            }
            self.transition(&id, TaskStatus::Failed);
            if let Some(info) = self.infos.get_mut(&id) {
                info.error = Some(TaskError::UpstreamFailed(failed.clone()));
            }
            debug!(task = %id, upstream = %failed, "failing dependent of failed task");
            newly_failed.push(id.clone());
            queue.extend(graph.dependents_of(&id).iter().cloned());
        }

        newly_failed
    }

    /// Pop queued tasks while fewer than `limit` are running, marking them
    /// `Running`.
    pub fn take_dispatchable(&mut self, limit: usize) -> Vec<TaskId> {
        let mut taken = Vec::new();
        while self.running < limit {
            let Some(id) = self.dispatch_queue.pop_front() else {
                break;
            };
            // Entries can go stale if the task was cancelled while queued.
            if self.phase_of(&id) != Some(ReadyPhase::Queued) {
                continue;
            }
            self.transition(&id, TaskStatus::Running);
            taken.push(id);
        }
        taken
    }

    /// Record the error of the latest attempt without changing status.
    pub fn record_error(&mut self, id: &TaskId, error: TaskError) {
        if let Some(info) = self.infos.get_mut(id) {
            info.error = Some(error);
        }
    }

    /// Count a failed attempt and return the total so far.
    pub fn record_failure(&mut self, id: &TaskId) -> u32 {
        match self.infos.get_mut(id) {
            Some(info) => {
                info.failures += 1;
                info.failures
            }
            None => 0,
        }
    }

    pub fn add_elapsed(&mut self, id: &TaskId, elapsed_ms: u64) {
        if let Some(info) = self.infos.get_mut(id) {
            info.elapsed_ms = info.elapsed_ms.saturating_add(elapsed_ms);
        }
    }

    /// Cancel every non-terminal task whose status is in `which`.
    pub fn cancel_where(&mut self, which: impl Fn(TaskStatus) -> bool) -> Vec<TaskId> {
        let targets: Vec<TaskId> = self
            .infos
            .iter()
            .filter(|(_, info)| !info.status.is_terminal() && which(info.status))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &targets {
            self.transition(id, TaskStatus::Cancelled);
            self.record_error(id, TaskError::Cancelled);
        }
        self.dispatch_queue.clear();
        targets
    }
}
