// src/dag/builder.rs

//! Graph construction from root task requests.
//!
//! Walks `TaskKind::requires` from every root with an iterative
//! colour-marking DFS: each identity is `Visiting` while its dependencies are
//! being resolved and `Done` once its node has been materialized. Reaching a
//! `Visiting` identity again means the declarations form a cycle.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info};

use crate::dag::graph::TaskGraph;
use crate::errors::{Result, SaltdagError};
use crate::task::params::render_params;
use crate::task::salt::salted_version;
use crate::task::{Params, Registry, Task, TaskId, TaskKind, TaskRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// A node whose dependencies are still being resolved.
struct Frame {
    id: TaskId,
    kind: Arc<dyn TaskKind>,
    params: Params,
    /// Dependency requests not visited yet.
    pending: std::vec::IntoIter<TaskRequest>,
    /// Resolved dependency ids, deduplicated, in declaration order.
    deps: Vec<TaskId>,
}

/// Mutable traversal state for a single `build` call.
#[derive(Default)]
struct BuildState {
    marks: HashMap<TaskId, Mark>,
    /// Materialized tasks, indexed by identity.
    index: HashMap<TaskId, Arc<Task>>,
    /// Materialized tasks in post-order.
    ordered: Vec<Arc<Task>>,
    /// Identities on the current DFS path, outermost first.
    path: Vec<TaskId>,
}

/// Resolves root requests into a [`TaskGraph`] using a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> GraphBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Build the full graph reachable from `roots`.
    ///
    /// Fails with [`SaltdagError::Cycle`], [`SaltdagError::ParameterConflict`]
    /// or [`SaltdagError::UnknownKind`]; no partial graph is returned.
    pub fn build(&self, roots: &[TaskRequest]) -> Result<TaskGraph> {
        let mut state = BuildState::default();
        let mut root_ids: Vec<TaskId> = Vec::new();

        for request in roots {
            let id = self.visit(request, &mut state)?;
            if !root_ids.contains(&id) {
                root_ids.push(id);
            }
        }

        info!(
            tasks = state.ordered.len(),
            roots = root_ids.len(),
            "task graph built"
        );

        Ok(TaskGraph::from_ordered(state.ordered, root_ids))
    }

    /// Resolve `root` and everything it transitively requires.
    ///
    /// The walk keeps its own frame stack instead of recursing, so chain
    /// depth is bounded by memory rather than by the thread's stack.
    fn visit(&self, root: &TaskRequest, state: &mut BuildState) -> Result<TaskId> {
        let mut stack: Vec<Frame> = Vec::new();
        if let Some(id) = self.enter(root, state, &mut stack)? {
            return Ok(id);
        }

        while let Some(frame) = stack.last_mut() {
            let resolved = match frame.pending.next() {
                Some(dep_request) => match self.enter(&dep_request, state, &mut stack)? {
                    Some(dep_id) => dep_id,
                    None => continue,
                },
                None => {
                    let Some(frame) = stack.pop() else { break };
                    let id = self.materialize(frame, state)?;
                    if stack.is_empty() {
                        return Ok(id);
                    }
                    id
                }
            };

            if let Some(parent) = stack.last_mut() {
                if !parent.deps.contains(&resolved) {
                    parent.deps.push(resolved);
                }
            }
        }

        Err(SaltdagError::Other(anyhow!(
            "graph walk for {} ended without resolving it",
            root.kind
        )))
    }

    /// Look `request` up. Returns its id if the node already exists,
    /// otherwise opens a frame for it and returns `None`.
    fn enter(
        &self,
        request: &TaskRequest,
        state: &mut BuildState,
        stack: &mut Vec<Frame>,
    ) -> Result<Option<TaskId>> {
        let kind = self.registry.get(&request.kind)?;
        let id = TaskId::new(kind.as_ref(), &request.params);

        match state.marks.get(&id) {
            Some(Mark::Visiting) => {
                let start = state.path.iter().position(|p| p == &id).unwrap_or(0);
                let mut path: Vec<TaskId> = state.path[start..].to_vec();
                path.push(id);
                return Err(SaltdagError::Cycle { path });
            }
            Some(Mark::Done) => {
                if let Some(existing) = state.index.get(&id) {
                    ensure_same_params(&id, &existing.params, &request.params)?;
                }
                return Ok(Some(id));
            }
            None => {}
        }

        state.marks.insert(id.clone(), Mark::Visiting);
        state.path.push(id.clone());
        let pending = kind.requires(&request.params)?;

        stack.push(Frame {
            id,
            kind,
            params: request.params.clone(),
            pending: pending.into_iter(),
            deps: Vec::new(),
        });
        Ok(None)
    }

    /// Turn a frame whose dependencies are all resolved into a task node.
    fn materialize(&self, frame: Frame, state: &mut BuildState) -> Result<TaskId> {
        let Frame {
            id,
            kind,
            params,
            deps,
            ..
        } = frame;

        let dep_salts: Vec<&str> = deps
            .iter()
            .filter_map(|d| state.index.get(d).map(|t| t.salt.as_str()))
            .collect();
        let salt = salted_version(kind.as_ref(), &params, &dep_salts);
        let output = kind.output(&params, &salt)?;

        debug!(
            task = %id,
            salt = %salt,
            target = %output.description(),
            deps = deps.len(),
            "registered task"
        );

        let task = Arc::new(Task {
            id: id.clone(),
            kind,
            params,
            salt,
            output,
            deps,
        });

        state.path.pop();
        state.marks.insert(id.clone(), Mark::Done);
        state.index.insert(id.clone(), Arc::clone(&task));
        state.ordered.push(task);

        Ok(id)
    }
}

/// Compares canonical renderings rather than values, so a float such as
/// `NaN` matches itself the same way it does in identities and salts.
fn ensure_same_params(id: &TaskId, existing: &Params, requested: &Params) -> Result<()> {
    let existing = render_params(existing);
    let requested = render_params(requested);
    if existing == requested {
        return Ok(());
    }
    Err(SaltdagError::ParameterConflict {
        id: id.clone(),
        existing,
        requested,
    })
}
