// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, SaltdagError};
use crate::task::{Task, TaskId};

/// Internal node structure: the task plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: Arc<Task>,
    /// Direct dependents: tasks that list this one as a dependency.
    dependents: Vec<TaskId>,
}

/// Fully materialized task graph keyed by [`TaskId`].
///
/// Only [`crate::dag::GraphBuilder`] creates these, so the graph is always
/// acyclic and every dependency edge points at a node that exists.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: HashMap<TaskId, DagNode>,
    /// Node ids in DFS post-order (every node after all of its dependencies).
    order: Vec<TaskId>,
    /// Distinct root ids in request order.
    roots: Vec<TaskId>,
}

impl TaskGraph {
    /// Assemble a graph from tasks given in dependency-first order.
    ///
    /// Dependents lists are derived here from each task's `deps`.
    pub(crate) fn from_ordered(tasks: Vec<Arc<Task>>, roots: Vec<TaskId>) -> Self {
        let mut nodes: HashMap<TaskId, DagNode> = HashMap::with_capacity(tasks.len());
        let mut order = Vec::with_capacity(tasks.len());

        for task in tasks {
            for dep in &task.deps {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(task.id.clone());
                }
            }
            order.push(task.id.clone());
            nodes.insert(
                task.id.clone(),
                DagNode {
                    task,
                    dependents: Vec::new(),
                },
            );
        }

        Self {
            nodes,
            order,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All task ids, dependencies before dependents.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskId> {
        self.order.iter()
    }

    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    pub fn task(&self, id: &TaskId) -> Option<&Arc<Task>> {
        self.nodes.get(id).map(|n| &n.task)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.task.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Number of direct dependencies (the initial in-degree used for readiness).
    pub fn in_degree(&self, id: &TaskId) -> usize {
        self.dependencies_of(id).len()
    }

    /// Topological order computed with petgraph.
    ///
    /// Edge direction: dep -> task. Fails with [`SaltdagError::Cycle`] if the
    /// graph somehow contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut graph: DiGraphMap<&TaskId, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id);
        }
        for id in &self.order {
            for dep in self.dependencies_of(id) {
                graph.add_edge(dep, id, ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().cloned().collect()),
            Err(cycle) => Err(SaltdagError::Cycle {
                path: vec![cycle.node_id().clone()],
            }),
        }
    }
}
