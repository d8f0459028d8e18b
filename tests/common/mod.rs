#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use saltdag::dag::{GraphBuilder, TaskGraph};
use saltdag::task::{ParamValue, Registry, TaskContext, TaskId, TaskRequest};

pub use saltdag_test_utils::builders;
pub use saltdag_test_utils::fake_executor::FakeExecutor;
pub use saltdag_test_utils::fake_kind::{MemoryStore, RunStats, ScriptedKind, Step};
pub use saltdag_test_utils::{init_tracing, with_timeout};

/// Kind name used by the adjacency-driven test graphs.
pub const NODE: &str = "node";

/// Request for the node called `name`.
pub fn node(name: &str) -> TaskRequest {
    TaskRequest::new(NODE).param("name", name)
}

/// Canonical id of the node called `name`.
pub fn node_id(name: &str) -> TaskId {
    TaskId::from_canonical(format!("node(name={name:?})"))
}

/// Name param of a running node.
pub fn name_of(ctx: &TaskContext) -> String {
    match ctx.params.get("name") {
        Some(ParamValue::Str(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Adjacency map from `(node, deps)` pairs.
pub fn edges(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
        .collect()
}

/// A scripted `node` kind whose dependencies follow `adjacency`.
pub fn node_kind(store: &MemoryStore, adjacency: HashMap<String, Vec<String>>) -> ScriptedKind {
    ScriptedKind::new(NODE, store).requires(move |params| {
        let Some(ParamValue::Str(name)) = params.get("name") else {
            return Vec::new();
        };
        adjacency
            .get(name)
            .map(|deps| deps.iter().map(|d| node(d)).collect())
            .unwrap_or_default()
    })
}

pub fn registry_of(kind: ScriptedKind) -> Registry {
    Registry::new().with(kind.into_arc())
}

pub fn build(registry: &Registry, roots: &[TaskRequest]) -> TaskGraph {
    GraphBuilder::new(registry)
        .build(roots)
        .expect("graph should build")
}

pub fn build_shared(registry: &Registry, roots: &[TaskRequest]) -> Arc<TaskGraph> {
    Arc::new(build(registry, roots))
}

/// Store key behind the output target of `id` in `graph`.
pub fn output_key(graph: &TaskGraph, id: &TaskId) -> String {
    let task = graph.task(id).expect("task in graph");
    task.output
        .description()
        .trim_start_matches("mem://")
        .to_string()
}
