// tests/graph_builder.rs

mod common;
use crate::common::{
    MemoryStore, NODE, ScriptedKind, build, edges, init_tracing, node, node_id, node_kind,
    registry_of,
};

use std::collections::HashMap;

use saltdag::dag::GraphBuilder;
use saltdag::errors::SaltdagError;
use saltdag::task::{Registry, TaskId, TaskRequest};

#[test]
fn shared_dependency_is_materialized_once() {
    init_tracing();

    // d -> {b, c}, b -> a, c -> a
    let store = MemoryStore::new();
    let adjacency = edges(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
    let registry = registry_of(node_kind(&store, adjacency));

    let graph = build(&registry, &[node("d")]);

    assert_eq!(graph.len(), 4);
    assert_eq!(graph.dependents_of(&node_id("a")).len(), 2);
    assert_eq!(
        graph.dependencies_of(&node_id("d")),
        &[node_id("b"), node_id("c")]
    );
    assert_eq!(graph.roots(), &[node_id("d")]);
}

#[test]
fn duplicate_dependency_declarations_collapse() {
    let store = MemoryStore::new();
    let adjacency = edges(&[("a", &[]), ("b", &["a", "a"])]);
    let registry = registry_of(node_kind(&store, adjacency));

    let graph = build(&registry, &[node("b"), node("b"), node("a")]);

    assert_eq!(graph.len(), 2);
    assert_eq!(graph.dependencies_of(&node_id("b")), &[node_id("a")]);
    assert_eq!(graph.roots(), &[node_id("b"), node_id("a")]);
}

#[test]
fn cycle_is_reported_with_its_path() {
    let store = MemoryStore::new();
    let adjacency = edges(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);
    let registry = registry_of(node_kind(&store, adjacency));

    let result = GraphBuilder::new(&registry).build(&[node("a")]);

    match result {
        Err(SaltdagError::Cycle { path }) => {
            assert_eq!(
                path,
                vec![node_id("a"), node_id("b"), node_id("c"), node_id("a")]
            );
        }
        other => panic!("Expected Cycle error, got: {:?}", other),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let store = MemoryStore::new();
    let registry = registry_of(node_kind(&store, edges(&[("a", &["a"])])));

    let err = GraphBuilder::new(&registry)
        .build(&[node("a")])
        .unwrap_err();

    assert!(matches!(err, SaltdagError::Cycle { .. }));
    assert!(err.to_string().contains("node(name=\"a\") -> node(name=\"a\")"));
}

#[test]
fn unknown_kind_fails_the_build() {
    let store = MemoryStore::new();
    let registry = registry_of(
        ScriptedKind::new("parent", &store).requires(|_| vec![TaskRequest::new("missing")]),
    );

    let err = GraphBuilder::new(&registry)
        .build(&[TaskRequest::new("parent")])
        .unwrap_err();

    match err {
        SaltdagError::UnknownKind(name) => assert_eq!(name, "missing"),
        other => panic!("Expected UnknownKind, got: {:?}", other),
    }
}

#[test]
fn insignificant_params_do_not_change_identity() {
    let store = MemoryStore::new();
    let kind = ScriptedKind::new("report", &store).insignificant("verbose");
    let registry = registry_of(kind);

    let graph = build(
        &registry,
        &[TaskRequest::new("report")
            .param("day", 3i64)
            .param("verbose", true)],
    );

    let id = TaskId::from_canonical("report(day=3)");
    assert!(graph.contains(&id));
}

#[test]
fn same_identity_with_different_params_conflicts() {
    let store = MemoryStore::new();
    let registry = registry_of(ScriptedKind::new("report", &store).insignificant("verbose"));

    let err = GraphBuilder::new(&registry)
        .build(&[
            TaskRequest::new("report")
                .param("day", 3i64)
                .param("verbose", true),
            TaskRequest::new("report")
                .param("day", 3i64)
                .param("verbose", false),
        ])
        .unwrap_err();

    match err {
        SaltdagError::ParameterConflict {
            id,
            existing,
            requested,
        } => {
            assert_eq!(id.as_str(), "report(day=3)");
            assert!(existing.contains("verbose=true"));
            assert!(requested.contains("verbose=false"));
        }
        other => panic!("Expected ParameterConflict, got: {:?}", other),
    }
}

#[test]
fn upstream_version_change_changes_downstream_salt() {
    let store = MemoryStore::new();

    let registry_for = |version: &str| {
        Registry::new()
            .with(ScriptedKind::new("raw", &store).version(version).into_arc())
            .with(
                ScriptedKind::new("clean", &store)
                    .requires(|_| vec![TaskRequest::new("raw")])
                    .into_arc(),
            )
    };

    let v0 = build(&registry_for("0"), &[TaskRequest::new("clean")]);
    let v1 = build(&registry_for("1"), &[TaskRequest::new("clean")]);

    let clean = TaskId::from_canonical("clean()");
    let salt0 = &v0.task(&clean).unwrap().salt;
    let salt1 = &v1.task(&clean).unwrap().salt;

    assert_eq!(salt0.len(), 10);
    assert_ne!(salt0, salt1);
    assert_ne!(
        v0.task(&clean).unwrap().output.description(),
        v1.task(&clean).unwrap().output.description()
    );
}

#[test]
fn salts_are_stable_across_builds() {
    let store = MemoryStore::new();
    let adjacency = edges(&[("a", &[]), ("b", &["a"])]);
    let registry = registry_of(node_kind(&store, adjacency));

    let first = build(&registry, &[node("b")]);
    let second = build(&registry, &[node("b")]);

    for id in first.tasks() {
        assert_eq!(first.task(id).unwrap().salt, second.task(id).unwrap().salt);
    }
}

#[test]
fn topological_order_puts_dependencies_first() {
    let store = MemoryStore::new();
    let adjacency = edges(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &["a", "c"])]);
    let registry = registry_of(node_kind(&store, adjacency));
    let graph = build(&registry, &[node("d")]);

    let order = graph.topological_order().unwrap();
    let pos = |name: &str| order.iter().position(|id| *id == node_id(name)).unwrap();

    assert_eq!(order.len(), 4);
    assert!(pos("a") < pos("b"));
    assert!(pos("b") < pos("c"));
    assert!(pos("c") < pos("d"));
    assert_eq!(graph.task(&node_id("d")).unwrap().kind_name(), NODE);
}

#[test]
fn long_dependency_chain_builds_without_deep_recursion() {
    const LEN: usize = 10_000;

    let store = MemoryStore::new();
    let adjacency: HashMap<String, Vec<String>> = (0..LEN)
        .map(|i| {
            let deps = if i == 0 {
                Vec::new()
            } else {
                vec![format!("t{}", i - 1)]
            };
            (format!("t{i}"), deps)
        })
        .collect();
    let registry = registry_of(node_kind(&store, adjacency));

    let tail = format!("t{}", LEN - 1);
    let graph = build(&registry, &[node(&tail)]);

    assert_eq!(graph.len(), LEN);
    assert_eq!(graph.roots(), &[node_id(&tail)]);
    assert_eq!(graph.tasks().next(), Some(&node_id("t0")));
    assert_eq!(graph.dependencies_of(&node_id("t1")), &[node_id("t0")]);
    assert_eq!(graph.topological_order().unwrap().len(), LEN);
}

#[test]
fn long_cycle_is_still_reported_with_its_path() {
    const LEN: usize = 5_000;

    let store = MemoryStore::new();
    let adjacency: HashMap<String, Vec<String>> = (0..LEN)
        .map(|i| (format!("t{i}"), vec![format!("t{}", (i + 1) % LEN)]))
        .collect();
    let registry = registry_of(node_kind(&store, adjacency));

    match GraphBuilder::new(&registry).build(&[node("t0")]) {
        Err(SaltdagError::Cycle { path }) => {
            assert_eq!(path.len(), LEN + 1);
            assert_eq!(path.first(), Some(&node_id("t0")));
            assert_eq!(path.last(), Some(&node_id("t0")));
        }
        other => panic!("Expected Cycle error, got: {:?}", other.map(|g| g.len())),
    }
}

#[test]
fn nan_param_requested_twice_is_one_task() {
    let store = MemoryStore::new();
    let registry = Registry::new()
        .with(ScriptedKind::new("leaf", &store).into_arc())
        .with(
            ScriptedKind::new("left", &store)
                .requires(|_| vec![TaskRequest::new("leaf").param("x", f64::NAN)])
                .into_arc(),
        )
        .with(
            ScriptedKind::new("right", &store)
                .requires(|_| vec![TaskRequest::new("leaf").param("x", f64::NAN)])
                .into_arc(),
        );

    let graph = build(&registry, &[TaskRequest::new("left"), TaskRequest::new("right")]);

    assert_eq!(graph.len(), 3);
    assert!(graph.contains(&TaskId::from_canonical("leaf(x=NaN)")));
}
