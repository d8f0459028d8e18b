// tests/runtime_fake_executor.rs

mod common;
use crate::common::{
    FakeExecutor, MemoryStore, build_shared, edges, init_tracing, node, node_id, node_kind,
    output_key, registry_of,
};

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use saltdag::dag::{Scheduler, TaskGraph, TaskStatus};
use saltdag::engine::{CoreRuntime, RetryPolicy, Runtime, RuntimeEvent, RuntimeOptions};
use saltdag::report::RunReport;
use saltdag::task::TaskId;

type TestResult = Result<(), Box<dyn Error>>;

/// Very simple chain: a -> b -> c
fn simple_chain(store: &MemoryStore) -> Arc<TaskGraph> {
    let registry = registry_of(node_kind(
        store,
        edges(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]),
    ));
    build_shared(&registry, &[node("c")])
}

async fn run_with(
    graph: Arc<TaskGraph>,
    make_executor: impl FnOnce(mpsc::Sender<RuntimeEvent>) -> FakeExecutor,
) -> Result<RunReport, Box<dyn Error>> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = make_executor(rt_tx.clone());

    let scheduler = Scheduler::new(graph, 2, RetryPolicy::none());
    let core = CoreRuntime::new(scheduler, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_tx, rt_rx, executor);

    // Enforce an upper bound on how long this test may run.
    match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    }
}

#[tokio::test]
async fn runtime_with_fake_executor_runs_simple_chain() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let report = run_with(simple_chain(&store), |tx| {
        FakeExecutor::new(tx, executed.clone())
    })
    .await?;

    let tasks_run = executed.lock().unwrap().clone();
    assert_eq!(tasks_run, vec![node_id("a"), node_id("b"), node_id("c")]);
    assert!(report.all_succeeded());
    assert!(!report.cancelled);
    assert_eq!(report.counts().done, 3);

    Ok(())
}

#[tokio::test]
async fn runtime_skips_tasks_whose_outputs_exist() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let graph = simple_chain(&store);
    store.insert(&output_key(&graph, &node_id("a")));
    store.insert(&output_key(&graph, &node_id("b")));

    let executed = Arc::new(Mutex::new(Vec::new()));
    let report = run_with(graph, |tx| FakeExecutor::new(tx, executed.clone())).await?;

    assert_eq!(executed.lock().unwrap().clone(), vec![node_id("c")]);
    assert_eq!(report.status_of(&node_id("a")), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of(&node_id("b")), Some(TaskStatus::Skipped));
    assert_eq!(report.status_of(&node_id("c")), Some(TaskStatus::Done));

    Ok(())
}

#[tokio::test]
async fn runtime_fails_dependents_of_a_failed_task() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let executed = Arc::new(Mutex::new(Vec::new()));
    let failing = node_id("b");
    let report = run_with(simple_chain(&store), |tx| {
        FakeExecutor::new(tx, executed.clone()).failing(failing.as_str())
    })
    .await?;

    assert_eq!(
        executed.lock().unwrap().clone(),
        vec![node_id("a"), node_id("b")]
    );
    assert!(!report.all_succeeded());
    assert_eq!(report.status_of(&node_id("a")), Some(TaskStatus::Done));
    assert_eq!(report.status_of(&node_id("b")), Some(TaskStatus::Failed));
    assert_eq!(report.status_of(&node_id("c")), Some(TaskStatus::Failed));

    let failed: Vec<&TaskId> = report.failed().map(|(id, _)| id).collect();
    assert_eq!(failed.len(), 2);

    Ok(())
}

#[tokio::test]
async fn empty_graph_finishes_immediately() -> TestResult {
    init_tracing();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let report = run_with(Arc::new(TaskGraph::default()), |tx| {
        FakeExecutor::new(tx, executed.clone())
    })
    .await?;

    assert!(report.tasks.is_empty());
    assert!(report.all_succeeded());
    assert!(executed.lock().unwrap().is_empty());

    Ok(())
}
