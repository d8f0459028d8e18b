// tests/integration_cancel_behaviour.rs

mod common;
use crate::common::{
    MemoryStore, RunStats, build, edges, init_tracing, node, node_id, node_kind, registry_of,
    with_timeout,
};

use std::error::Error;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use saltdag::dag::TaskStatus;
use saltdag::engine::{CancelPolicy, RuntimeOptions};
use saltdag::{RunOptions, prepare_runtime};

type TestResult = Result<(), Box<dyn Error>>;

fn options(policy: CancelPolicy, timeout: Option<Duration>) -> RunOptions {
    RunOptions {
        concurrency: 2,
        runtime: RuntimeOptions {
            cancel_policy: policy,
            timeout,
        },
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn drain_waits_for_running_task_and_cancels_the_rest() -> TestResult {
    init_tracing();

    // slow -> after
    let store = MemoryStore::new();
    let stats = RunStats::shared();
    let kind = node_kind(&store, edges(&[("slow", &[]), ("after", &["slow"])]))
        .delay(Duration::from_millis(300))
        .stats(stats.clone());
    let registry = registry_of(kind);
    let graph = build(&registry, &[node("after")]);

    let runtime = prepare_runtime(graph, options(CancelPolicy::Drain, None));
    let handle = runtime.handle();
    let run = tokio::spawn(runtime.run());

    sleep(Duration::from_millis(100)).await;
    assert!(handle.cancel().await);

    let report = with_timeout(run).await??;

    assert!(report.cancelled);
    assert!(report.all_succeeded());
    assert_eq!(report.status_of(&node_id("slow")), Some(TaskStatus::Done));
    assert_eq!(report.status_of(&node_id("after")), Some(TaskStatus::Cancelled));
    assert_eq!(stats.runs_of(node_id("after").as_str()), 0);

    // The run is over; further cancellation requests go nowhere.
    assert!(!handle.cancel().await);

    Ok(())
}

#[tokio::test]
async fn abort_stops_running_task_promptly() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let kind = node_kind(&store, edges(&[("slow", &[]), ("after", &["slow"])]))
        .delay(Duration::from_secs(30));
    let registry = registry_of(kind);
    let graph = build(&registry, &[node("after")]);

    let runtime = prepare_runtime(graph, options(CancelPolicy::Abort, None));
    let handle = runtime.handle();
    let run = tokio::spawn(runtime.run());

    sleep(Duration::from_millis(100)).await;
    let cancelled_at = Instant::now();
    assert!(handle.try_cancel());

    let report = with_timeout(run).await??;

    assert!(cancelled_at.elapsed() < Duration::from_secs(2));
    assert!(report.cancelled);
    assert_eq!(report.status_of(&node_id("slow")), Some(TaskStatus::Cancelled));
    assert_eq!(report.status_of(&node_id("after")), Some(TaskStatus::Cancelled));
    assert_eq!(report.tasks[&node_id("slow")].attempts, 1);
    assert!(store.is_empty());

    Ok(())
}

#[tokio::test]
async fn timeout_cancels_the_run() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let registry = registry_of(
        node_kind(&store, edges(&[("fast", &[]), ("slow", &[])]))
            .delay(Duration::from_millis(50)),
    );

    // Both finish well within the timeout.
    let graph = build(&registry, &[node("fast"), node("slow")]);
    let report = with_timeout(
        prepare_runtime(
            graph,
            options(CancelPolicy::Abort, Some(Duration::from_secs(3))),
        )
        .run(),
    )
    .await?;
    assert!(!report.cancelled);
    assert_eq!(report.counts().done, 2);

    // A body that outlives the timeout is aborted.
    let store = MemoryStore::new();
    let registry = registry_of(
        node_kind(&store, edges(&[("stuck", &[])])).delay(Duration::from_secs(30)),
    );
    let graph = build(&registry, &[node("stuck")]);
    let report = with_timeout(
        prepare_runtime(
            graph,
            options(CancelPolicy::Abort, Some(Duration::from_millis(100))),
        )
        .run(),
    )
    .await?;

    assert!(report.cancelled);
    assert_eq!(report.status_of(&node_id("stuck")), Some(TaskStatus::Cancelled));

    Ok(())
}

#[tokio::test]
async fn cancel_before_dispatch_runs_nothing() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let stats = RunStats::shared();
    let kind = node_kind(&store, edges(&[("a", &[]), ("b", &[])])).stats(stats.clone());
    let registry = registry_of(kind);
    let graph = build(&registry, &[node("a"), node("b")]);

    let runtime = prepare_runtime(graph, options(CancelPolicy::Drain, None));
    // Queued ahead of the start: the first event the loop sees.
    assert!(runtime.handle().try_cancel());
    let report = with_timeout(runtime.run()).await?;

    assert!(report.cancelled);
    assert_eq!(report.counts().cancelled, 2);
    assert_eq!(stats.total_runs(), 0);

    Ok(())
}

#[tokio::test]
async fn unrepresentable_timeout_never_fires() -> TestResult {
    init_tracing();

    let store = MemoryStore::new();
    let registry = registry_of(node_kind(&store, edges(&[("a", &[]), ("b", &["a"])])));
    let graph = build(&registry, &[node("b")]);

    let report = with_timeout(
        prepare_runtime(graph, options(CancelPolicy::Drain, Some(Duration::MAX))).run(),
    )
    .await?;

    assert!(!report.cancelled);
    assert_eq!(report.counts().done, 2);

    Ok(())
}
