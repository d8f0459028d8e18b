// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod task;
pub mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ManifestFile;
use crate::dag::{GraphBuilder, Scheduler, TaskGraph};
use crate::engine::{
    CancelReason, CoreRuntime, RetryPolicy, Runtime, RuntimeEvent, RuntimeOptions,
};
use crate::errors::Result;
use crate::exec::{WorkerPool, command_registry};
use crate::report::RunReport;
use crate::task::{Registry, TaskRequest};

/// Capacity of the runtime event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything that shapes a run besides the graph itself.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Maximum number of task bodies running at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub runtime: RuntimeOptions,
    /// Confirm after each successful body that the output exists.
    pub verify_outputs: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            runtime: RuntimeOptions::default(),
            verify_outputs: true,
        }
    }
}

impl RunOptions {
    /// Options as declared in a manifest's `[config]` and `[retry]`.
    pub fn from_manifest(manifest: &ManifestFile) -> Self {
        Self {
            concurrency: manifest.config.workers,
            retry: manifest.retry_policy(),
            runtime: RuntimeOptions {
                cancel_policy: manifest.config.cancel_policy,
                timeout: manifest.timeout(),
            },
            verify_outputs: manifest.config.verify_outputs,
        }
    }

    /// Apply CLI overrides on top.
    pub fn with_cli_overrides(mut self, args: &CliArgs) -> Self {
        if let Some(workers) = args.workers {
            self.concurrency = usize::try_from(workers).unwrap_or(usize::MAX);
        }
        if let Some(policy) = args.cancel_policy {
            self.runtime.cancel_policy = policy;
        }
        if let Some(timeout) = args.timeout {
            self.runtime.timeout = Some(timeout);
        }
        self
    }
}

/// Resolve `roots` into a task graph.
pub fn build_graph(registry: &Registry, roots: &[TaskRequest]) -> Result<TaskGraph> {
    GraphBuilder::new(registry).build(roots)
}

/// Wire a runtime around `graph` backed by a [`WorkerPool`], without
/// starting it.
///
/// Use [`Runtime::handle`] on the result to cancel the run later.
pub fn prepare_runtime(graph: TaskGraph, options: RunOptions) -> Runtime<WorkerPool> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);
    let pool = WorkerPool::new(options.concurrency, rt_tx.clone(), options.verify_outputs);
    let scheduler = Scheduler::new(Arc::new(graph), options.concurrency, options.retry);
    let core = CoreRuntime::new(scheduler, options.runtime);
    Runtime::new(core, rt_tx, rt_rx, pool)
}

/// Execute `graph` to completion (or cancellation) and return its report.
pub async fn run_graph(graph: TaskGraph, options: RunOptions) -> Result<RunReport> {
    prepare_runtime(graph, options).run().await
}

/// Build the graph for `roots` and execute it.
pub async fn run_roots(
    registry: &Registry,
    roots: &[TaskRequest],
    options: RunOptions,
) -> Result<RunReport> {
    let graph = build_graph(registry, roots)?;
    run_graph(graph, options).await
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - graph construction
/// - scheduler / runtime / worker pool
/// - Ctrl-C handling
///
/// Returns `None` for a dry run.
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let manifest = load_and_validate(&args.manifest)?;
    let options = RunOptions::from_manifest(&manifest).with_cli_overrides(&args);
    let registry = command_registry(&manifest.kinds);
    let graph = build_graph(&registry, manifest.roots())?;

    if args.dry_run {
        print_dry_run(&graph, &options)?;
        return Ok(None);
    }

    let runtime = prepare_runtime(graph, options);

    // Ctrl-C → cancellation under the configured policy.
    {
        let handle = runtime.handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received");
            handle.cancel_with(CancelReason::Signal).await;
        });
    }

    let report = runtime.run().await?;

    print!("{report}");
    if report.cancelled {
        warn!("run was cancelled before every task finished");
    }
    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!(path = %path.display(), "run report written");
    }

    Ok(Some(report))
}

/// Process exit status for a finished invocation.
///
/// Non-zero exactly when the report says something failed. A dry run
/// (`None`) and a cancelled run with no failures both exit 0.
pub fn exit_code(report: Option<&RunReport>) -> i32 {
    match report {
        Some(r) if !r.all_succeeded() => 1,
        _ => 0,
    }
}

/// Dry-run output: tasks in execution order with their targets and deps.
fn print_dry_run(graph: &TaskGraph, options: &RunOptions) -> Result<()> {
    println!("saltdag dry-run");
    println!("  workers = {}", options.concurrency);
    println!("  cancel_policy = {:?}", options.runtime.cancel_policy);
    println!("  retry.max_attempts = {}", options.retry.max_attempts);
    if let Some(timeout) = options.runtime.timeout {
        println!("  timeout = {timeout:?}");
    }
    println!();

    println!("tasks ({}):", graph.len());
    for id in graph.topological_order()? {
        let Some(task) = graph.task(&id) else {
            continue;
        };
        println!("  - {id}");
        println!("      salt: {}", task.salt);
        println!("      target: {}", task.output.description());
        if !task.deps.is_empty() {
            let deps: Vec<_> = task.deps.iter().map(|d| d.as_str()).collect();
            println!("      deps: {:?}", deps);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
