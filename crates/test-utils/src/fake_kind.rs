//! In-memory task kinds and targets for driving the real worker pool in
//! tests without touching the filesystem or spawning processes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use saltdag::errors::{Result, TaskError};
use saltdag::task::{
    BoxFuture, Params, Target, TargetError, TaskContext, TaskId, TaskKind, TaskRequest,
};

/// Shared set of "existing" outputs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    existing: HashSet<String>,
    /// Key -> number of upcoming `exists` calls that should fault.
    faults: HashMap<String, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str) {
        self.inner.lock().unwrap().existing.insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().existing.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().existing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `times` existence checks of `key` fail.
    pub fn fault(&self, key: &str, times: u32) {
        self.inner
            .lock()
            .unwrap()
            .faults
            .insert(key.to_string(), times);
    }

    pub fn target(&self, key: impl Into<String>) -> MemoryTarget {
        MemoryTarget {
            key: key.into(),
            store: self.clone(),
        }
    }
}

/// A target backed by a [`MemoryStore`] entry.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    key: String,
    store: MemoryStore,
}

impl MemoryTarget {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Target for MemoryTarget {
    fn exists(&self) -> std::result::Result<bool, TargetError> {
        let mut inner = self.store.inner.lock().unwrap();
        if let Some(remaining) = inner.faults.get_mut(&self.key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TargetError::Unavailable(format!(
                    "store unavailable for {}",
                    self.key
                )));
            }
        }
        Ok(inner.existing.contains(&self.key))
    }

    fn description(&self) -> String {
        format!("mem://{}", self.key)
    }
}

/// What a [`ScriptedKind`] body does on a given attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Write the output and succeed.
    Succeed,
    /// Succeed without writing the output.
    SucceedWithoutOutput,
    Fail(String),
    Panic,
}

type RequiresFn = dyn Fn(&Params) -> Vec<TaskRequest> + Send + Sync;
type ScriptFn = dyn Fn(&TaskContext) -> Step + Send + Sync;

/// Counters shared by every execution of one or more scripted kinds.
#[derive(Debug, Default)]
pub struct RunStats {
    runs: Mutex<HashMap<TaskId, u32>>,
    order: Mutex<Vec<TaskId>>,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl RunStats {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of times the body of `id` started.
    pub fn runs_of(&self, id: &str) -> u32 {
        self.runs
            .lock()
            .unwrap()
            .get(&TaskId::from_canonical(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_runs(&self) -> u32 {
        self.runs.lock().unwrap().values().sum()
    }

    /// Task ids in the order their bodies started.
    pub fn start_order(&self) -> Vec<TaskId> {
        self.order.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>, id: &TaskId) -> ConcurrencyGuard {
        *self.runs.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
        self.order.lock().unwrap().push(id.clone());
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        ConcurrencyGuard {
            stats: Arc::clone(self),
        }
    }
}

/// Decrements the in-flight counter even if the body panics or is aborted.
struct ConcurrencyGuard {
    stats: Arc<RunStats>,
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.stats.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A task kind whose dependencies and outcomes are closures.
///
/// Outputs live in a [`MemoryStore`] under `"<task id>@<salt>"`.
pub struct ScriptedKind {
    name: String,
    version: String,
    insignificant: Vec<String>,
    store: MemoryStore,
    stats: Arc<RunStats>,
    delay: Duration,
    requires: Arc<RequiresFn>,
    script: Arc<ScriptFn>,
}

impl fmt::Debug for ScriptedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedKind")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ScriptedKind {
    pub fn new(name: &str, store: &MemoryStore) -> Self {
        Self {
            name: name.to_string(),
            version: "0".to_string(),
            insignificant: Vec::new(),
            store: store.clone(),
            stats: RunStats::shared(),
            delay: Duration::ZERO,
            requires: Arc::new(|_| Vec::new()),
            script: Arc::new(|_| Step::Succeed),
        }
    }

    pub fn requires<F>(mut self, f: F) -> Self
    where
        F: Fn(&Params) -> Vec<TaskRequest> + Send + Sync + 'static,
    {
        self.requires = Arc::new(f);
        self
    }

    pub fn script<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskContext) -> Step + Send + Sync + 'static,
    {
        self.script = Arc::new(f);
        self
    }

    /// Always take `step`.
    pub fn always(self, step: Step) -> Self {
        self.script(move |_| step.clone())
    }

    /// Fail the first `n` attempts, then succeed.
    pub fn fail_first(self, n: u32) -> Self {
        self.script(move |ctx| {
            if ctx.attempt <= n {
                Step::Fail(format!("attempt {} failed", ctx.attempt))
            } else {
                Step::Succeed
            }
        })
    }

    /// Sleep this long inside the body before taking the scripted step.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn insignificant(mut self, param: &str) -> Self {
        self.insignificant.push(param.to_string());
        self
    }

    pub fn stats(mut self, stats: Arc<RunStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn into_arc(self) -> Arc<dyn TaskKind> {
        Arc::new(self)
    }

    /// Store key of the output for `params` under `salt`.
    pub fn output_key(&self, params: &Params, salt: &str) -> String {
        format!("{}@{}", TaskId::new(self, params), salt)
    }
}

impl TaskKind for ScriptedKind {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn is_significant(&self, param: &str) -> bool {
        !self.insignificant.iter().any(|p| p == param)
    }

    fn requires(&self, params: &Params) -> Result<Vec<TaskRequest>> {
        Ok((self.requires)(params))
    }

    fn output(&self, params: &Params, salt: &str) -> Result<Arc<dyn Target>> {
        Ok(Arc::new(self.store.target(self.output_key(params, salt))))
    }

    fn run<'a>(&'a self, ctx: TaskContext) -> BoxFuture<'a, std::result::Result<(), TaskError>> {
        Box::pin(async move {
            let _guard = self.stats.enter(&ctx.id);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match (self.script)(&ctx) {
                Step::Succeed => {
                    self.store.insert(&self.output_key(&ctx.params, &ctx.salt));
                    Ok(())
                }
                Step::SucceedWithoutOutput => Ok(()),
                Step::Fail(msg) => Err(TaskError::Execution(msg)),
                Step::Panic => panic!("scripted panic in {}", ctx.id),
            }
        })
    }
}
