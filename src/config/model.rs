// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::retry::{BackoffKind, RetryPolicy};
use crate::task::{Params, TaskRequest};
use crate::types::CancelPolicy;

/// Run manifest as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// workers = 4
///
/// [kind.fetch]
/// cmd = "curl -o {output} https://example.org/{name}"
/// output = "data/{name}-{salt}.json"
///
/// [[root]]
/// kind = "fetch"
/// params = { name = "a" }
/// ```
///
/// All sections except `[kind.*]` and at least one root are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawManifestFile {
    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Retry behaviour from `[retry]`.
    #[serde(default)]
    pub retry: RetrySection,

    /// Task kinds from `[kind.<name>]`.
    #[serde(default)]
    pub kind: BTreeMap<String, KindConfig>,

    /// Explicit root tasks from `[[root]]`.
    #[serde(default)]
    pub root: Vec<TaskRequest>,

    /// Chunked root tasks from `[[root_range]]`.
    #[serde(default)]
    pub root_range: Vec<RootRange>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of task bodies running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// `"drain"` (default) or `"abort"`.
    #[serde(default)]
    pub cancel_policy: CancelPolicy,

    /// Confirm after each successful body that the output exists.
    #[serde(default = "default_verify_outputs")]
    pub verify_outputs: bool,

    /// Cancel the run after this long (duration string, e.g. `"30m"`).
    #[serde(default)]
    pub timeout: Option<String>,
}

fn default_workers() -> usize {
    4
}

fn default_verify_outputs() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cancel_policy: CancelPolicy::default(),
            verify_outputs: default_verify_outputs(),
            timeout: None,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Total attempts per task including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Fixed delay, or the base delay for exponential backoff.
    #[serde(default = "default_delay")]
    pub delay: String,

    /// Upper bound for exponential backoff.
    #[serde(default = "default_max_delay")]
    pub max_delay: String,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_delay() -> String {
    "1s".to_string()
}

fn default_max_delay() -> String {
    "60s".to_string()
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            delay: default_delay(),
            max_delay: default_max_delay(),
        }
    }
}

/// `[kind.<name>]` section: a shell-command task kind.
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Command template, run with `sh -c`.
    pub cmd: String,

    /// Output path template. Without one the task has no target and always
    /// runs.
    #[serde(default)]
    pub output: Option<String>,

    /// Code version, part of the salt.
    #[serde(default = "default_version")]
    pub version: String,

    /// Parameters excluded from identity and salt.
    #[serde(default)]
    pub insignificant: Vec<String>,

    /// Write the output file as a success marker after the command exits 0.
    #[serde(default)]
    pub marker: bool,

    /// Dependency declarations.
    #[serde(default)]
    pub requires: Vec<RequireConfig>,
}

fn default_version() -> String {
    "0".to_string()
}

/// One entry of `requires = [...]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RequireConfig {
    pub kind: String,

    /// Literal params; string values may use `{param}` of the requiring task.
    #[serde(default)]
    pub params: Params,

    /// Parent params copied verbatim into the dependency.
    #[serde(default)]
    pub forward: Vec<String>,
}

/// `[[root_range]]`: one root per `[start, end)` chunk of width `step`.
#[derive(Debug, Clone, Deserialize)]
pub struct RootRange {
    pub kind: String,
    pub start: i64,
    pub end: i64,
    pub step: i64,

    /// Param receiving the chunk's lower bound.
    #[serde(default = "default_lower")]
    pub lower: String,

    /// Param receiving the chunk's (exclusive) upper bound.
    #[serde(default = "default_upper")]
    pub upper: String,

    /// Extra params shared by every chunk.
    #[serde(default)]
    pub params: Params,
}

fn default_lower() -> String {
    "lower".to_string()
}

fn default_upper() -> String {
    "upper".to_string()
}

impl RootRange {
    /// Expand into one request per chunk; the last chunk is clipped to `end`.
    pub fn expand(&self) -> Vec<TaskRequest> {
        let mut out = Vec::new();
        if self.step <= 0 {
            return out;
        }
        let mut lower = self.start;
        while lower < self.end {
            let upper = lower.saturating_add(self.step).min(self.end);
            let mut params = self.params.clone();
            params.insert(self.lower.clone(), lower.into());
            params.insert(self.upper.clone(), upper.into());
            out.push(TaskRequest {
                kind: self.kind.clone(),
                params,
            });
            lower = upper;
        }
        out
    }
}

/// Validated manifest.
///
/// Only obtainable through `TryFrom<RawManifestFile>`, so every kind named in
/// a root or requirement exists and all durations parsed.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    pub config: ConfigSection,
    pub kinds: BTreeMap<String, KindConfig>,
    retry: RetryPolicy,
    timeout: Option<Duration>,
    roots: Vec<TaskRequest>,
}

impl ManifestFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        kinds: BTreeMap<String, KindConfig>,
        retry: RetryPolicy,
        timeout: Option<Duration>,
        roots: Vec<TaskRequest>,
    ) -> Self {
        Self {
            config,
            kinds,
            retry,
            timeout,
            roots,
        }
    }

    /// Explicit roots followed by expanded range roots.
    pub fn roots(&self) -> &[TaskRequest] {
        &self.roots
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
