#![allow(dead_code)]

use std::collections::BTreeMap;

use saltdag::config::{
    ConfigSection, KindConfig, ManifestFile, RawManifestFile, RequireConfig, RetrySection,
    RootRange,
};
use saltdag::task::{ParamValue, Params, TaskRequest};
use saltdag::types::CancelPolicy;

/// Builder for `ManifestFile` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifestFile,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifestFile {
                config: ConfigSection::default(),
                retry: RetrySection::default(),
                kind: BTreeMap::new(),
                root: Vec::new(),
                root_range: Vec::new(),
            },
        }
    }

    pub fn with_kind(mut self, name: &str, kind: KindConfig) -> Self {
        self.manifest.kind.insert(name.to_string(), kind);
        self
    }

    pub fn with_root(mut self, root: TaskRequest) -> Self {
        self.manifest.root.push(root);
        self
    }

    pub fn with_root_range(mut self, kind: &str, start: i64, end: i64, step: i64) -> Self {
        self.manifest.root_range.push(RootRange {
            kind: kind.to_string(),
            start,
            end,
            step,
            lower: "lower".to_string(),
            upper: "upper".to_string(),
            params: Params::new(),
        });
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.manifest.config.workers = n;
        self
    }

    pub fn cancel_policy(mut self, policy: CancelPolicy) -> Self {
        self.manifest.config.cancel_policy = policy;
        self
    }

    pub fn verify_outputs(mut self, val: bool) -> Self {
        self.manifest.config.verify_outputs = val;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.manifest.retry.max_attempts = n;
        self
    }

    pub fn raw(self) -> RawManifestFile {
        self.manifest
    }

    pub fn build(self) -> ManifestFile {
        ManifestFile::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `KindConfig`.
pub struct KindConfigBuilder {
    kind: KindConfig,
}

impl KindConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            kind: KindConfig {
                cmd: cmd.to_string(),
                output: None,
                version: "0".to_string(),
                insignificant: vec![],
                marker: false,
                requires: vec![],
            },
        }
    }

    pub fn output(mut self, template: &str) -> Self {
        self.kind.output = Some(template.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.kind.version = version.to_string();
        self
    }

    pub fn insignificant(mut self, param: &str) -> Self {
        self.kind.insignificant.push(param.to_string());
        self
    }

    pub fn marker(mut self, val: bool) -> Self {
        self.kind.marker = val;
        self
    }

    /// Require `kind`, forwarding the named params of the requiring task.
    pub fn requires(mut self, kind: &str, forward: &[&str]) -> Self {
        self.kind.requires.push(RequireConfig {
            kind: kind.to_string(),
            params: Params::new(),
            forward: forward.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Require `kind` with literal (possibly templated) params.
    pub fn requires_with(
        mut self,
        kind: &str,
        params: impl IntoIterator<Item = (&'static str, ParamValue)>,
    ) -> Self {
        self.kind.requires.push(RequireConfig {
            kind: kind.to_string(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            forward: vec![],
        });
        self
    }

    pub fn build(self) -> KindConfig {
        self.kind
    }
}
