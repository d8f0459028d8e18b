// src/task/identity.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::kind::TaskKind;
use crate::task::params::{Params, render_params};

/// Stable identity of a task node: `kind(k1=v1, k2=v2)`.
///
/// Built from the kind name and its *significant* parameters in sorted key
/// order, so two requests with the same kind and significant parameters are
/// the same node regardless of where in the graph they were declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Derive the identity for `params` under the given kind.
    pub fn new(kind: &dyn TaskKind, params: &Params) -> Self {
        let significant = params.iter().filter(|(k, _)| kind.is_significant(k));
        Self(format!("{}({})", kind.name(), render_params(significant)))
    }

    /// Wrap an already-canonical identity string (e.g. read back from a
    /// persisted report).
    pub fn from_canonical(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
