// src/task/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{Result, SaltdagError};
use crate::task::kind::TaskKind;

/// Lookup table from kind name to implementation.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<String, Arc<dyn TaskKind>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind under its own name, replacing any previous entry.
    pub fn register(&mut self, kind: Arc<dyn TaskKind>) -> &mut Self {
        self.kinds.insert(kind.name().to_string(), kind);
        self
    }

    /// Builder-style variant of [`Registry::register`].
    pub fn with(mut self, kind: Arc<dyn TaskKind>) -> Self {
        self.register(kind);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TaskKind>> {
        self.kinds
            .get(name)
            .cloned()
            .ok_or_else(|| SaltdagError::UnknownKind(name.to_string()))
    }
}
