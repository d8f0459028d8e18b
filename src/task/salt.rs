// src/task/salt.rs

//! Salted versions.
//!
//! A salt is a short digest over everything that determines a task's output:
//! its kind, its code version, its significant parameters and, recursively,
//! the salts of its dependencies. Embedding `{salt}` in an output location
//! means a change anywhere upstream produces a new location, so stale outputs
//! are never mistaken for complete ones.

use blake3::Hasher;

use crate::task::kind::TaskKind;
use crate::task::params::Params;

/// Number of hex characters kept from the digest.
pub const SALT_LEN: usize = 10;

/// Compute the salted version of a task.
///
/// `dep_salts` may be given in any order; they are sorted before hashing so
/// the result does not depend on declaration order.
pub fn salted_version(kind: &dyn TaskKind, params: &Params, dep_salts: &[&str]) -> String {
    let mut hasher = Hasher::new();

    let mut sorted: Vec<&str> = dep_salts.to_vec();
    sorted.sort_unstable();
    for salt in sorted {
        hasher.update(salt.as_bytes());
    }

    hasher.update(kind.name().as_bytes());
    hasher.update(kind.version().as_bytes());

    for (name, value) in params.iter().filter(|(k, _)| kind.is_significant(k)) {
        hasher.update(format!("{name}={value}").as_bytes());
    }

    let mut hex = hasher.finalize().to_hex().to_string();
    hex.truncate(SALT_LEN);
    hex
}
