// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ManifestFile, RawManifestFile};
use crate::errors::Result;

/// Load a manifest from a given path and return the raw `RawManifestFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifestFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Parse a manifest from TOML text.
pub fn load_from_str(contents: &str) -> Result<RawManifestFile> {
    let manifest: RawManifestFile = toml::from_str(contents)?;
    Ok(manifest)
}

/// Load a manifest from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - unknown kinds in roots and `requires`,
///   - sane `[config]` / `[retry]` values and durations,
///   - well-formed root ranges.
///
/// Cycles and parameter conflicts depend on concrete parameters and are
/// detected later, when the task graph is built.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ManifestFile> {
    let raw = load_from_path(&path)?;
    let manifest = ManifestFile::try_from(raw)?;
    Ok(manifest)
}

/// Default manifest location: `Saltdag.toml` in the current directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("Saltdag.toml")
}
