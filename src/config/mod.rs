// src/config/mod.rs

//! Run manifest loading and validation for saltdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate basic invariants like known kinds and sane limits (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigSection, KindConfig, ManifestFile, RawManifestFile, RequireConfig, RetrySection,
    RootRange,
};
pub use validate::validate_manifest;
