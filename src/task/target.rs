// src/task/target.rs

//! Durable output locations.
//!
//! A [`Target`] only answers "does this output already exist?". Who writes it
//! and how is up to the task body; the scheduler never touches the storage
//! behind a target except through [`Target::exists`].

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

/// Fault raised while checking a target (storage unreachable, permission
/// denied, ...). Distinct from "does not exist".
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("checking {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Unavailable(String),
}

/// Handle to a durable output location.
///
/// `exists` must be idempotent and free of side effects. It may block (it is
/// always called from the blocking thread pool).
pub trait Target: Send + Sync + Debug {
    fn exists(&self) -> std::result::Result<bool, TargetError>;

    /// Human readable location, used in logs and the run report.
    fn description(&self) -> String;

    /// Whether this target stands for an actual output. Post-run output
    /// verification is skipped for targets that return `false`.
    fn declares_output(&self) -> bool {
        true
    }
}

/// A file (or directory) on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `contents` to the target path, creating parent directories.
    ///
    /// Task bodies use this to drop a success marker once their real work is
    /// done.
    pub fn write_marker(&self, contents: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        fs::write(&self.path, contents)
            .with_context(|| format!("writing marker {:?}", self.path))?;
        Ok(())
    }
}

impl Target for FileTarget {
    fn exists(&self) -> std::result::Result<bool, TargetError> {
        match fs::metadata(&self.path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TargetError::Io {
                target: self.description(),
                source,
            }),
        }
    }

    fn description(&self) -> String {
        self.path.display().to_string()
    }
}

/// Target of a task that declares no output. It is never complete, so the
/// task runs on every invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTarget;

impl Target for NoTarget {
    fn exists(&self) -> std::result::Result<bool, TargetError> {
        Ok(false)
    }

    fn description(&self) -> String {
        "<none>".to_string()
    }

    fn declares_output(&self) -> bool {
        false
    }
}
