// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ManifestFile, RawManifestFile};
use crate::engine::retry::{Backoff, BackoffKind, RetryPolicy};
use crate::errors::{Result, SaltdagError};
use crate::task::TaskRequest;
use crate::types::parse_duration;

impl TryFrom<RawManifestFile> for ManifestFile {
    type Error = crate::errors::SaltdagError;

    fn try_from(raw: RawManifestFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_manifest(&raw)?;
        let retry = retry_policy(&raw)?;
        let timeout = raw
            .config
            .timeout
            .as_deref()
            .map(|s| duration_field("[config].timeout", s))
            .transpose()?;

        let mut roots: Vec<TaskRequest> = raw.root.clone();
        for range in &raw.root_range {
            roots.extend(range.expand());
        }

        Ok(ManifestFile::new_unchecked(
            raw.config,
            raw.kind,
            retry,
            timeout,
            roots,
        ))
    }
}

/// Validate a raw manifest without converting it.
pub fn validate_manifest(cfg: &RawManifestFile) -> Result<()> {
    validate_raw_manifest(cfg)
}

fn validate_raw_manifest(cfg: &RawManifestFile) -> Result<()> {
    ensure_has_roots(cfg)?;
    validate_global_config(cfg)?;
    validate_kinds(cfg)?;
    validate_roots(cfg)?;
    Ok(())
}

fn ensure_has_roots(cfg: &RawManifestFile) -> Result<()> {
    if cfg.root.is_empty() && cfg.root_range.is_empty() {
        return Err(SaltdagError::ConfigError(
            "manifest must contain at least one [[root]] or [[root_range]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawManifestFile) -> Result<()> {
    if cfg.config.workers == 0 {
        return Err(SaltdagError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.retry.max_attempts == 0 {
        return Err(SaltdagError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_kinds(cfg: &RawManifestFile) -> Result<()> {
    for (name, kind) in cfg.kind.iter() {
        if kind.cmd.trim().is_empty() {
            return Err(SaltdagError::ConfigError(format!(
                "kind '{}' has an empty `cmd`",
                name
            )));
        }
        for req in kind.requires.iter() {
            if !cfg.kind.contains_key(&req.kind) {
                return Err(SaltdagError::ConfigError(format!(
                    "kind '{}' has unknown kind '{}' in `requires`",
                    name, req.kind
                )));
            }
        }
    }
    Ok(())
}

fn validate_roots(cfg: &RawManifestFile) -> Result<()> {
    for root in cfg.root.iter() {
        if !cfg.kind.contains_key(&root.kind) {
            return Err(SaltdagError::ConfigError(format!(
                "[[root]] refers to unknown kind '{}'",
                root.kind
            )));
        }
    }

    for range in cfg.root_range.iter() {
        if !cfg.kind.contains_key(&range.kind) {
            return Err(SaltdagError::ConfigError(format!(
                "[[root_range]] refers to unknown kind '{}'",
                range.kind
            )));
        }
        if range.step <= 0 {
            return Err(SaltdagError::ConfigError(format!(
                "[[root_range]] for kind '{}' must have step >= 1 (got {})",
                range.kind, range.step
            )));
        }
        if range.start >= range.end {
            return Err(SaltdagError::ConfigError(format!(
                "[[root_range]] for kind '{}' must have start < end (got {}..{})",
                range.kind, range.start, range.end
            )));
        }
        if range.lower == range.upper {
            return Err(SaltdagError::ConfigError(format!(
                "[[root_range]] for kind '{}' uses '{}' for both bounds",
                range.kind, range.lower
            )));
        }
    }
    Ok(())
}

fn retry_policy(cfg: &RawManifestFile) -> Result<RetryPolicy> {
    let backoff = match cfg.retry.backoff {
        BackoffKind::None => Backoff::None,
        BackoffKind::Fixed => Backoff::Fixed(duration_field("[retry].delay", &cfg.retry.delay)?),
        BackoffKind::Exponential => Backoff::Exponential {
            base: duration_field("[retry].delay", &cfg.retry.delay)?,
            max: duration_field("[retry].max_delay", &cfg.retry.max_delay)?,
        },
    };
    Ok(RetryPolicy::new(cfg.retry.max_attempts, backoff))
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| SaltdagError::ConfigError(format!("{field}: {e}")))
}
