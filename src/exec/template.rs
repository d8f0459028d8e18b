// src/exec/template.rs

//! `{name}` placeholder rendering for command and output templates.
//!
//! Only identifiers in braces are placeholders, so shell snippets such as
//! `awk '{print $1}'` pass through untouched. `{{` and `}}` render as
//! literal braces.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::errors::{Result, SaltdagError};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
});

/// Render `template`, resolving each placeholder through `lookup`.
///
/// Fails with [`SaltdagError::Template`] naming the first placeholder that
/// `lookup` cannot resolve.
pub fn render<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Option<String> = None;

    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match caps.get(1) {
            None if &caps[0] == "{{" => "{".to_string(),
            None => "}".to_string(),
            Some(name) => match lookup(name.as_str()) {
                Some(value) => value,
                None => {
                    missing.get_or_insert_with(|| name.as_str().to_string());
                    String::new()
                }
            },
        }
    });

    match missing {
        Some(name) => Err(SaltdagError::Template(format!(
            "unknown placeholder {{{name}}} in \"{template}\""
        ))),
        None => Ok(rendered.into_owned()),
    }
}

/// Placeholder names used in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
