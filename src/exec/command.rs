// src/exec/command.rs

//! Shell-command task kinds declared in the manifest.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::model::KindConfig;
use crate::errors::{Result, SaltdagError, TaskError};
use crate::exec::template;
use crate::task::{
    BoxFuture, FileTarget, NoTarget, ParamValue, Params, Registry, Target, TaskContext, TaskKind,
    TaskRequest,
};

/// A [`TaskKind`] that runs a templated shell command.
///
/// Placeholders available in `cmd` and `output`:
/// - `{<param>}`: any parameter of the task
/// - `{salt}`: the salted version
/// - `{kind}`: the kind name
///
/// and additionally in `cmd` only:
/// - `{output}`: the rendered output path
/// - `{inputs}`: space separated output paths of the direct dependencies
/// - `{attempt}`: the 1-based attempt number
#[derive(Debug, Clone)]
pub struct CommandKind {
    name: String,
    config: KindConfig,
}

impl CommandKind {
    pub fn new(name: impl Into<String>, config: KindConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn output_path(&self, params: &Params, salt: &str) -> Result<Option<PathBuf>> {
        let Some(tpl) = &self.config.output else {
            return Ok(None);
        };
        let rendered = template::render(tpl, |name| match name {
            "salt" => Some(salt.to_string()),
            "kind" => Some(self.name.clone()),
            other => params.get(other).map(ParamValue::to_template_string),
        })?;
        Ok(Some(PathBuf::from(rendered)))
    }

    fn render_cmd(&self, ctx: &TaskContext, output: Option<&PathBuf>) -> Result<String> {
        template::render(&self.config.cmd, |name| match name {
            "salt" => Some(ctx.salt.clone()),
            "kind" => Some(self.name.clone()),
            "attempt" => Some(ctx.attempt.to_string()),
            "output" => output.map(|p| p.display().to_string()),
            "inputs" => Some(
                ctx.inputs
                    .iter()
                    .filter(|t| t.declares_output())
                    .map(|t| t.description())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            other => ctx.params.get(other).map(ParamValue::to_template_string),
        })
    }

    /// Fail early on `cmd` placeholders that neither a param nor a built-in
    /// name can fill, so a typo surfaces while the graph is built. Lookups
    /// must mirror `render_cmd`.
    fn check_cmd(&self, params: &Params) -> Result<()> {
        template::render(&self.config.cmd, |name| match name {
            "salt" | "kind" | "attempt" | "inputs" => Some(String::new()),
            "output" => self.config.output.as_ref().map(|_| String::new()),
            other => params.get(other).map(ParamValue::to_template_string),
        })
        .map(|_| ())
    }

    async fn run_inner(&self, ctx: TaskContext) -> std::result::Result<(), TaskError> {
        let output = self
            .output_path(&ctx.params, &ctx.salt)
            .map_err(|e| TaskError::Execution(e.to_string()))?;
        let cmd_line = self
            .render_cmd(&ctx, output.as_ref())
            .map_err(|e| TaskError::Execution(e.to_string()))?;

        if let Some(parent) = output.as_ref().and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TaskError::Execution(format!("creating dir {:?}: {e}", parent))
                })?;
            }
        }

        info!(task = %ctx.id, cmd = %cmd_line, "starting task process");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&cmd_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&cmd_line);
            c
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            TaskError::Execution(format!("spawning process for task '{}': {e}", ctx.id))
        })?;

        // Consume both pipes so the child never blocks on a full buffer.
        if let Some(stdout) = child.stdout.take() {
            let id = ctx.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %id, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let id = ctx.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %id, "stderr: {}", line);
                }
            });
        }

        let status = child.wait().await.map_err(|e| {
            TaskError::Execution(format!("waiting for process of task '{}': {e}", ctx.id))
        })?;

        let code = status.code().unwrap_or(-1);
        info!(
            task = %ctx.id,
            exit_code = code,
            success = status.success(),
            "task process exited"
        );
        if !status.success() {
            return Err(TaskError::Execution(format!(
                "command exited with code {code}"
            )));
        }

        if self.config.marker {
            if let Some(path) = output {
                let marker = FileTarget::new(path);
                let contents = format!("{}\n", ctx.id);
                tokio::task::spawn_blocking(move || marker.write_marker(contents.as_bytes()))
                    .await
                    .map_err(|e| TaskError::Execution(format!("writing marker: {e}")))?
                    .map_err(|e| TaskError::Execution(format!("{e:#}")))?;
            }
        }

        Ok(())
    }
}

impl TaskKind for CommandKind {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.config.version
    }

    fn is_significant(&self, param: &str) -> bool {
        !self.config.insignificant.iter().any(|p| p == param)
    }

    fn requires(&self, params: &Params) -> Result<Vec<TaskRequest>> {
        self.config
            .requires
            .iter()
            .map(|req| {
                let mut dep = TaskRequest::new(req.kind.clone());

                for name in &req.forward {
                    let value = params.get(name).ok_or_else(|| {
                        SaltdagError::ConfigError(format!(
                            "kind '{}' forwards param '{}' to '{}' but it is not set",
                            self.name, name, req.kind
                        ))
                    })?;
                    dep.params.insert(name.clone(), value.clone());
                }

                for (name, value) in &req.params {
                    let value = match value {
                        ParamValue::Str(s) => ParamValue::Str(template::render(s, |p| {
                            params.get(p).map(ParamValue::to_template_string)
                        })?),
                        other => other.clone(),
                    };
                    dep.params.insert(name.clone(), value);
                }

                Ok(dep)
            })
            .collect()
    }

    fn output(&self, params: &Params, salt: &str) -> Result<Arc<dyn Target>> {
        self.check_cmd(params)?;
        Ok(match self.output_path(params, salt)? {
            Some(path) => Arc::new(FileTarget::new(path)),
            None => Arc::new(NoTarget),
        })
    }

    fn run<'a>(&'a self, ctx: TaskContext) -> BoxFuture<'a, std::result::Result<(), TaskError>> {
        Box::pin(self.run_inner(ctx))
    }
}

/// Build a registry holding one [`CommandKind`] per manifest kind.
pub fn command_registry(kinds: &BTreeMap<String, KindConfig>) -> Registry {
    let mut registry = Registry::new();
    for (name, config) in kinds {
        registry.register(Arc::new(CommandKind::new(name.clone(), config.clone())));
    }
    registry
}
