// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::types::{CancelPolicy, parse_duration};

/// Command-line arguments for `saltdag`.
///
/// Flags given here override the matching `[config]` values of the manifest.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "saltdag",
    version,
    about = "Run a DAG of parameterized, salted tasks, skipping outputs that already exist.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the run manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "Saltdag.toml")]
    pub manifest: PathBuf,

    /// Maximum number of tasks running at once.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// What to do with running tasks on Ctrl-C or timeout.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub cancel_policy: Option<CancelPolicy>,

    /// Cancel the run after this long (e.g. `90s`, `30m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Write the run report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SALTDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve the graph and print it in execution order, but don't run
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
