// tests/command_kind.rs
//
// Manifest-declared shell commands run through the whole stack.

#![cfg(unix)]

mod common;
use crate::common::builders::{KindConfigBuilder, ManifestBuilder};
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;

use saltdag::config::ManifestFile;
use saltdag::dag::TaskStatus;
use saltdag::errors::SaltdagError;
use saltdag::exec::command_registry;
use saltdag::report::RunReport;
use saltdag::task::{ParamValue, TaskId, TaskKind, TaskRequest};
use saltdag::{RunOptions, build_graph, run_roots};

type TestResult = Result<(), Box<dyn Error>>;

async fn run_manifest(manifest: &ManifestFile) -> Result<RunReport, Box<dyn Error>> {
    let registry = command_registry(&manifest.kinds);
    let options = RunOptions::from_manifest(manifest);
    Ok(with_timeout(run_roots(&registry, manifest.roots(), options)).await?)
}

fn path_str(p: &Path) -> String {
    p.display().to_string()
}

/// fetch(day) -> clean(day): each writes its output file.
fn pipeline(dir: &Path) -> ManifestFile {
    let d = path_str(dir);
    ManifestBuilder::new()
        .with_kind(
            "fetch",
            KindConfigBuilder::new("echo raw-{day} > {output}; echo run >> {dir}/fetch.log")
                .output(&format!("{d}/raw/{{day}}-{{salt}}.txt"))
                .build(),
        )
        .with_kind(
            "clean",
            KindConfigBuilder::new("tr a-z A-Z < {inputs} > {output}")
                .output(&format!("{d}/clean/{{day}}-{{salt}}.txt"))
                .requires("fetch", &["day", "dir"])
                .build(),
        )
        .with_root(
            TaskRequest::new("clean")
                .param("day", 7i64)
                .param("dir", d.as_str()),
        )
        .build()
}

#[tokio::test]
async fn commands_produce_outputs_and_second_run_skips() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let manifest = pipeline(dir.path());

    let report = run_manifest(&manifest).await?;
    assert!(report.all_succeeded(), "{report}");
    assert_eq!(report.counts().done, 2);

    let clean = report
        .tasks
        .values()
        .find(|t| t.kind == "clean")
        .expect("clean task in report");
    let contents = fs::read_to_string(&clean.target)?;
    assert_eq!(contents.trim(), "RAW-7");

    let report = run_manifest(&manifest).await?;
    assert_eq!(report.counts().skipped, 2);
    let log = fs::read_to_string(dir.path().join("fetch.log"))?;
    assert_eq!(log.lines().count(), 1);

    Ok(())
}

#[tokio::test]
async fn failing_command_reports_exit_code_and_fails_dependents() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let d = path_str(dir.path());

    let manifest = ManifestBuilder::new()
        .with_kind(
            "broken",
            KindConfigBuilder::new("exit 3")
                .output(&format!("{d}/broken-{{salt}}"))
                .build(),
        )
        .with_kind(
            "downstream",
            KindConfigBuilder::new("touch {output}")
                .output(&format!("{d}/downstream-{{salt}}"))
                .requires("broken", &[])
                .build(),
        )
        .with_root(TaskRequest::new("downstream"))
        .build();

    let report = run_manifest(&manifest).await?;

    let broken = report.get("broken()").unwrap();
    assert_eq!(broken.status, TaskStatus::Failed);
    assert!(
        broken
            .error
            .as_deref()
            .unwrap()
            .contains("command exited with code 3")
    );
    assert_eq!(
        report.status_of(&TaskId::from_canonical("downstream()")),
        Some(TaskStatus::Failed)
    );

    Ok(())
}

#[tokio::test]
async fn marker_is_written_after_success() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let d = path_str(dir.path());

    let manifest = ManifestBuilder::new()
        .with_kind(
            "job",
            KindConfigBuilder::new("echo working on {n}")
                .output(&format!("{d}/markers/_SUCCESS-{{n}}-{{salt}}"))
                .marker(true)
                .build(),
        )
        .with_root(TaskRequest::new("job").param("n", 1i64))
        .build();

    let report = run_manifest(&manifest).await?;
    let job = report.get("job(n=1)").unwrap();
    assert_eq!(job.status, TaskStatus::Done);

    let marker = fs::read_to_string(&job.target)?;
    assert_eq!(marker.trim(), "job(n=1)");

    Ok(())
}

#[tokio::test]
async fn kind_without_output_runs_every_time() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let log = dir.path().join("runs.log");

    let manifest = ManifestBuilder::new()
        .with_kind(
            "notify",
            KindConfigBuilder::new(&format!("echo {{attempt}} >> {}", log.display())).build(),
        )
        .with_root(TaskRequest::new("notify"))
        .build();

    run_manifest(&manifest).await?;
    let report = run_manifest(&manifest).await?;

    assert_eq!(report.get("notify()").unwrap().target, "<none>");
    assert_eq!(fs::read_to_string(&log)?.lines().count(), 2);

    Ok(())
}

#[test]
fn requires_renders_templated_params_and_forwards() {
    let manifest = ManifestBuilder::new()
        .with_kind("leaf", KindConfigBuilder::new("true").build())
        .with_kind(
            "top",
            KindConfigBuilder::new("true")
                .requires_with(
                    "leaf",
                    [
                        ("path", ParamValue::from("in/{day}.csv")),
                        ("limit", ParamValue::Int(5)),
                    ],
                )
                .requires("leaf", &["day"])
                .build(),
        )
        .with_root(TaskRequest::new("top").param("day", 2i64))
        .build();
    let registry = command_registry(&manifest.kinds);
    let top = registry.get("top").unwrap();

    let deps = top
        .requires(&TaskRequest::new("top").param("day", 2i64).params)
        .unwrap();

    assert_eq!(deps.len(), 2);
    assert_eq!(deps[0].params["path"], ParamValue::from("in/2.csv"));
    assert_eq!(deps[0].params["limit"], ParamValue::Int(5));
    assert_eq!(deps[1].params["day"], ParamValue::Int(2));

    let graph = build_graph(&registry, manifest.roots()).unwrap();
    assert_eq!(graph.len(), 3);
}

#[test]
fn forwarding_a_missing_param_fails_the_build() {
    let manifest = ManifestBuilder::new()
        .with_kind("leaf", KindConfigBuilder::new("true").build())
        .with_kind(
            "top",
            KindConfigBuilder::new("true").requires("leaf", &["day"]).build(),
        )
        .with_root(TaskRequest::new("top"))
        .build();
    let registry = command_registry(&manifest.kinds);

    match build_graph(&registry, manifest.roots()) {
        Err(SaltdagError::ConfigError(msg)) => assert!(msg.contains("'day'")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn unknown_output_placeholder_fails_the_build() {
    let manifest = ManifestBuilder::new()
        .with_kind(
            "x",
            KindConfigBuilder::new("true").output("out/{missing}.txt").build(),
        )
        .with_root(TaskRequest::new("x"))
        .build();
    let registry = command_registry(&manifest.kinds);

    match build_graph(&registry, manifest.roots()) {
        Err(SaltdagError::Template(msg)) => assert!(msg.contains("{missing}")),
        other => panic!("Expected Template error, got: {:?}", other),
    }
}

#[test]
fn unknown_cmd_placeholder_fails_the_build() {
    let manifest = ManifestBuilder::new()
        .with_kind(
            "x",
            KindConfigBuilder::new("cat {inputs} > {output} --day {dya}")
                .output("out/{day}.txt")
                .build(),
        )
        .with_root(TaskRequest::new("x").param("day", 1i64))
        .build();
    let registry = command_registry(&manifest.kinds);

    match build_graph(&registry, manifest.roots()) {
        Err(SaltdagError::Template(msg)) => assert!(msg.contains("{dya}")),
        other => panic!("Expected Template error, got: {:?}", other),
    }
}

#[test]
fn output_placeholder_needs_a_declared_output() {
    let manifest = ManifestBuilder::new()
        .with_kind("x", KindConfigBuilder::new("touch {output}").build())
        .with_root(TaskRequest::new("x"))
        .with_root(TaskRequest::new("x").param("output", "shadow.txt"))
        .build();
    let registry = command_registry(&manifest.kinds);

    // A param named `output` does not stand in for a declared output; the
    // command would not render at run time either.
    for root in manifest.roots() {
        match build_graph(&registry, std::slice::from_ref(root)) {
            Err(SaltdagError::Template(msg)) => assert!(msg.contains("{output}")),
            other => panic!("Expected Template error, got: {:?}", other),
        }
    }
}

#[test]
fn insignificant_manifest_params_collide_on_conflict() {
    let manifest = ManifestBuilder::new()
        .with_kind(
            "x",
            KindConfigBuilder::new("true").insignificant("note").build(),
        )
        .with_root(TaskRequest::new("x").param("n", 1i64).param("note", "first"))
        .with_root(TaskRequest::new("x").param("n", 1i64).param("note", "second"))
        .build();
    let registry = command_registry(&manifest.kinds);

    assert!(matches!(
        build_graph(&registry, manifest.roots()),
        Err(SaltdagError::ParameterConflict { .. })
    ));
}
