//! Binary-level tests: flags, output modes and the full live run

use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

mod util;
use util::{git, git_available, init_repo, make_project, make_template};

fn reorg() -> Command
{
    let mut cmd = Command::cargo_bin("reorg").expect("bin");
    // keep tracing output predictable regardless of the caller's env
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_the_reorganizer_flags()
{
    reorg()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--template-path"))
        .stdout(predicate::str::contains("--no-github-actions"))
        .stdout(predicate::str::contains("--security-check"));
}

#[test]
fn missing_root_exits_non_zero()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    reorg()
        .arg(tmp.path().join("nope"))
        .arg("--no-input")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn dry_run_prints_plan_and_report_without_touching_the_tree()
{
    let tmp = make_project(&[("foo.py", "x = 1\n")]);

    reorg()
        .arg(tmp.path())
        .args(["--dry-run", "--no-input", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Repository Reorganization Report"))
        .stdout(predicate::str::contains("* `foo.py`\n  - → `src/foo.py`"));

    tmp.child("foo.py")
        .assert(predicate::path::is_file());
    tmp.child("src")
        .assert(predicate::path::missing());
    tmp.child("reorganization_report.md")
        .assert(predicate::path::missing());
}

#[test]
fn json_plan_is_machine_readable()
{
    let tmp = make_project(&[("foo.py", "x = 1\n")]);

    let out = reorg()
        .arg(tmp.path())
        .args(["--dry-run", "--no-input", "--json"])
        .output()
        .expect("run");
    assert!(out.status.success());

    let plan: Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    let moves: Vec<&Value> = plan
        .as_array()
        .expect("array")
        .iter()
        .filter(|r| r["action"] == "move_file")
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0]["path"], "foo.py");
    assert_eq!(moves[0]["destination"], "src/foo.py");
}

#[test]
fn live_run_reorganizes_and_writes_report()
{
    let tmp = make_project(&[("foo.py", "x = 1\n"), ("integration/test_bar.py", "")]);
    let template = make_template();

    reorg()
        .arg(tmp.path())
        .arg("--template-path")
        .arg(template.path())
        .args(["--no-input", "--no-commit", "--quiet", "--no-docker"])
        .assert()
        .success();

    tmp.child("src/foo.py")
        .assert(predicate::path::is_file());
    tmp.child("tests/integration/test_bar.py")
        .assert(predicate::path::is_file());
    tmp.child("LICENSE")
        .assert("MIT License\n");
    tmp.child(".github/workflows/reusable-tests.yml")
        .assert(predicate::path::is_file());
    tmp.child("pyproject.toml")
        .assert(predicate::str::contains("[tool.reorg]"));
    tmp.child("reorganization_report.md")
        .assert(predicate::str::contains("## Changes Made"));
    // emptied source directory is cleaned up
    tmp.child("integration")
        .assert(predicate::path::missing());
}

#[test]
fn second_run_reports_nothing_to_do()
{
    let tmp = make_project(&[("foo.py", "x = 1\n")]);
    let template = make_template();

    for _ in 0..2
    {
        reorg()
            .arg(tmp.path())
            .arg("--template-path")
            .arg(template.path())
            .args(["--no-input", "--no-commit", "--no-color"])
            .assert()
            .success();
    }

    reorg()
        .arg(tmp.path())
        .arg("--template-path")
        .arg(template.path())
        .args(["--no-input", "--no-commit", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already matches"));
}

#[test]
fn analyze_mode_surveys_without_mutation()
{
    let tmp = make_project(&[("app.py", "print('x')\n")]);

    let out = reorg()
        .arg(tmp.path())
        .args(["--analyze", "--json"])
        .output()
        .expect("run");
    assert!(out.status.success());

    let v: Value = serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    assert_eq!(v["survey"]["language"], "Python");
    assert!(
        v["analysis"]["unclassified_files"]
            .as_array()
            .expect("array")
            .iter()
            .any(|f| f == "app.py")
    );
    tmp.child("src")
        .assert(predicate::path::missing());
}

#[test]
fn security_check_reports_findings()
{
    let tmp = make_project(&[("app.py", "password = \"hunter2\"\nprint(password)\n")]);

    reorg()
        .arg(tmp.path())
        .args(["--security-check", "--no-color"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hardcoded_secrets"))
        .stdout(predicate::str::contains("debug_code"))
        .stdout(predicate::str::contains("app.py:1"));
}

#[test]
fn init_writes_default_config()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    reorg()
        .arg("init")
        .arg(tmp.path())
        .assert()
        .success();
    tmp.child("reorg.toml")
        .assert(predicate::str::contains("[[file_patterns]]"));

    // refuses to clobber without --force
    reorg()
        .arg("init")
        .arg(tmp.path())
        .assert()
        .failure();
}

#[test]
fn completions_print_to_stdout()
{
    reorg()
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reorg"));
}

#[test]
fn commit_lands_on_named_branch()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }
    let tmp = make_project(&[("foo.py", "x = 1\n")]);
    init_repo(tmp.path());

    reorg()
        .arg(tmp.path())
        .args(["--no-input", "--branch-name", "refactor/layout", "--no-docker", "--no-github-actions"])
        .assert()
        .success();

    assert_eq!(git(tmp.path(), &["rev-parse", "--abbrev-ref", "HEAD"]), "refactor/layout");
    let message = git(tmp.path(), &["log", "-1", "--format=%B"]);
    assert!(message.starts_with("refactor: reorganize repository structure"));
    assert!(message.contains("* foo.py -> src/foo.py"));
    tmp.child("reorganization_report.md")
        .assert(predicate::str::contains("* Branch: refactor/layout"));
}
