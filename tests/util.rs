//! Shared test utilities for integration tests
//!
//! Provides fixture projects, a template root, and git helpers
//! used across multiple test files.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use assert_fs::prelude::*;

/// Configuration that keeps finalization from spawning real tools
pub const HERMETIC_CONFIG: &str = "[finalize]\nenvironment = []\nhooks = []\n";

/// Create a project with the given `(path, contents)` files plus a
/// hermetic reorg.toml.
pub fn make_project(files: &[(&str, &str)]) -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    for (path, contents) in files
    {
        tmp.child(path)
            .write_str(contents)
            .expect("write fixture file");
    }

    tmp.child("reorg.toml")
        .write_str(HERMETIC_CONFIG)
        .expect("write reorg.toml");

    tmp
}

/// Template repository with every declared structure file, reusable
/// workflows and documentation pages.
pub fn make_template() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    for (path, contents) in [
        ("README.md", "# ecosphere-project\n"),
        ("LICENSE", "MIT License\n"),
        (".gitignore", "__pycache__/\n"),
        ("pyproject.toml", "[tool.poetry]\nname = \"ecosphere-project\"\n"),
        (".pre-commit-config.yaml", "repos: []\n"),
        ("Dockerfile", "FROM python:3.12-slim\n"),
        ("docker-compose.yml", "services: {}\n"),
        ("Makefile", "test:\n\tpytest\n"),
        ("mkdocs.yml", "site_name: ecosphere-project\n"),
        (".github/workflows/reusable-tests.yml", "on: workflow_call\n"),
        (".github/workflows/template-only.yml", "on: push\n"),
        ("docs/index.md", "# ecosphere-project docs\n"),
        ("docs/api/reference.md", "# ecosphere-project API\n"),
    ]
    {
        tmp.child(path)
            .write_str(contents)
            .expect("write template file");
    }

    tmp
}

/// True when a usable git executable is on PATH
pub fn git_available() -> bool
{
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking on failure
pub fn git(
    dir: &Path,
    args: &[&str],
) -> String
{
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(out.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8_lossy(&out.stdout)
        .trim()
        .to_string()
}

/// Initialise a repository on `main` with an initial commit of the tree
pub fn init_repo(dir: &Path)
{
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", "initial"]);
}
