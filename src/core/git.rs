//! Version control boundary over the `git` executable
//!
//! Isolates a reorganization on its own branch: branch off, stage
//! everything, commit with a message grouped by change kind. When a step
//! fails the previously checked-out branch is restored on a best-effort basis.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Local};

use crate::core::plan::{ChangeKind, ChangeRecord, group_by_kind};
use crate::core::project::Identity;
use crate::observer::Observer;

/// Subject line of every reorganization commit
pub const COMMIT_SUBJECT: &str = "refactor: reorganize repository structure";

/// Git failures, surfaced to the caller as warnings
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git executable not available: {0}")]
    Unavailable(String),

    #[error("{0} is not inside a git work tree")]
    NotARepository(PathBuf),

    #[error("`git {args}` failed: {stderr}")]
    Command { args: String, stderr: String },
}

/// Result of a successful [`GitBoundary::commit_changes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { branch: String, previous: String },
    /// Working tree was clean; no branch was created
    NothingToCommit,
}

/// Git operations rooted at one work tree
#[derive(Debug, Clone)]
pub struct GitBoundary {
    root: PathBuf,
    git: PathBuf,
}

impl GitBoundary {
    /// Open the work tree containing `root`
    pub fn open(root: &Path) -> Result<Self, GitError> {
        let boundary = Self {
            root: root.to_path_buf(),
            git: detect_git_executable()?,
        };
        match boundary.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out == "true" => Ok(boundary),
            _ => Err(GitError::NotARepository(root.to_path_buf())),
        }
    }

    /// Run git with `args` in the work tree; trimmed stdout on success
    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        run_git(&self.git, &self.root, args)
    }

    /// Name of the checked-out branch (also for an unborn HEAD)
    pub fn current_branch(&self) -> Result<String, GitError> {
        match self.git(&["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(name) if !name.is_empty() => Ok(name),
            // detached HEAD: fall back to the commit id
            _ => self.git(&["rev-parse", "--short", "HEAD"]),
        }
    }

    /// URL of `origin`, if configured
    pub fn remote_url(&self) -> Option<String> {
        self.git(&["config", "--get", "remote.origin.url"])
            .ok()
            .filter(|s| !s.is_empty())
    }

    pub fn identity(&self) -> Identity {
        read_identity(&self.root)
    }

    /// Commit every working-tree change on a new branch
    ///
    /// `branch` defaults to a timestamped name. On failure after the branch
    /// was created, the previous branch is checked out again; if that fails
    /// too it is reported to `observer` and the original error is returned.
    #[tracing::instrument(level = "debug", skip_all, fields(root = %self.root.display()))]
    pub fn commit_changes(
        &self,
        branch: Option<&str>,
        changes: &[ChangeRecord],
        observer: &dyn Observer,
    ) -> Result<CommitOutcome, GitError> {
        if self.git(&["status", "--porcelain"])?.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let previous = self.current_branch()?;
        let branch = branch
            .map(str::to_string)
            .unwrap_or_else(|| default_branch_name(Local::now()));

        self.git(&["checkout", "-b", &branch])?;

        let message = commit_message(changes);
        let result = self
            .git(&["add", "-A"])
            .and_then(|_| self.git(&["commit", "-m", &message]));

        match result {
            Ok(_) => Ok(CommitOutcome::Committed { branch, previous }),
            Err(e) => {
                if let Err(restore) = self.git(&["checkout", &previous]) {
                    observer.on_error(&format!(
                        "could not return to branch {previous}: {restore}"
                    ));
                }
                Err(e)
            }
        }
    }
}

/// `refactor/reorganize-YYYYmmdd-HHMMSS`
pub fn default_branch_name(now: DateTime<Local>) -> String {
    format!("refactor/reorganize-{}", now.format("%Y%m%d-%H%M%S"))
}

/// Commit message with one section per change kind
pub fn commit_message(changes: &[ChangeRecord]) -> String {
    let mut message = format!(
        "{COMMIT_SUBJECT}\n\nReorganize repository to match template structure.\n"
    );

    for (kind, records) in group_by_kind(changes) {
        message.push_str(&format!("\n{}:\n", kind.title()));
        for r in records {
            match (kind, r.destination()) {
                (ChangeKind::MoveFile, Some(dest)) => {
                    message.push_str(&format!("* {} -> {dest}\n", r.path))
                }
                _ => message.push_str(&format!("* {}\n", r.path)),
            }
        }
    }

    message
}

/// `user.name` / `user.email` as git sees them from `dir`, repository or not
pub fn read_identity(dir: &Path) -> Identity {
    let Ok(git) = detect_git_executable() else {
        return Identity::default();
    };
    let get = |key: &str| {
        run_git(&git, dir, &["config", "--get", key])
            .ok()
            .filter(|s| !s.is_empty())
    };
    Identity {
        name: get("user.name"),
        email: get("user.email"),
    }
}

fn run_git(git: &Path, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = Command::new(git)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| GitError::Unavailable(e.to_string()))?;

    if !output.status.success() {
        return Err(GitError::Command {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Detect git executable
fn detect_git_executable() -> Result<PathBuf, GitError> {
    let output = Command::new("git")
        .arg("--version")
        .output()
        .map_err(|e| GitError::Unavailable(e.to_string()))?;

    if !output.status.success() {
        return Err(GitError::Unavailable("`git --version` failed".to_string()));
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    if !version_str.contains("git version") {
        return Err(GitError::Unavailable(format!(
            "unexpected version output: {version_str}"
        )));
    }

    Ok(PathBuf::from("git"))
}
