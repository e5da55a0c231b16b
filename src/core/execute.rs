//! Plan execution and post-plan finalization.
//!
//! Every record is applied independently: a failure is reported to the
//! observer (error when the record is required, warning otherwise) and the
//! loop moves on. Only records that succeed reach the executed log.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::core::pattern::{IgnoreRules, rel_string};
use crate::core::plan::{ChangeAction, ChangeKind, ChangeRecord, DOC_DIRS, Plan};
use crate::core::project::{ProjectConfig, merge_pyproject};
use crate::infra::config::{FinalizeConfig, RequiredStructure};
use crate::infra::process::CommandRunner;
use crate::infra::walk::FileWalker;
use crate::observer::Observer;

/// Workflow files picked up from the template's workflow directory.
pub const WORKFLOW_GLOB: &str = "reusable-*.yml";

const HOOK_CONFIG: &str = ".pre-commit-config.yaml";

/// Per-record mutation failure.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("source {0} does not exist")]
    MissingSource(PathBuf),

    #[error("destination {0} already exists")]
    DestinationExists(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("updating {path}: {message}")]
    Config { path: PathBuf, message: String },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ChangeError + '_ {
    move |source| ChangeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A record that did not apply, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct FailedChange {
    pub record: ChangeRecord,
    pub message: String,
}

/// Outcome of one execution pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutedChanges {
    /// Records applied without error, in plan order
    pub applied: Vec<ChangeRecord>,
    pub failed: Vec<FailedChange>,
    pub dry_run: bool,
}

impl ExecutedChanges {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

pub struct PlanExecutor<'a> {
    root: &'a Path,
    template_root: Option<&'a Path>,
    structure: &'a RequiredStructure,
    finalize: &'a FinalizeConfig,
    runner: &'a dyn CommandRunner,
    show_progress: bool,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(
        root: &'a Path,
        structure: &'a RequiredStructure,
        finalize: &'a FinalizeConfig,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            root,
            template_root: None,
            structure,
            finalize,
            runner,
            show_progress: false,
        }
    }

    pub fn with_template_root(mut self, root: Option<&'a Path>) -> Self {
        self.template_root = root;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Apply `plan`. In dry-run mode nothing is touched: each record is only
    /// announced and the executed log stays empty.
    pub fn execute(
        &self,
        plan: &Plan,
        project: &ProjectConfig,
        dry_run: bool,
        observer: &dyn Observer,
    ) -> ExecutedChanges {
        let mut outcome = ExecutedChanges {
            dry_run,
            ..Default::default()
        };

        if dry_run {
            for record in plan {
                observer.on_info(&format!(
                    "would {}: {} ({})",
                    record.kind(),
                    record.path,
                    record.description
                ));
            }
            return outcome;
        }

        let pb = self.progress_bar(plan.len() as u64 + 4);

        for record in plan {
            pb.set_message(record.description.clone());
            match self.apply(record) {
                Ok(()) => outcome.applied.push(record.clone()),
                Err(e) => {
                    let message = format!("{} {}: {e}", record.kind(), record.path);
                    if record.required {
                        observer.on_error(&message);
                    } else {
                        observer.on_warning(&message);
                    }
                    outcome.failed.push(FailedChange {
                        record: record.clone(),
                        message: e.to_string(),
                    });
                }
            }
            pb.inc(1);
        }

        let mut keep: BTreeSet<String> = outcome
            .applied
            .iter()
            .filter(|r| matches!(r.kind(), ChangeKind::CreateDir | ChangeKind::SetupWorkflows))
            .map(|r| r.path.clone())
            .collect();
        if project.features.docs {
            keep.extend(DOC_DIRS.iter().map(|(d, _)| d.to_string()));
        }

        let step = |description: &'static str, result: Result<()>| {
            if let Err(e) = result {
                observer.on_warning(&format!("{description} failed: {e:#}"));
            }
            pb.inc(1);
        };

        // fixed order; a failing step never stops the next one
        pb.set_message("Setting up development environment");
        step("Setting up development environment", self.setup_environment());
        pb.set_message("Setting up documentation");
        step("Setting up documentation", self.setup_documentation(project));
        pb.set_message("Setting up git hooks");
        step("Setting up git hooks", self.setup_hooks());
        pb.set_message("Performing final cleanup");
        step("Performing final cleanup", self.cleanup(&keep, observer));

        pb.finish_and_clear();
        outcome
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("#>-"));
        pb
    }

    fn apply(&self, record: &ChangeRecord) -> Result<(), ChangeError> {
        let target = self.root.join(&record.path);
        match &record.action {
            ChangeAction::CreateDir => fs::create_dir_all(&target).map_err(io_err(&target)),
            ChangeAction::CopyFile { source } => copy_new(source, &target),
            ChangeAction::MoveFile { destination, .. } => {
                move_file(&target, &self.root.join(destination))
            }
            ChangeAction::UpdateConfig { config } => {
                merge_pyproject(&target, config).map_err(|e| ChangeError::Config {
                    path: target.clone(),
                    message: format!("{e:#}"),
                })
            }
            ChangeAction::SetupWorkflows { source } => copy_workflows(source, &target),
        }
    }

    fn setup_environment(&self) -> Result<()> {
        for argv in &self.finalize.environment {
            self.runner.run(argv, self.root)?;
        }
        Ok(())
    }

    /// Create the doc tiers and copy missing documentation from the
    /// template, replacing the placeholder with the project name.
    fn setup_documentation(&self, project: &ProjectConfig) -> Result<()> {
        if !project.features.docs {
            return Ok(());
        }
        for (dir, _) in DOC_DIRS {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).with_context(|| format!("creating {}", path.display()))?;
        }

        let Some(template) = self.template_root else {
            return Ok(());
        };
        for rel in &self.finalize.doc_files {
            let source = template.join(rel);
            let target = self.root.join(rel);
            if target.exists() || !source.is_file() {
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            match fs::read_to_string(&source) {
                Ok(text) => {
                    let text = text.replace(&self.finalize.placeholder, &project.name);
                    fs::write(&target, text)
                        .with_context(|| format!("writing {}", target.display()))?;
                }
                // not text: copy verbatim
                Err(_) => {
                    fs::copy(&source, &target)
                        .with_context(|| format!("copying {}", source.display()))?;
                }
            }
        }
        Ok(())
    }

    fn setup_hooks(&self) -> Result<()> {
        let target = self.root.join(HOOK_CONFIG);
        if let Some(template) = self.template_root {
            let source = template.join(HOOK_CONFIG);
            if !target.exists() && source.is_file() {
                fs::copy(&source, &target)
                    .with_context(|| format!("copying {}", source.display()))?;
            }
        }
        for argv in &self.finalize.hooks {
            self.runner.run(argv, self.root)?;
        }
        Ok(())
    }

    /// Remove cache artefacts, then empty directories (deepest first).
    ///
    /// Declared directories, the `keep` set and anything under a protected
    /// directory survive.
    fn cleanup(&self, keep: &BTreeSet<String>, observer: &dyn Observer) -> Result<()> {
        let protected = IgnoreRules::new(&self.finalize.protected_dirs)?;
        let cache = IgnoreRules::new(&self.finalize.cache_patterns)?;
        let snapshot = FileWalker::new(protected).walk(self.root, observer);

        let mut removed: Vec<PathBuf> = Vec::new();
        let entries = snapshot
            .dirs
            .iter()
            .map(|d| (d, true))
            .chain(snapshot.files.iter().map(|f| (f, false)));
        for (rel, is_dir) in entries {
            if !cache.matches(rel) || removed.iter().any(|r| rel.starts_with(r)) {
                continue;
            }
            let path = self.root.join(rel);
            let result = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed.push(rel.clone()),
                Err(e) => observer.on_warning(&format!("could not remove {}: {e}", path.display())),
            }
        }

        let mut dirs: Vec<&PathBuf> = snapshot
            .dirs
            .iter()
            .filter(|d| !removed.iter().any(|r| d.starts_with(r)))
            .collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

        for rel in dirs {
            let text = rel_string(rel);
            if self.structure.directory(&text).is_some() || keep.contains(&text) {
                continue;
            }
            let path = self.root.join(rel);
            let is_empty = fs::read_dir(&path)
                .map(|mut it| it.next().is_none())
                .unwrap_or(false);
            if !is_empty {
                continue;
            }
            if let Err(e) = fs::remove_dir(&path) {
                observer.on_warning(&format!("could not remove {}: {e}", path.display()));
            }
        }
        Ok(())
    }
}

/// Copy `source` to `target` unless `target` already exists.
fn copy_new(source: &Path, target: &Path) -> Result<(), ChangeError> {
    if !source.is_file() {
        return Err(ChangeError::MissingSource(source.to_path_buf()));
    }
    if target.exists() {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::copy(source, target).map_err(io_err(target))?;
    Ok(())
}

fn move_file(source: &Path, destination: &Path) -> Result<(), ChangeError> {
    if !source.exists() {
        return Err(ChangeError::MissingSource(source.to_path_buf()));
    }
    if destination.exists() {
        return Err(ChangeError::DestinationExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    if fs::rename(source, destination).is_err() {
        // cross-device: copy then remove
        fs::copy(source, destination).map_err(io_err(destination))?;
        fs::remove_file(source).map_err(io_err(source))?;
    }
    Ok(())
}

/// Copy reusable workflow definitions into `target`, keeping existing files.
fn copy_workflows(source: &Path, target: &Path) -> Result<(), ChangeError> {
    if !source.is_dir() {
        return Err(ChangeError::MissingSource(source.to_path_buf()));
    }
    let matcher = Glob::new(WORKFLOW_GLOB)
        .map(|g| g.compile_matcher())
        .map_err(|e| ChangeError::Io {
            path: source.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

    fs::create_dir_all(target).map_err(io_err(target))?;
    let mut entries: Vec<PathBuf> = fs::read_dir(source)
        .map_err(io_err(source))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name() else {
            continue;
        };
        if matcher.is_match(name) {
            copy_new(&path, &target.join(name))?;
        }
    }
    Ok(())
}
