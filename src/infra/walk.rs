//! Filepath: src/infra/walk.rs
//! Ignore-rule aware tree walker.
//! - Ignore rules prune whole subtrees (an ignored directory is never entered)
//! - Optional .gitignore / .git/info/exclude support
//! - Hidden files are included; symlinks are not followed
//! - Deterministic ordering for stable plans and tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};

use crate::core::pattern::IgnoreRules;
use crate::observer::Observer;

/// Directories and files discovered under a root, as root-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSnapshot
{
    pub dirs: BTreeSet<PathBuf>,
    pub files: BTreeSet<PathBuf>,
}

/// Walker over a project tree with prefix-based ignore rules.
pub struct FileWalker
{
    /// Compiled ignore rules
    rules: IgnoreRules,

    /// Honour .gitignore files; default false
    respect_gitignore: bool,
}

impl FileWalker
{
    pub fn new(rules: IgnoreRules) -> Self
    {
        Self { rules, respect_gitignore: false }
    }

    /// (Optional) Also apply .gitignore, .git/info/exclude and global gitignore.
    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.respect_gitignore = respect;
        self
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // Only our own rules decide what is skipped unless asked otherwise
        b.standard_filters(false);
        b.hidden(false);
        b.git_ignore(self.respect_gitignore);
        b.git_global(self.respect_gitignore);
        b.git_exclude(self.respect_gitignore);
        b.require_git(false);

        b.follow_links(false);
        b.sort_by_file_name(|a, b| a.cmp(b));

        // Prune ignored entries before descent (prefix semantics)
        let rules = self
            .rules
            .clone();
        let base = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            match ent
                .path()
                .strip_prefix(&base)
            {
                Ok(rel) if !rel
                    .as_os_str()
                    .is_empty() =>
                {
                    !rules.matches(rel)
                }
                _ => true,
            }
        });

        b
    }

    /// Walk `root` once. Per-entry failures (permissions, symlink loops) are
    /// reported to `observer` and skipped.
    pub fn walk(
        &self,
        root: &Path,
        observer: &dyn Observer,
    ) -> WalkSnapshot
    {
        let mut snapshot = WalkSnapshot::default();

        for result in self
            .build_walk(root)
            .build()
        {
            let entry = match result
            {
                Ok(entry) => entry,
                Err(err) =>
                {
                    observer.on_warning(&format!("skipping unreadable path: {err}"));
                    continue;
                }
            };

            // depth 0 is the root itself
            if entry.depth() == 0
            {
                continue;
            }

            let rel = match entry
                .path()
                .strip_prefix(root)
            {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };

            match entry.file_type()
            {
                Some(ft) if ft.is_dir() =>
                {
                    snapshot
                        .dirs
                        .insert(rel);
                }
                Some(ft) if ft.is_file() =>
                {
                    snapshot
                        .files
                        .insert(rel);
                }
                // dangling symlinks and special files are neither
                _ =>
                {}
            }
        }

        snapshot
    }
}
