//! Structure analysis: one walk of the project tree diffed against the
//! required layout.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::core::pattern::{IgnoreRules, PatternMatcher, rel_string};
use crate::infra::config::RequiredStructure;
use crate::infra::walk::FileWalker;
use crate::observer::Observer;

/// Outcome of one analysis pass. Paths are root-relative, `/`-separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub missing_dirs: BTreeSet<String>,
    pub missing_files: BTreeSet<String>,
    /// Reorganization candidates: files not yet where the layout wants them
    pub unclassified_files: BTreeSet<String>,
    /// Every walked file, declared or not
    #[serde(skip)]
    pub present_files: BTreeSet<String>,
}

impl AnalysisResult {
    pub fn is_conforming(&self) -> bool {
        self.missing_dirs.is_empty()
            && self.missing_files.is_empty()
            && self.unclassified_files.is_empty()
    }
}

pub struct StructureAnalyzer<'a> {
    walker: FileWalker,
    structure: &'a RequiredStructure,
    matcher: &'a PatternMatcher,
}

impl<'a> StructureAnalyzer<'a> {
    pub fn new(
        rules: IgnoreRules,
        structure: &'a RequiredStructure,
        matcher: &'a PatternMatcher,
    ) -> Self {
        Self {
            walker: FileWalker::new(rules),
            structure,
            matcher,
        }
    }

    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.walker = self.walker.with_gitignore(respect);
        self
    }

    /// Walk `root` and diff it against the required structure.
    ///
    /// Only an unusable root is an error; individual unreadable paths are
    /// reported to `observer` and skipped.
    pub fn analyze(&self, root: &Path, observer: &dyn Observer) -> Result<AnalysisResult> {
        if !root.is_dir() {
            bail!("project root {} is not a readable directory", root.display());
        }

        let snapshot = self.walker.walk(root, observer);
        let dirs: BTreeSet<String> = snapshot.dirs.iter().map(|p| rel_string(p)).collect();
        let files: BTreeSet<String> = snapshot.files.iter().map(|p| rel_string(p)).collect();

        let missing_dirs = self
            .structure
            .directories
            .iter()
            .filter(|d| d.required && !dirs.contains(&d.path))
            .map(|d| d.path.clone())
            .collect();

        let missing_files = self
            .structure
            .files
            .iter()
            .filter(|f| f.required && !files.contains(&f.path))
            .map(|f| f.path.clone())
            .collect();

        let unclassified_files = snapshot
            .files
            .iter()
            .filter(|rel| !self.is_in_place(rel))
            .map(|rel| rel_string(rel))
            .collect();

        Ok(AnalysisResult {
            missing_dirs,
            missing_files,
            unclassified_files,
            present_files: files,
        })
    }

    /// A declared structure file, or a categorized file sitting at its own
    /// destination.
    fn is_in_place(&self, rel: &Path) -> bool {
        let text = rel_string(rel);
        if self.structure.file(&text).is_some() {
            return true;
        }
        matches!(self.matcher.place(rel), Ok(p) if p.destination == text)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::infra::config::ReorgConfig;
    use crate::observer::MemoryObserver;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "").unwrap();
    }

    fn run(root: &Path, cfg: &ReorgConfig) -> AnalysisResult {
        let matcher = PatternMatcher::from_config(cfg).unwrap();
        let rules = IgnoreRules::new(&cfg.ignore_patterns).unwrap();
        StructureAnalyzer::new(rules, &cfg.structure, &matcher)
            .analyze(root, &MemoryObserver::new())
            .unwrap()
    }

    #[test]
    fn reports_missing_structure_and_candidates() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "foo.py");
        touch(root, "src/ok.py");
        touch(root, "README.md");
        touch(root, "logo.png");
        touch(root, "__pycache__/foo.cpython-312.pyc");

        let cfg = ReorgConfig::default();
        let result = run(root, &cfg);

        assert!(result.missing_dirs.contains("docs"));
        assert!(result.missing_dirs.contains("tests"));
        assert!(!result.missing_dirs.contains("src"));
        assert!(result.missing_files.contains("LICENSE"));
        assert!(!result.missing_files.contains("README.md"));
        assert_eq!(
            result.unclassified_files,
            BTreeSet::from(["foo.py".to_string(), "logo.png".to_string()])
        );
    }

    #[test]
    fn optional_entries_are_never_missing() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = ReorgConfig::default();
        for d in &mut cfg.structure.directories {
            d.required = false;
        }
        for f in &mut cfg.structure.files {
            f.required = false;
        }

        let result = run(tmp.path(), &cfg);
        assert!(result.missing_dirs.is_empty());
        assert!(result.missing_files.is_empty());
    }

    #[test]
    fn analysis_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "a/b/c.py");
        touch(root, "notes.md");
        touch(root, "integration/test_x.py");

        let cfg = ReorgConfig::default();
        assert_eq!(run(root, &cfg), run(root, &cfg));
    }

    #[test]
    fn missing_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let cfg = ReorgConfig::default();
        let matcher = PatternMatcher::from_config(&cfg).unwrap();
        let rules = IgnoreRules::new(&cfg.ignore_patterns).unwrap();
        let analyzer = StructureAnalyzer::new(rules, &cfg.structure, &matcher);

        assert!(
            analyzer
                .analyze(&tmp.path().join("nope"), &MemoryObserver::new())
                .is_err()
        );
    }
}
