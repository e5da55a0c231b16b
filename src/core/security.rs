//! Line-based security pattern scan.
//!
//! Findings are advisory: they are printed, never acted upon.

use std::fs;
use std::path::Path;

use anyhow::Result;
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::core::pattern::rel_string;
use crate::infra::walk::WalkSnapshot;
use crate::observer::Observer;

/// Files above this size are not scanned
const MAX_SCAN_BYTES: u64 = 1024 * 1024;

const CHECKS: [(&str, &str); 3] = [
    (
        "hardcoded_secrets",
        r#"(?i)(password|secret|token|key).*?['"][^'"]+['"]"#,
    ),
    (
        "sql_injection",
        r#"(?i)execute\(['"][^'"]*%[^'"]*['"]"#,
    ),
    ("debug_code", r"(?i)(print|console\.log|debug)\("),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub check: &'static str,
    pub path: String,
    pub line: usize,
    pub excerpt: String,
}

pub struct SecurityScanner {
    checks: Vec<(&'static str, Regex)>,
}

impl SecurityScanner {
    pub fn new() -> Result<Self> {
        let checks = CHECKS
            .iter()
            .map(|(name, pattern)| Ok((*name, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { checks })
    }

    /// Findings in one file's text, one per matching (line, check).
    pub fn scan_text(&self, rel: &str, text: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            for (check, re) in &self.checks {
                if re.is_match(line) {
                    findings.push(Finding {
                        check: *check,
                        path: rel.to_string(),
                        line: idx + 1,
                        excerpt: line.trim().chars().take(120).collect(),
                    });
                }
            }
        }
        findings
    }

    /// Scan every walked file under `root`; unreadable or binary files are skipped.
    pub fn scan(&self, root: &Path, snapshot: &WalkSnapshot, observer: &dyn Observer) -> Vec<Finding> {
        let mut findings = Vec::new();
        for rel in &snapshot.files {
            let path = root.join(rel);
            let too_big = fs::metadata(&path)
                .map(|m| m.len() > MAX_SCAN_BYTES)
                .unwrap_or(true);
            if too_big {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(text) => findings.extend(self.scan_text(&rel_string(rel), &text)),
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {}
                Err(e) => observer.on_warning(&format!("not scanned {}: {e}", path.display())),
            }
        }
        findings
    }
}

/// Findings grouped by check, in check order.
pub fn group_by_check(findings: &[Finding]) -> IndexMap<&'static str, Vec<&Finding>> {
    let mut groups: IndexMap<&'static str, Vec<&Finding>> =
        CHECKS.iter().map(|(name, _)| (*name, Vec::new())).collect();
    for f in findings {
        groups.entry(f.check).or_default().push(f);
    }
    groups.retain(|_, v| !v.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::observer::MemoryObserver;

    #[test]
    fn each_check_fires_on_its_pattern() {
        let scanner = SecurityScanner::new().unwrap();
        let text = "API_KEY = \"abc123\"\ncursor.execute(\"SELECT * FROM t WHERE id = %s\" % x)\nprint(value)\nx = 1\n";

        let findings = scanner.scan_text("app.py", text);
        let hits: Vec<(&str, usize)> = findings.iter().map(|f| (f.check, f.line)).collect();

        assert!(hits.contains(&("hardcoded_secrets", 1)));
        assert!(hits.contains(&("sql_injection", 2)));
        assert!(hits.contains(&("debug_code", 3)));
        assert!(!hits.iter().any(|(_, line)| *line == 4));
    }

    #[test]
    fn scan_skips_binary_files_and_groups_by_check() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.py"), "print('hi')\n").unwrap();
        fs::write(tmp.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let snapshot = WalkSnapshot {
            dirs: BTreeSet::new(),
            files: BTreeSet::from([PathBuf::from("a.py"), PathBuf::from("blob.bin")]),
        };
        let obs = MemoryObserver::new();

        let findings = SecurityScanner::new()
            .unwrap()
            .scan(tmp.path(), &snapshot, &obs);

        assert_eq!(findings.len(), 1);
        assert!(obs.warnings().is_empty());
        let groups = group_by_check(&findings);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["debug_code"]);
    }
}
