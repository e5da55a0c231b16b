//! Markdown reorganization report and the analysis-only project survey.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::Serialize;

use crate::core::analyze::AnalysisResult;
use crate::core::execute::ExecutedChanges;
use crate::core::plan::{ChangeKind, Plan, group_by_kind};
use crate::infra::config::{Features, RequiredStructure};
use crate::infra::walk::WalkSnapshot;

/// Repository facts shown at the top of the report.
#[derive(Debug, Clone, Default)]
pub struct RepositoryInfo {
    pub name: String,
    pub branch: Option<String>,
    pub remote: Option<String>,
}

/// Everything one report is rendered from.
pub struct ReportInput<'a> {
    pub repository: &'a RepositoryInfo,
    pub analysis: &'a AnalysisResult,
    pub plan: &'a Plan,
    pub executed: &'a ExecutedChanges,
    pub structure: &'a RequiredStructure,
    pub features: Features,
    pub generated_at: DateTime<Local>,
}

/// Render the Markdown report.
pub fn generate_report(input: &ReportInput<'_>) -> String {
    let mut out = String::new();

    out.push_str("# Repository Reorganization Report\n\n");
    let _ = writeln!(out, "Date: {}\n", input.generated_at.format("%Y-%m-%d %H:%M:%S"));

    out.push_str("## Repository Information\n\n");
    let repo = input.repository;
    let _ = writeln!(out, "* Repository: {}", repo.name);
    if let Some(branch) = &repo.branch {
        let _ = writeln!(out, "* Branch: {branch}");
    }
    if let Some(remote) = &repo.remote {
        let _ = writeln!(out, "* Remote: {remote}");
    }

    write_analysis(&mut out, input);
    write_changes(&mut out, input.executed);
    write_features(&mut out, input.features);

    out.push_str("## Next Steps\n\n");
    out.push_str("1. Review the changes and test the repository\n");
    out.push_str("2. Update documentation as needed\n");
    out.push_str("3. Configure repository settings (branch protection, secrets, variables)\n");
    out.push_str("4. Re-run the reorganizer; a conforming tree yields an empty plan\n");

    out
}

fn write_analysis(out: &mut String, input: &ReportInput<'_>) {
    let analysis = input.analysis;
    out.push_str("\n## Structure Analysis\n\n");

    if analysis.is_conforming() {
        out.push_str("The repository already matches the required structure.\n");
        return;
    }

    if !analysis.missing_dirs.is_empty() {
        out.push_str("### Missing Directories\n\n");
        for dir in &analysis.missing_dirs {
            let _ = writeln!(out, "* `{dir}`");
            if let Some(spec) = input.structure.directory(dir).filter(|d| !d.description.is_empty()) {
                let _ = writeln!(out, "  - {}", spec.description);
            }
        }
        out.push('\n');
    }

    if !analysis.missing_files.is_empty() {
        out.push_str("### Missing Files\n\n");
        for file in &analysis.missing_files {
            let _ = writeln!(out, "* `{file}`");
            if let Some(spec) = input.structure.file(file).filter(|f| !f.description.is_empty()) {
                let _ = writeln!(out, "  - {}", spec.description);
            }
        }
        out.push('\n');
    }

    if !analysis.unclassified_files.is_empty() {
        let destinations: BTreeMap<&str, &str> = input
            .plan
            .of_kind(ChangeKind::MoveFile)
            .filter_map(|r| Some((r.path.as_str(), r.destination()?)))
            .collect();

        out.push_str("### Files to Reorganize\n\n");
        for file in &analysis.unclassified_files {
            let _ = writeln!(out, "* `{file}`");
            if let Some(dest) = destinations.get(file.as_str()) {
                let _ = writeln!(out, "  - → `{dest}`");
            }
        }
        out.push('\n');
    }
}

fn write_changes(out: &mut String, executed: &ExecutedChanges) {
    if executed.applied.is_empty() && executed.failed.is_empty() {
        return;
    }

    out.push_str("## Changes Made\n\n");
    for (kind, records) in group_by_kind(&executed.applied) {
        let _ = writeln!(out, "### {}\n", kind.title());
        for r in records.into_iter().sorted_by(|a, b| a.path.cmp(&b.path)) {
            let _ = writeln!(out, "* `{}`", r.path);
            if !r.description.is_empty() {
                let _ = writeln!(out, "  - {}", r.description);
            }
            if let Some(dest) = r.destination() {
                let _ = writeln!(out, "  - → `{dest}`");
            }
        }
        out.push('\n');
    }

    if !executed.failed.is_empty() {
        out.push_str("### Failed\n\n");
        for f in &executed.failed {
            let _ = writeln!(out, "* `{}` ({}): {}", f.record.path, f.record.kind(), f.message);
        }
        out.push('\n');
    }
}

fn write_features(out: &mut String, features: Features) {
    if !(features.docs || features.ci || features.docker) {
        return;
    }
    out.push_str("## Template Features Added\n\n");
    if features.docs {
        out.push_str("* Documentation: MkDocs site with API, guide and development sections\n");
    }
    if features.ci {
        out.push_str("* CI/CD: reusable GitHub Actions workflows\n");
    }
    if features.docker {
        out.push_str("* Containerization: Dockerfile and Compose configuration\n");
    }
    out.push('\n');
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: &'static str,
    pub severity: Severity,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub kind: &'static str,
    pub message: &'static str,
}

/// Quick health survey of a project tree.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSurvey {
    pub name: String,
    pub language: String,
    /// File count per lower-cased extension
    pub extensions: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
}

fn language_of(ext: &str) -> &'static str {
    match ext {
        "py" => "Python",
        "js" | "jsx" | "mjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "rs" => "Rust",
        "go" => "Go",
        _ => "Unknown",
    }
}

/// Survey `snapshot` (as walked from `root`).
pub fn survey(root: &Path, snapshot: &WalkSnapshot) -> ProjectSurvey {
    let extensions: BTreeMap<String, usize> = snapshot
        .files
        .iter()
        .filter_map(|f| f.extension())
        .map(|e| e.to_string_lossy().to_lowercase())
        .counts()
        .into_iter()
        .collect();

    // most frequent extension; ties go to the alphabetically first
    let language = extensions
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(ext, _)| language_of(ext))
        .unwrap_or("Unknown")
        .to_string();

    let has_file = |rel: &str| snapshot.files.contains(Path::new(rel));
    let has_dir = |rel: &str| snapshot.dirs.contains(Path::new(rel));

    let mut issues = Vec::new();
    if !has_file("README.md") {
        issues.push(Issue {
            kind: "documentation",
            severity: Severity::High,
            message: "Missing README.md file",
        });
    }
    if !has_file("LICENSE") {
        issues.push(Issue {
            kind: "license",
            severity: Severity::High,
            message: "Missing LICENSE file",
        });
    }
    let has_tests = snapshot.files.iter().any(|f| {
        f.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("test_") && n.ends_with(".py"))
    });
    if !has_tests {
        issues.push(Issue {
            kind: "testing",
            severity: Severity::Medium,
            message: "No test files found",
        });
    }

    let mut recommendations = Vec::new();
    if !has_dir("docs") {
        recommendations.push(Recommendation {
            kind: "documentation",
            message: "Add project documentation using MkDocs",
        });
    }
    if !has_dir(".github/workflows") {
        recommendations.push(Recommendation {
            kind: "ci_cd",
            message: "Add GitHub Actions workflows for CI/CD",
        });
    }
    if !has_file("Dockerfile") {
        recommendations.push(Recommendation {
            kind: "containerization",
            message: "Add Docker support for containerization",
        });
    }

    ProjectSurvey {
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        language,
        extensions,
        issues,
        recommendations,
    }
}
