//! Change records and plan construction.
//!
//! A [`Plan`] is an ordered list of independently executable
//! [`ChangeRecord`]s. Construction order is execution order: directories and
//! template copies first, then moves, then configuration and workflow setup,
//! so every move targets a directory that exists or can be created.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::analyze::AnalysisResult;
use crate::core::pattern::{ClassifyError, PatternMatcher};
use crate::core::project::ProjectConfig;
use crate::infra::config::RequiredStructure;
use crate::observer::Observer;

/// Standard documentation subdirectories created when docs are enabled.
pub const DOC_DIRS: [(&str, &str); 3] = [
    ("docs/api", "API documentation directory"),
    ("docs/guides", "User guides directory"),
    ("docs/development", "Development documentation directory"),
];

/// Workflow directory, relative to both the project and the template.
pub const WORKFLOW_DIR: &str = ".github/workflows";

/// Container definition files copied when containerization is enabled.
pub const CONTAINER_FILES: [(&str, &str); 2] = [
    ("Dockerfile", "Docker configuration"),
    ("docker-compose.yml", "Docker Compose configuration"),
];

/// Project configuration file updated by [`ChangeAction::UpdateConfig`].
pub const PROJECT_FILE: &str = "pyproject.toml";

/// Resolution when several files resolve to one destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Later path (in path order) wins; earlier ones are dropped with a warning
    #[default]
    KeepLast,
    /// Earlier path wins; later ones are dropped with a warning
    KeepFirst,
    /// No contender is moved; the collision is reported as an error
    Error,
}

/// Variant-specific payload of a change record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChangeAction {
    CreateDir,
    CopyFile { source: PathBuf },
    MoveFile { destination: String, category: String },
    UpdateConfig { config: ProjectConfig },
    SetupWorkflows { source: PathBuf },
}

/// Discriminant of [`ChangeAction`], used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    CreateDir,
    CopyFile,
    MoveFile,
    UpdateConfig,
    SetupWorkflows,
}

impl ChangeKind {
    /// Heading used in reports and commit messages.
    pub fn title(self) -> &'static str {
        match self {
            ChangeKind::CreateDir => "Create Dir",
            ChangeKind::CopyFile => "Copy File",
            ChangeKind::MoveFile => "Move File",
            ChangeKind::UpdateConfig => "Update Config",
            ChangeKind::SetupWorkflows => "Setup Workflows",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::CreateDir => "create_dir",
            ChangeKind::CopyFile => "copy_file",
            ChangeKind::MoveFile => "move_file",
            ChangeKind::UpdateConfig => "update_config",
            ChangeKind::SetupWorkflows => "setup_workflows",
        };
        f.write_str(s)
    }
}

/// One planned filesystem mutation. `path` is root-relative; for moves it is
/// the source, for everything else the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRecord {
    #[serde(flatten)]
    pub action: ChangeAction,
    pub path: String,
    pub description: String,
    pub required: bool,
}

impl ChangeRecord {
    pub fn create_dir(path: &str, description: &str, required: bool) -> Self {
        Self {
            action: ChangeAction::CreateDir,
            path: path.to_string(),
            description: description.to_string(),
            required,
        }
    }

    pub fn copy_file(source: PathBuf, path: &str, description: &str, required: bool) -> Self {
        Self {
            action: ChangeAction::CopyFile { source },
            path: path.to_string(),
            description: description.to_string(),
            required,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self.action {
            ChangeAction::CreateDir => ChangeKind::CreateDir,
            ChangeAction::CopyFile { .. } => ChangeKind::CopyFile,
            ChangeAction::MoveFile { .. } => ChangeKind::MoveFile,
            ChangeAction::UpdateConfig { .. } => ChangeKind::UpdateConfig,
            ChangeAction::SetupWorkflows { .. } => ChangeKind::SetupWorkflows,
        }
    }

    /// Destination of a move, if this is one.
    pub fn destination(&self) -> Option<&str> {
        match &self.action {
            ChangeAction::MoveFile { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

/// Ordered change records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    records: Vec<ChangeRecord>,
}

impl Plan {
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(move |r| r.kind() == kind)
    }

    /// True when nothing but idempotent bookkeeping remains: no moves and no
    /// template copies.
    pub fn is_noop(&self) -> bool {
        self.of_kind(ChangeKind::MoveFile).next().is_none()
            && self.of_kind(ChangeKind::CopyFile).next().is_none()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Group records by kind, preserving plan order inside each group.
pub fn group_by_kind<'a, I>(records: I) -> BTreeMap<ChangeKind, Vec<&'a ChangeRecord>>
where
    I: IntoIterator<Item = &'a ChangeRecord>,
{
    let mut groups: BTreeMap<ChangeKind, Vec<&ChangeRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.kind()).or_default().push(r);
    }
    groups
}

struct PlannedMove {
    source: String,
    destination: String,
    category: String,
}

/// Turns an [`AnalysisResult`] into a [`Plan`].
pub struct PlanBuilder<'a> {
    structure: &'a RequiredStructure,
    matcher: &'a PatternMatcher,
    template_root: Option<&'a Path>,
    collision: CollisionPolicy,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(structure: &'a RequiredStructure, matcher: &'a PatternMatcher) -> Self {
        Self {
            structure,
            matcher,
            template_root: None,
            collision: CollisionPolicy::default(),
        }
    }

    pub fn with_template_root(mut self, root: Option<&'a Path>) -> Self {
        self.template_root = root;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn build(
        &self,
        analysis: &AnalysisResult,
        project: &ProjectConfig,
        observer: &dyn Observer,
    ) -> Plan {
        let features = project.features;
        let moves = self.plan_moves(analysis, observer);
        let incoming: HashSet<String> = moves.iter().map(|m| m.destination.clone()).collect();

        let mut records = Vec::new();
        let mut planned: HashSet<String> = HashSet::new();

        // 1. missing directories
        for dir in &self.structure.directories {
            if analysis.missing_dirs.contains(&dir.path) && planned.insert(dir.path.clone()) {
                records.push(ChangeRecord::create_dir(
                    &dir.path,
                    &dir.description,
                    dir.required,
                ));
            }
        }

        // 2. missing template files
        let mut skipped_without_template = 0usize;
        for file in &self.structure.files {
            if !file.from_template || !analysis.missing_files.contains(&file.path) {
                continue;
            }
            let dest = file.destination.as_deref().unwrap_or(&file.path);
            if incoming.contains(dest) {
                observer.on_info(&format!(
                    "{dest}: not copied from template, an existing file moves there"
                ));
                continue;
            }
            let Some(template) = self.template_root else {
                skipped_without_template += 1;
                continue;
            };
            if planned.insert(dest.to_string()) {
                records.push(ChangeRecord::copy_file(
                    template.join(&file.path),
                    dest,
                    &file.description,
                    file.required,
                ));
            }
        }

        // 3. moves
        for m in moves {
            records.push(ChangeRecord {
                action: ChangeAction::MoveFile {
                    destination: m.destination,
                    category: m.category,
                },
                path: m.source,
                description: "Move to appropriate directory".to_string(),
                required: false,
            });
        }

        // 4. project configuration
        records.push(ChangeRecord {
            action: ChangeAction::UpdateConfig {
                config: project.clone(),
            },
            path: PROJECT_FILE.to_string(),
            description: "Update project configuration".to_string(),
            required: false,
        });

        // 5. documentation
        if features.docs {
            for (path, description) in DOC_DIRS {
                if planned.insert(path.to_string()) {
                    records.push(ChangeRecord::create_dir(path, description, false));
                }
            }
        }

        // 6. CI workflows
        if features.ci {
            if planned.insert(WORKFLOW_DIR.to_string()) {
                records.push(ChangeRecord::create_dir(
                    WORKFLOW_DIR,
                    "GitHub Actions workflows directory",
                    false,
                ));
            }
            match self.template_root {
                Some(template) => records.push(ChangeRecord {
                    action: ChangeAction::SetupWorkflows {
                        source: template.join(WORKFLOW_DIR),
                    },
                    path: WORKFLOW_DIR.to_string(),
                    description: "Set up GitHub Actions workflows".to_string(),
                    required: false,
                }),
                None => skipped_without_template += 1,
            }
        }

        // 7. containerization
        if features.docker {
            for (path, description) in CONTAINER_FILES {
                let present = analysis.present_files.contains(path)
                    || (self.structure.file(path).is_some_and(|f| f.required)
                        && !analysis.missing_files.contains(path));
                if present || planned.contains(path) || incoming.contains(path) {
                    continue;
                }
                let Some(template) = self.template_root else {
                    skipped_without_template += 1;
                    continue;
                };
                planned.insert(path.to_string());
                records.push(ChangeRecord::copy_file(
                    template.join(path),
                    path,
                    description,
                    false,
                ));
            }
        }

        if skipped_without_template > 0 {
            observer.on_warning(&format!(
                "no template root configured; {skipped_without_template} template change(s) left out of the plan"
            ));
        }

        Plan::new(records)
    }

    /// Classify every candidate and resolve destination collisions.
    fn plan_moves(&self, analysis: &AnalysisResult, observer: &dyn Observer) -> Vec<PlannedMove> {
        let mut candidates = Vec::new();

        // BTreeSet iteration gives path order
        for path in &analysis.unclassified_files {
            match self.matcher.place(Path::new(path)) {
                Ok(p) if p.destination == *path => {}
                Ok(p) => candidates.push(PlannedMove {
                    source: path.clone(),
                    destination: p.destination,
                    category: p.category,
                }),
                Err(e @ ClassifyError::NoCategory { .. }) => {
                    observer.on_info(&format!("left in place: {e}"));
                }
                Err(e) => observer.on_warning(&format!("left unclassified: {e}")),
            }
        }

        let mut by_destination: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, m) in candidates.iter().enumerate() {
            by_destination.entry(m.destination.as_str()).or_default().push(i);
        }

        let mut keep = vec![true; candidates.len()];
        for (dest, contenders) in &by_destination {
            if contenders.len() < 2 {
                continue;
            }
            let names: Vec<&str> = contenders
                .iter()
                .map(|&i| candidates[i].source.as_str())
                .collect();
            let winner = match self.collision {
                CollisionPolicy::KeepLast => contenders.last().copied(),
                CollisionPolicy::KeepFirst => contenders.first().copied(),
                CollisionPolicy::Error => None,
            };
            for &i in contenders {
                if Some(i) != winner {
                    keep[i] = false;
                }
            }
            match winner {
                Some(w) => observer.on_warning(&format!(
                    "{} resolve to {dest}; keeping {}, dropping the rest",
                    names.join(", "),
                    candidates[w].source
                )),
                None => observer.on_error(&format!(
                    "{} resolve to {dest}; none of them will be moved",
                    names.join(", ")
                )),
            }
        }

        candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(m, k)| k.then_some(m))
            .collect()
    }
}
