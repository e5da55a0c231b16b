//! File classification and destination synthesis.
//!
//! Globs follow gitignore conventions: a pattern without `/` matches the last
//! path component anywhere in the tree, a pattern with `/` is anchored at the
//! project root. `*` never crosses a directory boundary.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::infra::config::{ConfigError, FilePattern, ReorgConfig};

/// Named substitution variables extracted from one path.
pub type PathVariables = BTreeMap<String, String>;

/// How a category derives its destination variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableRule {
    /// `module_path` = relative path, source root collapsed
    Source,
    /// `test_tier` from the directory segments, `module_path` = file name
    Test,
    /// `doc_tier` from the parent path
    Documentation,
    /// `name` only
    #[default]
    Plain,
}

/// Recoverable classification failure; the file stays unclassified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("{path}: no category matches")]
    NoCategory { path: String },

    #[error("{path}: destination `{template}` of `{category}` needs variable `{variable}`")]
    MissingVariable {
        path: String,
        category: String,
        template: String,
        variable: String,
    },

    #[error("{path}: malformed destination template `{template}`")]
    MalformedTemplate { path: String, template: String },
}

/// Category and variables for one classified path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub variables: PathVariables,
}

/// Classified path plus its synthesized destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub category: String,
    pub variables: PathVariables,
    pub destination: String,
}

/// Forward-slash rendering of a relative path, used for matching and output.
pub fn rel_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn compile_glob(pattern: &str) -> Result<Glob, ConfigError> {
    let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
    let normalized = if trimmed.contains('/') {
        trimmed.to_string()
    } else {
        format!("**/{trimmed}")
    };

    GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map_err(|source| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            source,
        })
}

fn compile_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    builder.build().map_err(|source| ConfigError::InvalidGlob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Ignore rules, applied before any other classification.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    set: GlobSet,
}

impl IgnoreRules {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            set: compile_set(patterns)?,
        })
    }

    /// True when `rel` itself matches a rule.
    pub fn matches(&self, rel: &Path) -> bool {
        self.set.is_match(rel_string(rel))
    }

    /// True when `rel` or any of its ancestors matches a rule.
    pub fn is_ignored(&self, rel: &Path) -> bool {
        rel.ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.matches(p))
    }
}

#[derive(Debug)]
struct CompiledCategory {
    pattern: FilePattern,
    include: GlobSet,
    exclude: GlobSet,
}

/// Ordered category matcher; the first category that accepts a path wins.
#[derive(Debug)]
pub struct PatternMatcher {
    categories: Vec<CompiledCategory>,
    source_root: String,
}

impl PatternMatcher {
    pub fn new(patterns: &[FilePattern], source_root: &str) -> Result<Self, ConfigError> {
        let categories = patterns
            .iter()
            .map(|p| {
                Ok(CompiledCategory {
                    pattern: p.clone(),
                    include: compile_set(&p.include)?,
                    exclude: compile_set(&p.exclude)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            categories,
            source_root: source_root.to_string(),
        })
    }

    pub fn from_config(cfg: &ReorgConfig) -> Result<Self, ConfigError> {
        Self::new(&cfg.file_patterns, &cfg.source_root)
    }

    /// Category of `rel`: any include glob makes it a candidate, any exclude
    /// glob voids it.
    pub fn category_of(&self, rel: &Path) -> Option<&FilePattern> {
        let text = rel_string(rel);
        self.categories
            .iter()
            .find(|c| c.include.is_match(&text) && !c.exclude.is_match(&text))
            .map(|c| &c.pattern)
    }

    /// `(category?, variables)` for `rel`.
    pub fn classify(&self, rel: &Path) -> Option<Classification> {
        let pattern = self.category_of(rel)?;
        Some(Classification {
            category: pattern.category.clone(),
            variables: extract_variables(pattern.rule, rel, &self.source_root),
        })
    }

    /// Classify `rel` and render its category's destination template.
    pub fn place(&self, rel: &Path) -> Result<Placement, ClassifyError> {
        let path = rel_string(rel);
        let pattern = self
            .category_of(rel)
            .ok_or_else(|| ClassifyError::NoCategory { path: path.clone() })?;
        let variables = extract_variables(pattern.rule, rel, &self.source_root);

        let destination =
            render_template(&pattern.destination, &variables).map_err(|e| match e {
                TemplateError::Missing(variable) => ClassifyError::MissingVariable {
                    path: path.clone(),
                    category: pattern.category.clone(),
                    template: pattern.destination.clone(),
                    variable,
                },
                TemplateError::Malformed => ClassifyError::MalformedTemplate {
                    path: path.clone(),
                    template: pattern.destination.clone(),
                },
            })?;

        Ok(Placement {
            category: pattern.category.clone(),
            variables,
            destination,
        })
    }
}

/// Derive the substitution variables for `rel` under `rule`.
pub fn extract_variables(rule: VariableRule, rel: &Path, source_root: &str) -> PathVariables {
    let segments: Vec<String> = rel_string(rel)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let name = segments.last().cloned().unwrap_or_default();
    let parents = &segments[..segments.len().saturating_sub(1)];

    let mut vars = PathVariables::new();
    vars.insert("name".to_string(), name.clone());

    match rule {
        VariableRule::Source => {
            vars.insert(
                "module_path".to_string(),
                collapse_source_root(&segments, source_root),
            );
        }
        VariableRule::Test => {
            let tier = if parents.iter().any(|s| s == "integration") {
                "integration"
            } else if parents.iter().any(|s| s == "e2e") {
                "e2e"
            } else {
                "unit"
            };
            vars.insert("test_tier".to_string(), tier.to_string());
            vars.insert("module_path".to_string(), name);
        }
        VariableRule::Documentation => {
            let parent = parents.join("/");
            let tier = if parent.contains("api") {
                "api"
            } else if parent.contains("guide") {
                "guides"
            } else {
                "development"
            };
            vars.insert("doc_tier".to_string(), tier.to_string());
        }
        VariableRule::Plain => {}
    }

    vars
}

/// Drop repeated source-root segments and a leading one, so a file already
/// under the source root maps back onto itself.
fn collapse_source_root(segments: &[String], source_root: &str) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for seg in segments {
        if seg == source_root && out.last() == Some(&source_root) {
            continue;
        }
        out.push(seg.as_str());
    }
    if out.len() > 1 && out.first() == Some(&source_root) {
        out.remove(0);
    }
    out.join("/")
}

#[derive(Debug, PartialEq, Eq)]
enum TemplateError {
    Missing(String),
    Malformed,
}

/// Substitute `{var}` placeholders.
fn render_template(template: &str, vars: &PathVariables) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or(TemplateError::Malformed)?;
        let key = &after[..close];
        if key.is_empty() || key.contains('{') {
            return Err(TemplateError::Malformed);
        }
        let value = vars
            .get(key)
            .ok_or_else(|| TemplateError::Missing(key.to_string()))?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(TemplateError::Malformed);
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PatternMatcher {
        PatternMatcher::from_config(&ReorgConfig::default()).expect("default patterns compile")
    }

    #[test]
    fn top_level_source_moves_under_src() {
        let placed = matcher().place(Path::new("foo.py")).unwrap();
        assert_eq!(placed.category, "python_source");
        assert_eq!(placed.destination, "src/foo.py");
    }

    #[test]
    fn source_root_is_not_nested_again() {
        let m = matcher();
        assert_eq!(m.place(Path::new("src/foo.py")).unwrap().destination, "src/foo.py");
        assert_eq!(m.place(Path::new("src/src/x.py")).unwrap().destination, "src/x.py");
        assert_eq!(
            m.place(Path::new("src/pkg/mod.py")).unwrap().destination,
            "src/pkg/mod.py"
        );
        assert_eq!(
            m.place(Path::new("lib/util.py")).unwrap().destination,
            "src/lib/util.py"
        );
    }

    #[test]
    fn integration_test_variables() {
        let c = matcher()
            .classify(Path::new("integration/test_bar.py"))
            .unwrap();
        assert_eq!(c.category, "python_test");
        assert_eq!(c.variables["test_tier"], "integration");
        assert_eq!(c.variables["module_path"], "test_bar.py");

        let placed = matcher().place(Path::new("integration/test_bar.py")).unwrap();
        assert_eq!(placed.destination, "tests/integration/test_bar.py");
    }

    #[test]
    fn test_tier_defaults_to_unit_and_detects_e2e() {
        let m = matcher();
        assert_eq!(
            m.place(Path::new("test_a.py")).unwrap().destination,
            "tests/unit/test_a.py"
        );
        assert_eq!(
            m.place(Path::new("qa/e2e/test_flow.py")).unwrap().destination,
            "tests/e2e/test_flow.py"
        );
        // a tier word inside the file name is not a segment
        assert_eq!(
            m.place(Path::new("test_integration_db.py")).unwrap().destination,
            "tests/unit/test_integration_db.py"
        );
    }

    #[test]
    fn doc_tiers() {
        let m = matcher();
        assert_eq!(
            m.place(Path::new("notes/api/endpoints.md")).unwrap().destination,
            "docs/api/endpoints.md"
        );
        assert_eq!(
            m.place(Path::new("user-guide/start.rst")).unwrap().destination,
            "docs/guides/start.rst"
        );
        assert_eq!(
            m.place(Path::new("design.md")).unwrap().destination,
            "docs/development/design.md"
        );
    }

    #[test]
    fn exclude_beats_include() {
        let m = matcher();
        // README.md matches `*.md` but is excluded from documentation
        assert!(m.classify(Path::new("README.md")).is_none());
        // test files are excluded from source and picked up by the next category
        assert_eq!(
            m.classify(Path::new("pkg/test_x.py")).unwrap().category,
            "python_test"
        );
    }

    #[test]
    fn anchored_patterns_only_match_from_root() {
        let m = matcher();
        assert_eq!(
            m.classify(Path::new(".github/workflows/ci.yml")).unwrap().category,
            "github_workflow"
        );
        assert!(m.classify(Path::new("nested/.github/workflows/ci.yml")).is_none());
    }

    #[test]
    fn unmatched_path_has_no_category() {
        let m = matcher();
        assert!(m.classify(Path::new("assets/logo.png")).is_none());
        assert!(matches!(
            m.place(Path::new("assets/logo.png")),
            Err(ClassifyError::NoCategory { .. })
        ));
    }

    #[test]
    fn missing_variable_is_reported_not_fatal() {
        let patterns = vec![FilePattern {
            category: "data".into(),
            rule: VariableRule::Plain,
            include: vec!["*.csv".into()],
            exclude: vec![],
            destination: "data/{test_tier}/{name}".into(),
        }];
        let m = PatternMatcher::new(&patterns, "src").unwrap();
        let err = m.place(Path::new("x.csv")).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::MissingVariable { ref variable, .. } if variable == "test_tier"
        ));
    }

    #[test]
    fn malformed_template() {
        let vars = PathVariables::from([("name".to_string(), "a".to_string())]);
        assert_eq!(render_template("x/{name", &vars), Err(TemplateError::Malformed));
        assert_eq!(render_template("x/name}", &vars), Err(TemplateError::Malformed));
        assert_eq!(render_template("x/{name}", &vars), Ok("x/a".to_string()));
    }

    #[test]
    fn ignore_rules_are_prefix_based() {
        let rules = IgnoreRules::new(&[".git".into(), "*.pyc".into(), "build/".into()]).unwrap();
        assert!(rules.is_ignored(Path::new(".git")));
        assert!(rules.is_ignored(Path::new(".git/objects/ab/cdef")));
        assert!(rules.is_ignored(Path::new("pkg/mod.pyc")));
        assert!(rules.is_ignored(Path::new("build/lib/x.py")));
        assert!(!rules.is_ignored(Path::new("src/build.py")));
        assert!(!rules.matches(Path::new(".git/HEAD")));
    }
}
