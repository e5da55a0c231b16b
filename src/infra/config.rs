use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::pattern::{IgnoreRules, PatternMatcher, VariableRule};
use crate::core::plan::CollisionPolicy;

/// Name of the per-project configuration file
pub const CONFIG_FILE: &str = "reorg.toml";

/// Configuration load/validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    #[error("invalid glob `{pattern}`: {source}")]
    InvalidGlob
    {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("category `{0}` is declared more than once")]
    DuplicateCategory(String),

    #[error("category `{0}` has no include patterns")]
    EmptyInclude(String),

    #[error("structure entry `{0}` is declared more than once")]
    DuplicateStructurePath(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReorgConfig
{
    /// Also honour .gitignore files while walking
    pub respect_gitignore: bool,

    /// Layout segment collapsed out of `module_path` (e.g. `src`)
    pub source_root: String,

    /// What to do when two files resolve to the same destination
    pub collision: CollisionPolicy,

    /// Root of the template repository (source of copyable defaults)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,

    /// Report file written at the project root
    pub report_file: String,

    /// Paths never visited (prefix based)
    pub ignore_patterns: Vec<String>,

    /// Ordered classification categories; first match wins
    pub file_patterns: Vec<FilePattern>,

    /// Required layout
    pub structure: RequiredStructure,

    /// Explicit project metadata (falls back to pyproject.toml, then git)
    pub project: ProjectSettings,

    /// Optional plan sections
    pub features: Features,

    /// Post-plan finalization steps
    pub finalize: FinalizeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePattern
{
    pub category: String,

    /// Variable derivation applied to members of this category
    #[serde(default)]
    pub rule: VariableRule,

    pub include: Vec<String>,

    /// Exclusions win over inclusions
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Destination template with `{var}` placeholders
    pub destination: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequiredStructure
{
    pub directories: Vec<DirectorySpec>,
    pub files: Vec<FileSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorySpec
{
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec
{
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Copy from the template root when missing
    #[serde(default = "default_true")]
    pub from_template: bool,
    /// Destination override (defaults to `path`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSettings
{
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
}

/// Feature toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Features
{
    pub docs: bool,
    pub ci: bool,
    pub docker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinalizeConfig
{
    /// Text replaced by the project name in copied documentation
    pub placeholder: String,

    /// Dependency-manager commands, run in order
    pub environment: Vec<Vec<String>>,

    /// Hook installation commands, run in order
    pub hooks: Vec<Vec<String>>,

    /// Documentation files copied from the template when absent
    pub doc_files: Vec<String>,

    /// Build/cache artefacts removed during cleanup
    pub cache_patterns: Vec<String>,

    /// Directories cleanup never descends into
    pub protected_dirs: Vec<String>,
}

fn default_true() -> bool
{
    true
}

impl Default for Features
{
    fn default() -> Self
    {
        Self { docs: true, ci: true, docker: true }
    }
}

impl Default for FinalizeConfig
{
    fn default() -> Self
    {
        Self {
            placeholder: "ecosphere-project".to_string(),
            environment: vec![strings(&["poetry", "install"])],
            hooks: vec![strings(&["poetry", "run", "pre-commit", "install"])],
            doc_files: strings(&[
                "docs/index.md",
                "docs/guides/quickstart.md",
                "docs/development/guide.md",
                "docs/api/reference.md",
                "mkdocs.yml",
            ]),
            cache_patterns: strings(&["__pycache__", "*.pyc", "*.egg-info"]),
            protected_dirs: strings(&[".git", ".venv", "venv", "node_modules"]),
        }
    }
}

impl Default for ReorgConfig
{
    fn default() -> Self
    {
        Self {
            respect_gitignore: false,
            source_root: "src".to_string(),
            collision: CollisionPolicy::default(),
            template_path: None,
            report_file: "reorganization_report.md".to_string(),
            ignore_patterns: strings(&[
                ".git",
                "__pycache__",
                "*.pyc",
                ".pytest_cache",
                ".mypy_cache",
                ".ruff_cache",
                "*.egg-info",
                "build",
                "dist",
                ".env",
                ".venv",
                "node_modules",
                "reorganization_report.md",
            ]),
            file_patterns: default_file_patterns(),
            structure: default_structure(),
            project: ProjectSettings::default(),
            features: Features::default(),
            finalize: FinalizeConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String>
{
    items
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_file_patterns() -> Vec<FilePattern>
{
    let pattern = |category: &str,
                   rule: VariableRule,
                   include: &[&str],
                   exclude: &[&str],
                   destination: &str| FilePattern {
        category: category.to_string(),
        rule,
        include: strings(include),
        exclude: strings(exclude),
        destination: destination.to_string(),
    };

    vec![
        pattern(
            "python_source",
            VariableRule::Source,
            &["*.py"],
            &["test_*.py", "conftest.py"],
            "src/{module_path}",
        ),
        pattern(
            "python_test",
            VariableRule::Test,
            &["test_*.py", "conftest.py"],
            &[],
            "tests/{test_tier}/{module_path}",
        ),
        pattern(
            "documentation",
            VariableRule::Documentation,
            &["*.md", "*.rst"],
            &["README.md", "CHANGELOG.md", "LICENSE.md"],
            "docs/{doc_tier}/{name}",
        ),
        pattern(
            "github_workflow",
            VariableRule::Plain,
            &[".github/workflows/*.yml", ".github/workflows/*.yaml"],
            &[],
            ".github/workflows/{name}",
        ),
        pattern(
            "docker",
            VariableRule::Plain,
            &["Dockerfile*", "docker-compose*.yml", "docker-compose*.yaml"],
            &[],
            "{name}",
        ),
        pattern(
            "config",
            VariableRule::Plain,
            &["*.toml", "*.ini", "*.cfg", "*.conf", ".env*"],
            &[],
            "{name}",
        ),
    ]
}

fn default_structure() -> RequiredStructure
{
    let dir = |path: &str, description: &str| DirectorySpec {
        path: path.to_string(),
        description: description.to_string(),
        required: true,
    };
    let file = |path: &str, description: &str| FileSpec {
        path: path.to_string(),
        description: description.to_string(),
        required: true,
        from_template: true,
        destination: None,
    };

    RequiredStructure {
        directories: vec![
            dir(".github/workflows", "GitHub Actions workflow configurations"),
            dir("docs", "Project documentation"),
            dir("src", "Source code directory"),
            dir("tests", "Test files"),
            dir("scripts", "Utility and automation scripts"),
        ],
        files: vec![
            file("README.md", "Project documentation"),
            file("LICENSE", "Project license"),
            file(".gitignore", "Git ignore rules"),
            file("pyproject.toml", "Project configuration and dependencies"),
            file(".pre-commit-config.yaml", "Pre-commit hook configuration"),
            file("Dockerfile", "Docker configuration"),
            file("docker-compose.yml", "Docker Compose configuration"),
            file("Makefile", "Build automation"),
            file("mkdocs.yml", "Documentation configuration"),
            // placed by documentation setup; never reported missing
            FileSpec {
                required: false,
                from_template: false,
                ..file("docs/index.md", "Documentation home page")
            },
        ],
    }
}

impl RequiredStructure
{
    pub fn directory(
        &self,
        path: &str,
    ) -> Option<&DirectorySpec>
    {
        self.directories
            .iter()
            .find(|d| d.path == path)
    }

    pub fn file(
        &self,
        path: &str,
    ) -> Option<&FileSpec>
    {
        self.files
            .iter()
            .find(|f| f.path == path)
    }
}

impl ReorgConfig
{
    /// Reject configurations that would only fail later, at first use.
    pub fn validate(&self) -> Result<(), ConfigError>
    {
        let mut categories = std::collections::HashSet::new();
        for pattern in &self.file_patterns
        {
            if !categories.insert(pattern.category.as_str())
            {
                return Err(ConfigError::DuplicateCategory(pattern.category.clone()));
            }
            if pattern
                .include
                .is_empty()
            {
                return Err(ConfigError::EmptyInclude(pattern.category.clone()));
            }
        }

        let mut paths = std::collections::HashSet::new();
        let declared = self
            .structure
            .directories
            .iter()
            .map(|d| d.path.as_str())
            .chain(
                self.structure
                    .files
                    .iter()
                    .map(|f| f.path.as_str()),
            );
        for path in declared
        {
            if !paths.insert(path)
            {
                return Err(ConfigError::DuplicateStructurePath(path.to_string()));
            }
        }

        // Compile every glob once so bad patterns surface at load time
        PatternMatcher::new(&self.file_patterns, &self.source_root)?;
        IgnoreRules::new(&self.ignore_patterns)?;
        IgnoreRules::new(&self.finalize.cache_patterns)?;

        Ok(())
    }
}

/// Load configuration for the project at `root`.
///
/// Precedence (lowest first): built-in defaults, `<root>/reorg.toml`,
/// the explicit override file, then `REORG_<SECTION>__<KEY>` environment
/// variables.
pub fn load_config(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<ReorgConfig>
{
    let mut builder = config::Config::builder();

    let project_file = root.join(CONFIG_FILE);
    if project_file.is_file()
    {
        builder = builder.add_source(config::File::from(project_file));
    }

    if let Some(path) = explicit
    {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("REORG")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: ReorgConfig = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    parsed
        .validate()
        .context("Invalid configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILE);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = ReorgConfig::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
