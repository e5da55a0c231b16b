//! **reorg** - plan and apply a repository reorganization against a template layout
//!
//! One walk of the tree, one ordered plan of independent change records, one
//! execution pass that tolerates per-record failure, then an isolated commit
//! and a Markdown report.

/// Command-line interface with clap integration
pub mod cli;

/// Injected info/warning/error sink
pub mod observer;

/// Core pipeline
pub mod core {
    /// Category matching, path variables and destination templates
    pub mod pattern;
    pub use pattern::{Classification, ClassifyError, IgnoreRules, PatternMatcher, Placement};

    /// Diff of the walked tree against the required structure
    pub mod analyze;
    pub use analyze::{AnalysisResult, StructureAnalyzer};

    /// Change records and plan construction
    pub mod plan;
    pub use plan::{ChangeAction, ChangeKind, ChangeRecord, CollisionPolicy, Plan, PlanBuilder};

    /// Per-record execution and finalization steps
    pub mod execute;
    pub use execute::{ChangeError, ExecutedChanges, PlanExecutor};

    /// Project metadata resolution and pyproject.toml merge
    pub mod project;
    pub use project::ProjectConfig;

    /// Branch/commit isolation via the git executable
    pub mod git;
    pub use git::{GitBoundary, GitError};

    /// Markdown report and project survey
    pub mod report;
    pub use report::{generate_report, survey};

    /// Regex security scan
    pub mod security;

    /// CLI pipeline wiring
    pub mod run;
    pub use run::run;
}

/// Infrastructure - configuration, walking, subprocesses
pub mod infra {
    /// Typed configuration with layered loading
    pub mod config;
    pub use config::{ReorgConfig, init as config_init, load_config};

    /// Ignore-rule aware directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Opaque command execution
    pub mod process;
    pub use process::{CommandRunner, SystemRunner};
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{FileWalker, ReorgConfig, load_config};
pub use observer::{MemoryObserver, Observer, TracingObserver};
