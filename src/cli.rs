use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::core::plan::CollisionPolicy;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "reorg")]
#[command(about = "Reorganize a repository to match a template structure")]
#[command(version, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a reorg.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the repository to reorganize
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Template repository to copy missing files from
    #[arg(long, value_name = "DIR")]
    pub template_path: Option<PathBuf>,

    /// Branch to commit on (default: refactor/reorganize-<timestamp>)
    #[arg(long)]
    pub branch_name: Option<String>,

    /// Answer yes to every prompt
    #[arg(long)]
    pub no_input: bool,

    /// Skip Docker configuration
    #[arg(long)]
    pub no_docker: bool,

    /// Skip GitHub Actions workflows
    #[arg(long)]
    pub no_github_actions: bool,

    /// Skip documentation setup
    #[arg(long)]
    pub no_docs: bool,

    /// Configuration override file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Python version written to the project configuration
    #[arg(long)]
    pub python_version: Option<String>,

    /// Scan files for common security issues and exit
    #[arg(long)]
    pub security_check: bool,

    /// Survey and analyze the project, show the plan, and exit
    #[arg(long)]
    pub analyze: bool,

    /// What to do when several files resolve to one destination
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictArg>,

    /// Do not create a branch or commit
    #[arg(long)]
    pub no_commit: bool,

    /// Print the plan as JSON instead of a listing
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConflictArg {
    /// Later path wins
    KeepLast,
    /// Earlier path wins
    KeepFirst,
    /// Move none of the colliding files
    Error,
}

impl From<ConflictArg> for CollisionPolicy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::KeepLast => CollisionPolicy::KeepLast,
            ConflictArg::KeepFirst => CollisionPolicy::KeepFirst,
            ConflictArg::Error => CollisionPolicy::Error,
        }
    }
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Directory to write the script into
    #[arg(long, value_name = "DIR", required_unless_present = "stdout")]
    pub out_dir: Option<PathBuf>,

    /// Print the script instead of writing a file
    #[arg(long)]
    pub stdout: bool,
}

impl CompletionsArgs {
    /// Emit the completion script for `reorg`.
    pub fn run(self, ctx: &AppContext) -> Result<()> {
        let mut cmd = Cli::command();
        let bin = cmd.get_name().to_string();

        let Some(dir) = self.out_dir.filter(|_| !self.stdout) else {
            clap_complete::generate(self.shell, &mut cmd, bin, &mut std::io::stdout());
            return Ok(());
        };
        if ctx.dry_run {
            println!("Would write {} completion to {}", self.shell, dir.display());
            return Ok(());
        }

        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let path = clap_complete::generate_to(self.shell, &mut cmd, bin, &dir)
            .with_context(|| format!("writing {} completion", self.shell))?;
        if !ctx.quiet {
            eprintln!("Wrote completion to {}", path.display());
        }
        Ok(())
    }
}
