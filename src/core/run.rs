//! Top-level reorganization pipeline:
//! analyze → plan → confirm → execute → commit → report.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::{OwoColorize, Style};

use crate::cli::{AppContext, RunArgs};
use crate::core::analyze::{AnalysisResult, StructureAnalyzer};
use crate::core::execute::{ExecutedChanges, PlanExecutor};
use crate::core::git::{CommitOutcome, GitBoundary, read_identity};
use crate::core::pattern::{IgnoreRules, PatternMatcher};
use crate::core::plan::{ChangeAction, Plan, PlanBuilder};
use crate::core::project::ProjectConfig;
use crate::core::report::{ProjectSurvey, ReportInput, RepositoryInfo, generate_report, survey};
use crate::core::security::{SecurityScanner, group_by_check};
use crate::infra::config::{ReorgConfig, load_config};
use crate::infra::process::SystemRunner;
use crate::infra::walk::FileWalker;
use crate::observer::{Observer, TracingObserver};

/// Expand `~` and `$VAR` in a user-supplied path.
fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(s) => PathBuf::from(s.into_owned()),
        Err(_) => path.to_path_buf(),
    }
}

fn paint(ctx: &AppContext, style: Style) -> Style {
    if ctx.no_color { Style::new() } else { style }
}

/// Ask `prompt`; `--no-input` says yes, a non-interactive stdin says no.
fn confirm(prompt: &str, no_input: bool) -> Result<bool> {
    if no_input {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        tracing::warn!("stdin is not a terminal; answering no to: {prompt}");
        return Ok(false);
    }
    let answer = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;
    Ok(answer)
}

/// Apply CLI overrides on top of the loaded configuration.
fn apply_overrides(cfg: &mut ReorgConfig, args: &RunArgs) {
    if args.no_docs {
        cfg.features.docs = false;
    }
    if args.no_github_actions {
        cfg.features.ci = false;
    }
    if args.no_docker {
        cfg.features.docker = false;
    }
    if let Some(v) = &args.python_version {
        cfg.project.python_version = Some(v.clone());
    }
    if let Some(policy) = args.on_conflict {
        cfg.collision = policy.into();
    }
}

/// Template root from the CLI (relative to the cwd) or the config (relative
/// to the project root). A missing directory is warned about and ignored.
fn resolve_template(
    root: &Path,
    cli: Option<&Path>,
    cfg: Option<&Path>,
    observer: &dyn Observer,
) -> Option<PathBuf> {
    let candidate = match (cli, cfg) {
        (Some(p), _) => expand(p),
        (None, Some(p)) => root.join(expand(p)),
        (None, None) => return None,
    };
    match dunce::canonicalize(&candidate) {
        Ok(p) if p.is_dir() => Some(p),
        _ => {
            observer.on_warning(&format!(
                "template root {} is not a directory; template files will not be copied",
                candidate.display()
            ));
            None
        }
    }
}

pub fn run(args: RunArgs, ctx: &AppContext) -> Result<()> {
    let observer = TracingObserver;

    let requested = expand(&args.path);
    let root = dunce::canonicalize(&requested)
        .with_context(|| format!("Project root {} does not exist", requested.display()))?;

    let mut cfg = load_config(&root, args.config.as_deref().map(expand).as_deref())?;
    apply_overrides(&mut cfg, &args);

    let rules = IgnoreRules::new(&cfg.ignore_patterns)?;
    let matcher = PatternMatcher::from_config(&cfg)?;

    if args.security_check {
        return security_check(&root, &cfg, rules, ctx, args.json, &observer);
    }

    let analysis = StructureAnalyzer::new(rules.clone(), &cfg.structure, &matcher)
        .with_gitignore(cfg.respect_gitignore)
        .analyze(&root, &observer)?;

    let template = resolve_template(
        &root,
        args.template_path.as_deref(),
        cfg.template_path.as_deref(),
        &observer,
    );

    let project = ProjectConfig::resolve(
        &root,
        &cfg.project,
        cfg.features,
        &read_identity(&root),
        &observer,
    );

    let plan = PlanBuilder::new(&cfg.structure, &matcher)
        .with_template_root(template.as_deref())
        .with_collision_policy(cfg.collision)
        .build(&analysis, &project, &observer);

    if args.analyze {
        let snapshot = FileWalker::new(rules)
            .with_gitignore(cfg.respect_gitignore)
            .walk(&root, &observer);
        let survey = survey(&root, &snapshot);
        return print_analysis(ctx, args.json, &survey, &analysis, &plan);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else if !ctx.quiet {
        print_plan(ctx, &plan);
    }

    // unplaceable files alone do not warrant another pass
    if plan.is_noop() && analysis.missing_dirs.is_empty() && analysis.missing_files.is_empty() {
        if !ctx.quiet && !args.json {
            println!(
                "{}",
                "Repository already matches the template structure".style(paint(ctx, Style::new().green()))
            );
        }
        return Ok(());
    }

    if !ctx.dry_run && !confirm("Proceed with reorganization?", args.no_input)? {
        println!("Reorganization cancelled");
        return Ok(());
    }

    let runner = SystemRunner;
    let executed = PlanExecutor::new(&root, &cfg.structure, &cfg.finalize, &runner)
        .with_template_root(template.as_deref())
        .with_progress(!ctx.quiet)
        .execute(&plan, &project, ctx.dry_run, &observer);

    let git = if ctx.dry_run || args.no_commit {
        None
    } else {
        match GitBoundary::open(&root) {
            Ok(git) => Some(git),
            Err(e) => {
                observer.on_warning(&format!("skipping commit: {e}"));
                None
            }
        }
    };

    if let Some(git) = &git {
        if !executed.is_empty() && confirm("Commit changes to new branch?", args.no_input)? {
            commit(git, args.branch_name.as_deref(), &executed, &observer);
        }
    }

    // read-only lookups also work under --no-commit
    let repo_git = git.or_else(|| GitBoundary::open(&root).ok());
    let repository = RepositoryInfo {
        name: project.name.clone(),
        branch: repo_git.as_ref().and_then(|g| g.current_branch().ok()),
        remote: repo_git.as_ref().and_then(GitBoundary::remote_url),
    };
    let report = generate_report(&ReportInput {
        repository: &repository,
        analysis: &analysis,
        plan: &plan,
        executed: &executed,
        structure: &cfg.structure,
        features: cfg.features,
        generated_at: Local::now(),
    });

    if ctx.dry_run {
        if !args.json {
            println!("{report}");
        }
    } else {
        let path = root.join(&cfg.report_file);
        std::fs::write(&path, report)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        if !ctx.quiet && !args.json {
            println!("Report written to {}", path.display());
        }
    }

    if !ctx.quiet && !args.json {
        print_summary(ctx, &executed);
    }
    Ok(())
}

fn commit(git: &GitBoundary, branch: Option<&str>, executed: &ExecutedChanges, observer: &dyn Observer) {
    match git.commit_changes(branch, &executed.applied, observer) {
        Ok(CommitOutcome::Committed { branch, previous }) => {
            observer.on_info(&format!("committed on {branch} (branched from {previous})"));
        }
        Ok(CommitOutcome::NothingToCommit) => observer.on_info("nothing to commit"),
        Err(e) => observer.on_warning(&format!("commit failed: {e}")),
    }
}

fn print_plan(ctx: &AppContext, plan: &Plan) {
    let heading = paint(ctx, Style::new().bold());
    let kind_style = paint(ctx, Style::new().cyan());

    println!("{}", format!("Planned changes ({}):", plan.len()).style(heading));
    for r in plan {
        let target = match &r.action {
            ChangeAction::MoveFile { destination, .. } => format!("{} -> {destination}", r.path),
            _ => r.path.clone(),
        };
        println!(
            "  {:<16} {target}",
            r.kind().to_string().style(kind_style)
        );
    }
}

fn print_analysis(
    ctx: &AppContext,
    json: bool,
    survey: &ProjectSurvey,
    analysis: &AnalysisResult,
    plan: &Plan,
) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "survey": survey,
            "analysis": analysis,
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let heading = paint(ctx, Style::new().bold());
    let warn = paint(ctx, Style::new().yellow());

    println!("{}", format!("Project: {}", survey.name).style(heading));
    println!("Primary language: {}", survey.language);

    if !survey.issues.is_empty() {
        println!("\n{}", "Issues:".style(heading));
        for issue in &survey.issues {
            println!(
                "  [{}] {}",
                format!("{:?}", issue.severity).to_lowercase().style(warn),
                issue.message
            );
        }
    }
    if !survey.recommendations.is_empty() {
        println!("\n{}", "Recommendations:".style(heading));
        for rec in &survey.recommendations {
            println!("  - {}", rec.message);
        }
    }

    println!("\n{}", "Structure:".style(heading));
    for d in &analysis.missing_dirs {
        println!("  missing dir   {d}");
    }
    for f in &analysis.missing_files {
        println!("  missing file  {f}");
    }
    for f in &analysis.unclassified_files {
        println!("  misplaced     {f}");
    }
    println!();
    print_plan(ctx, plan);
    Ok(())
}

fn print_summary(ctx: &AppContext, executed: &ExecutedChanges) {
    if executed.dry_run {
        println!(
            "{}",
            "DRY RUN: no changes were applied".style(paint(ctx, Style::new().yellow()))
        );
        return;
    }
    println!(
        "{} {} change(s) applied",
        "✓".style(paint(ctx, Style::new().green())),
        executed.applied.len()
    );
    if !executed.failed.is_empty() {
        println!(
            "{} {} change(s) failed (see report)",
            "✗".style(paint(ctx, Style::new().red())),
            executed.failed.len()
        );
    }
}

fn security_check(
    root: &Path,
    cfg: &ReorgConfig,
    rules: IgnoreRules,
    ctx: &AppContext,
    json: bool,
    observer: &dyn Observer,
) -> Result<()> {
    let snapshot = FileWalker::new(rules)
        .with_gitignore(cfg.respect_gitignore)
        .walk(root, observer);
    let findings = SecurityScanner::new()?.scan(root, &snapshot, observer);

    if json {
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(());
    }
    if findings.is_empty() {
        println!("No security issues found");
        return Ok(());
    }

    let heading = paint(ctx, Style::new().bold().yellow());
    for (check, hits) in group_by_check(&findings) {
        println!("{}", format!("{check} ({})", hits.len()).style(heading));
        for f in hits {
            println!("  {}:{}  {}", f.path, f.line, f.excerpt);
        }
    }
    Ok(())
}
