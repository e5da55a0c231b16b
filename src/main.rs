use anyhow::Result;
use clap::Parser;
use reorg::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber; RUST_LOG wins over the CLI flags.
fn init_tracing(debug: bool, quiet: bool, no_color: bool) {
    let default_level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.quiet, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Some(Commands::Init(args)) => reorg::infra::config::init(args, &ctx),
        Some(Commands::Completions(args)) => args.run(&ctx),
        None => reorg::core::run(cli.run, &ctx),
    }
}
