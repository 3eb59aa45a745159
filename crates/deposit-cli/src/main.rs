//! # deposit CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deposit_cli::breakdown::{run_breakdown, BreakdownArgs};
use deposit_cli::quote::{run_quote, QuoteArgs};
use deposit_cli::run::{run_run, RunArgs};
use deposit_cli::sweep::{run_sweep, SweepArgs};
use deposit_cli::CliContext;

/// Tenancy deposit escrow: deposit quotes, fund breakdowns, and the
/// deadline scheduler.
#[derive(Parser, Debug)]
#[command(name = "deposit", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the engine configuration (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the JSON state file.
    #[arg(long, global = true, default_value = "deposit-state.json")]
    state: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute a risk-adjusted deposit amount.
    Quote(QuoteArgs),

    /// Show how an account's deposit splits between landlord, tenant, and escrow.
    Breakdown(BreakdownArgs),

    /// Run one deadline sweep and save the result.
    Sweep(SweepArgs),

    /// Run deadline sweeps on an interval until interrupted.
    Run(RunArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "deposit CLI starting");

    let config = cli.config.as_deref();
    let state = cli.state.as_path();
    let result = match cli.command {
        Commands::Quote(args) => run_quote(&args),
        Commands::Breakdown(args) => with_context(config, state, |ctx| run_breakdown(&args, ctx)),
        Commands::Sweep(args) => with_context(config, state, |ctx| run_sweep(&args, ctx)),
        Commands::Run(args) => with_context(config, state, |ctx| run_run(&args, ctx)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn with_context(
    config: Option<&Path>,
    state: &Path,
    f: impl FnOnce(&CliContext) -> anyhow::Result<u8>,
) -> anyhow::Result<u8> {
    let ctx = CliContext::load(config, state.to_path_buf())?;
    f(&ctx)
}
