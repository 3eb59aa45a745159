//! # Sweep Subcommand
//!
//! Runs the deadline scheduler once against the state file and writes the
//! result back. `--at` pins the sweep instant, which is how past or future
//! deadlines are replayed.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use deposit_core::{Clock, ManualClock, SystemClock};
use deposit_engine::SweepReport;

use crate::state::sweep_state_file;
use crate::{CliContext, EXIT_CONSISTENCY};

/// Arguments for `deposit sweep`.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Sweep instant (RFC 3339). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Parse an RFC 3339 instant into UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid --at timestamp: {value}"))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Execute `deposit sweep`.
///
/// Returns exit code 2 if any item hit a consistency violation.
pub fn run_sweep(args: &SweepArgs, ctx: &CliContext) -> Result<u8> {
    let clock: Arc<dyn Clock> = match &args.at {
        Some(at) => Arc::new(ManualClock::new(parse_instant(at)?)),
        None => Arc::new(SystemClock),
    };
    let report = sweep_state_file(ctx, clock)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(exit_code(&report))
}

/// Exit code for a sweep report.
pub fn exit_code(report: &SweepReport) -> u8 {
    if report.has_fatal() {
        EXIT_CONSISTENCY
    } else {
        0
    }
}

pub(crate) fn print_report(report: &SweepReport) {
    println!(
        "Sweep at {}: {} action(s), {} failure(s)",
        report.swept_at.to_rfc3339(),
        report.actions.len(),
        report.failures.len()
    );
    for action in &report.actions {
        println!("  OK    [{}] {} {}", action.step, action.entity, action.detail);
    }
    for failure in &report.failures {
        let label = if failure.fatal { "FATAL" } else { "FAIL " };
        println!("  {label} [{}] {} {}", failure.step, failure.entity, failure.error);
    }
}
