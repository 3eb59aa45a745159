//! # Run Subcommand
//!
//! Sweeps on a fixed interval until Ctrl-C or `--max-sweeps` is reached.
//! Each tick re-reads the state file and rewrites it after the sweep, so
//! commands run between ticks are picked up rather than overwritten.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use deposit_core::{Clock, SystemClock};
use tokio::time::MissedTickBehavior;

use crate::state::sweep_state_file;
use crate::sweep::print_report;
use crate::{CliContext, EXIT_CONSISTENCY};

/// Arguments for `deposit run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seconds between sweeps. Overrides `sweep_interval_secs` from config.
    #[arg(long)]
    pub interval_secs: Option<u64>,

    /// Stop after this many sweeps.
    #[arg(long)]
    pub max_sweeps: Option<u64>,
}

/// Execute `deposit run`.
///
/// Returns exit code 2 if any sweep hit a consistency violation.
pub fn run_run(args: &RunArgs, ctx: &CliContext) -> Result<u8> {
    let period = match args.interval_secs {
        Some(0) => anyhow::bail!("--interval-secs must be positive"),
        Some(secs) => Duration::from_secs(secs),
        None => ctx.config.sweep_interval(),
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(sweep_loop(ctx, period, args.max_sweeps))
}

async fn sweep_loop(ctx: &CliContext, period: Duration, max_sweeps: Option<u64>) -> Result<u8> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = period.as_secs(),
        state = %ctx.state_file.display(),
        "deadline scheduler started"
    );

    let mut sweeps = 0u64;
    let mut fatal = false;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = sweep_state_file(ctx, clock.clone())?;
                if !report.is_empty() {
                    print_report(&report);
                }
                fatal |= report.has_fatal();
                sweeps += 1;
                tracing::debug!(sweeps, actions = report.actions.len(), "sweep complete");
                if max_sweeps.is_some_and(|max| sweeps >= max) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(sweeps, "shutdown requested");
                break;
            }
        }
    }

    Ok(if fatal { EXIT_CONSISTENCY } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deposit_engine::EngineConfig;

    #[test]
    fn bounded_run_stops() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext {
            config: EngineConfig::default(),
            state_file: dir.path().join("state.json"),
        };
        let args = RunArgs {
            interval_secs: Some(1),
            max_sweeps: Some(1),
        };
        assert_eq!(run_run(&args, &ctx).unwrap(), 0);
        assert!(ctx.state_file.exists());
    }

    #[test]
    fn records_written_between_ticks_survive() {
        use chrono::{Duration as ChronoDuration, TimeZone, Utc};
        use deposit_core::{ManualClock, PartyId};
        use deposit_engine::{DepositRepository, InMemoryRepository, NewTenancy};
        use deposit_ledger::{EmploymentType, PropertyDetails, TenantProfile};
        use rust_decimal_macros::dec;

        use crate::state::{load_snapshot, open_service, persist};

        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext {
            config: EngineConfig::default(),
            state_file: dir.path().join("state.json"),
        };

        // Ticks land at 0s, 1s and 2s; the tenancy is written at 1.5s.
        let runner = {
            let ctx = ctx.clone();
            std::thread::spawn(move || {
                let args = RunArgs {
                    interval_secs: Some(1),
                    max_sweeps: Some(3),
                };
                run_run(&args, &ctx)
            })
        };
        std::thread::sleep(Duration::from_millis(1500));

        let now = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        let writer = open_service(&ctx, Arc::new(ManualClock::new(now))).unwrap();
        let (tenancy, account) = writer
            .open_tenancy(NewTenancy {
                landlord_id: PartyId::new(),
                tenant_id: PartyId::new(),
                lease_start: now - ChronoDuration::days(30),
                lease_end: now + ChronoDuration::days(300),
                monthly_rent: dec!(1250),
                profile: TenantProfile {
                    employment_type: EmploymentType::Corporate,
                    credit_score: Some(760),
                    has_guarantor: false,
                    has_pets: false,
                },
                property: PropertyDetails::default(),
            })
            .unwrap();
        persist(&ctx, &writer).unwrap();

        assert_eq!(runner.join().unwrap().unwrap(), 0);

        let repo = InMemoryRepository::from_snapshot(load_snapshot(&ctx.state_file).unwrap())
            .unwrap();
        let tenancies = repo.tenancies();
        assert_eq!(tenancies.len(), 1);
        assert_eq!(tenancies[0].id, tenancy.id);
        assert_eq!(repo.account(account.id).unwrap().amount, account.amount);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext {
            config: EngineConfig::default(),
            state_file: dir.path().join("state.json"),
        };
        let args = RunArgs {
            interval_secs: Some(0),
            max_sweeps: Some(1),
        };
        assert!(run_run(&args, &ctx).is_err());
    }
}
