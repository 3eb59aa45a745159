//! # Breakdown Subcommand

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use deposit_core::{AccountId, SystemClock};
use uuid::Uuid;

use crate::state::open_service;
use crate::{CliContext, EXIT_CONSISTENCY};

/// Arguments for `deposit breakdown`.
#[derive(Args, Debug)]
pub struct BreakdownArgs {
    /// Deposit account UUID.
    pub account: Uuid,

    /// Print the breakdown as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `deposit breakdown`.
///
/// Returns exit code 2 if the account's ledger does not reconcile.
pub fn run_breakdown(args: &BreakdownArgs, ctx: &CliContext) -> Result<u8> {
    let service = open_service(ctx, Arc::new(SystemClock))?;
    let account_id = AccountId::from_uuid(args.account);

    let breakdown = match service.get_breakdown(account_id) {
        Ok(b) => b,
        Err(e) if e.is_fatal() => {
            tracing::error!(%account_id, error = %e, "breakdown halted");
            return Ok(EXIT_CONSISTENCY);
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(0);
    }

    println!("Deposit:      {} ({})", breakdown.account_id, breakdown.account_status);
    println!("Phase:        {:?}", breakdown.phase);
    println!("Total:        {} {}", breakdown.total_deposit, breakdown.currency);
    println!("To landlord:  {}", breakdown.released_to_landlord);
    println!("To tenant:    {}", breakdown.refunded_to_tenant);
    println!("In escrow:    {}", breakdown.remaining_in_escrow);
    println!("Open claims:  {}", breakdown.open_claims);
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deposit_engine::EngineConfig;

    fn ctx(dir: &tempfile::TempDir) -> CliContext {
        CliContext {
            config: EngineConfig::default(),
            state_file: dir.path().join("state.json"),
        }
    }

    #[test]
    fn unknown_account_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = BreakdownArgs {
            account: Uuid::new_v4(),
            json: false,
        };
        let err = run_breakdown(&args, &ctx(&dir)).unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }
}
