//! # Fund Release
//!
//! Derives where a deposit's money stands from the account and its claims,
//! and applies the final split when the inspection window closes.
//!
//! - `released_to_landlord` is the sum of approved amounts on resolved
//!   claims. It must equal the releases booked on the account.
//! - `remaining_in_escrow` is the sum of claimed amounts on open claims.
//! - `refunded_to_tenant` is the rest. Before finalization it is a
//!   projection; [`FundReleaseCalculator::finalize`] books it.
//!
//! Every computed breakdown is checked against
//! `released + refunded + remaining == total`. A failure is a
//! [`ConsistencyError`], never a recoverable rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use deposit_claims::{Claim, ClaimStatus};
use deposit_core::{AccountId, ClaimId, Decimal};

use crate::account::{DepositAccount, DepositStatus};
use crate::error::{ConsistencyError, LedgerError};

/// Where the account is in its release lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleasePhase {
    /// At least one submitted claim is unresolved.
    Contested,
    /// No open claims; waiting for the inspection window to close.
    AwaitingFinalization,
    /// Remaining funds have been refunded.
    Finalized,
}

/// The current split of a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundBreakdown {
    /// The account.
    pub account_id: AccountId,
    /// Currency of every amount below.
    pub currency: String,
    /// Total deposit.
    pub total_deposit: Decimal,
    /// Approved claim amounts released to the landlord.
    pub released_to_landlord: Decimal,
    /// Amount refunded (or, before finalization, refundable) to the tenant.
    pub refunded_to_tenant: Decimal,
    /// Amount held back by open claims.
    pub remaining_in_escrow: Decimal,
    /// Number of open claims.
    pub open_claims: usize,
    /// Account status at computation time.
    pub account_status: DepositStatus,
    /// Release phase.
    pub phase: ReleasePhase,
}

/// Computes breakdowns and finalizes accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FundReleaseCalculator;

impl FundReleaseCalculator {
    /// Compute the breakdown of `account` from `claims`.
    ///
    /// `claims` must be every claim filed against the account. Drafts are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotInEscrow`] before the funds are held.
    /// - [`LedgerError::Consistency`] if the ledger does not reconcile.
    pub fn breakdown(
        account: &DepositAccount,
        claims: &[Claim],
    ) -> Result<FundBreakdown, LedgerError> {
        if matches!(account.status, DepositStatus::Pending | DepositStatus::Paid) {
            return Err(LedgerError::NotInEscrow {
                account_id: account.id,
                status: account.status.as_str().to_string(),
            });
        }
        let totals = ClaimTotals::collect(account, claims)?;

        if totals.released != account.released_amount {
            return Err(ConsistencyError::LedgerMismatch {
                account_id: account.id,
                booked: account.released_amount,
                derived: totals.released,
            }
            .into());
        }

        let (refunded, remaining, phase) = if account.status.is_terminal() {
            let residual = account.remaining_amount() + totals.contested;
            if totals.open > 0 || !residual.is_zero() {
                return Err(ConsistencyError::ResidualAfterFinalization {
                    account_id: account.id,
                    residual,
                }
                .into());
            }
            (
                account.refunded_amount,
                account.remaining_amount(),
                ReleasePhase::Finalized,
            )
        } else {
            let refundable = account.refunded_amount + account.remaining_amount() - totals.contested;
            let phase = if totals.open > 0 {
                ReleasePhase::Contested
            } else {
                ReleasePhase::AwaitingFinalization
            };
            (refundable, totals.contested, phase)
        };

        let breakdown = FundBreakdown {
            account_id: account.id,
            currency: account.currency.clone(),
            total_deposit: account.amount,
            released_to_landlord: totals.released,
            refunded_to_tenant: refunded,
            remaining_in_escrow: remaining,
            open_claims: totals.open,
            account_status: account.status,
            phase,
        };
        Self::reconcile(&breakdown)?;
        Ok(breakdown)
    }

    /// Check `released + refunded + remaining == total` with no negative
    /// component.
    ///
    /// # Errors
    ///
    /// [`ConsistencyError`] describing the first violation found.
    pub fn reconcile(breakdown: &FundBreakdown) -> Result<(), ConsistencyError> {
        for (component, value) in [
            ("released_to_landlord", breakdown.released_to_landlord),
            ("refunded_to_tenant", breakdown.refunded_to_tenant),
            ("remaining_in_escrow", breakdown.remaining_in_escrow),
        ] {
            if value < Decimal::ZERO {
                return Err(ConsistencyError::NegativeComponent {
                    account_id: breakdown.account_id,
                    component,
                    value,
                });
            }
        }
        let sum = breakdown.released_to_landlord
            + breakdown.refunded_to_tenant
            + breakdown.remaining_in_escrow;
        if sum != breakdown.total_deposit {
            return Err(ConsistencyError::ReconciliationFailed {
                account_id: breakdown.account_id,
                total: breakdown.total_deposit,
                released: breakdown.released_to_landlord,
                refunded: breakdown.refunded_to_tenant,
                remaining: breakdown.remaining_in_escrow,
            });
        }
        Ok(())
    }

    /// Refund everything left in escrow to the tenant and move the account
    /// to its terminal status.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AlreadyFinalized`] on a finalized account.
    /// - [`LedgerError::NotInEscrow`] before the funds are held.
    /// - [`LedgerError::ClaimsStillOpen`] while any claim is open.
    /// - [`LedgerError::Consistency`] if the ledger does not reconcile.
    pub fn finalize(
        account: &mut DepositAccount,
        claims: &[Claim],
        now: DateTime<Utc>,
    ) -> Result<FundBreakdown, LedgerError> {
        if account.status.is_terminal() {
            return Err(LedgerError::AlreadyFinalized {
                account_id: account.id,
            });
        }
        let before = Self::breakdown(account, claims)?;
        if before.open_claims > 0 {
            return Err(LedgerError::ClaimsStillOpen {
                account_id: account.id,
                open: before.open_claims,
            });
        }
        let refund = account.apply_finalization(now);
        let after = Self::breakdown(account, claims)?;
        tracing::info!(
            account_id = %account.id,
            status = %account.status,
            released = %after.released_to_landlord,
            refunded = %refund,
            "deposit finalized"
        );
        Ok(after)
    }

    /// Escrow a new claim may still take: the remainder minus what other
    /// open claims hold back. Never negative.
    pub fn available_for_claims(
        account: &DepositAccount,
        claims: &[Claim],
        excluding: Option<ClaimId>,
    ) -> Decimal {
        let held: Decimal = claims
            .iter()
            .filter(|c| c.account_id == account.id && Some(c.id) != excluding)
            .map(Claim::contested_amount)
            .sum();
        (account.remaining_amount() - held).max(Decimal::ZERO)
    }
}

struct ClaimTotals {
    released: Decimal,
    contested: Decimal,
    open: usize,
}

impl ClaimTotals {
    fn collect(account: &DepositAccount, claims: &[Claim]) -> Result<Self, ConsistencyError> {
        let mut totals = Self {
            released: Decimal::ZERO,
            contested: Decimal::ZERO,
            open: 0,
        };
        for claim in claims {
            if claim.account_id != account.id {
                return Err(ConsistencyError::ForeignClaim {
                    account_id: account.id,
                    claim_id: claim.id,
                });
            }
            match claim.status {
                ClaimStatus::Resolved => {
                    if let Some(approved) = claim.approved_amount.filter(|a| *a > Decimal::ZERO) {
                        totals.released += approved;
                    }
                }
                status if status.is_open() => {
                    totals.contested += claim.claimed_amount;
                    totals.open += 1;
                }
                _ => {}
            }
        }
        Ok(totals)
    }
}
