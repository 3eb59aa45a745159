//! # Deposit Account
//!
//! The escrow ledger of one tenancy.
//!
//! Status machine: `Pending → Paid → HeldInEscrow → [PartiallyReleased |
//! Refunded | Claimed]`. The three terminal statuses are set only by
//! [`FundReleaseCalculator::finalize`](crate::FundReleaseCalculator::finalize).
//! Releases to the landlord are booked per claim while the account stays
//! `HeldInEscrow`.
//!
//! ## Invariant
//!
//! `released_amount + refunded_amount + remaining_amount() == amount`
//! holds by construction, and no booking may take either component past
//! the total.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use deposit_claims::Claim;
use deposit_core::{validate_currency, AccountId, ClaimId, Decimal, TenancyId, ValidationError};

use crate::calculation::DepositCalculation;
use crate::error::LedgerError;

/// The status of a deposit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    /// Created at agreement signing; not yet charged.
    Pending,
    /// Charge succeeded.
    Paid,
    /// Funds confirmed held in escrow.
    HeldInEscrow,
    /// Finalized with funds split between landlord and tenant. Terminal.
    PartiallyReleased,
    /// Finalized with everything returned to the tenant. Terminal.
    Refunded,
    /// Finalized with everything released to the landlord. Terminal.
    Claimed,
}

impl DepositStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::HeldInEscrow => "HELD_IN_ESCROW",
            Self::PartiallyReleased => "PARTIALLY_RELEASED",
            Self::Refunded => "REFUNDED",
            Self::Claimed => "CLAIMED",
        }
    }

    /// Whether the account has been finalized.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::PartiallyReleased | Self::Refunded | Self::Claimed
        )
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the tenant paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card charge.
    Card,
    /// Bank transfer.
    BankTransfer,
    /// Direct debit mandate.
    DirectDebit,
}

/// Outcome of the external charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Gateway reference.
    pub reference: String,
    /// Payment method.
    pub method: PaymentMethod,
    /// When the charge succeeded.
    pub paid_at: DateTime<Utc>,
}

/// Kinds of ledger bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Tenant's payment received.
    Payment,
    /// Funds placed in escrow.
    EscrowHold,
    /// Approved claim amount released to the landlord.
    ReleaseToLandlord,
    /// Remainder returned to the tenant at finalization.
    RefundToTenant,
}

/// One booking on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Booking kind.
    pub kind: LedgerEntryKind,
    /// Amount moved.
    pub amount: Decimal,
    /// External reference (payment, escrow, or claim).
    pub reference: String,
    /// The claim a release belongs to.
    pub claim_id: Option<ClaimId>,
    /// When it was booked.
    pub at: DateTime<Utc>,
}

/// Escrow ledger for one tenancy's deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositAccount {
    /// Unique account identifier.
    pub id: AccountId,
    /// Owning tenancy.
    pub tenancy_id: TenancyId,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Total deposit.
    pub amount: Decimal,
    /// Monthly rent the amount was derived from.
    pub calculation_base: Decimal,
    /// Multiplier applied to the rent.
    pub calculation_multiplier: Decimal,
    /// Current status.
    pub status: DepositStatus,
    /// Booked releases to the landlord.
    pub released_amount: Decimal,
    /// Booked refunds to the tenant.
    pub refunded_amount: Decimal,
    /// Payment outcome, once charged.
    pub payment: Option<PaymentRecord>,
    /// Escrow provider reference, once held.
    pub escrow_reference: Option<String>,
    /// When funds were confirmed held.
    pub held_at: Option<DateTime<Utc>>,
    /// When the account was finalized.
    pub finalized_at: Option<DateTime<Utc>>,
    /// Booking history.
    pub entries: Vec<LedgerEntry>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped on every committed update.
    pub version: u64,
}

impl DepositAccount {
    /// Create the account in [`Pending`](DepositStatus::Pending) from a calculation.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] for an invalid currency code.
    pub fn create(
        tenancy_id: TenancyId,
        calculation: &DepositCalculation,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let currency = currency.into();
        validate_currency(&currency)?;
        Ok(Self {
            id: AccountId::new(),
            tenancy_id,
            currency,
            amount: calculation.amount,
            calculation_base: calculation.monthly_rent,
            calculation_multiplier: calculation.final_multiplier,
            status: DepositStatus::Pending,
            released_amount: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
            payment: None,
            escrow_reference: None,
            held_at: None,
            finalized_at: None,
            entries: Vec::new(),
            created_at: now,
            version: 0,
        })
    }

    /// Pending → Paid.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidTransition`] unless `Pending`.
    pub fn mark_as_paid(
        &mut self,
        reference: impl Into<String>,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require(DepositStatus::Pending, "mark as paid")?;
        let reference = non_empty("payment reference", reference.into())?;
        self.book(LedgerEntryKind::Payment, self.amount, reference.clone(), None, now);
        self.payment = Some(PaymentRecord {
            reference,
            method,
            paid_at: now,
        });
        self.status = DepositStatus::Paid;
        Ok(())
    }

    /// Paid → HeldInEscrow.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidTransition`] unless `Paid`.
    pub fn mark_as_held_in_escrow(
        &mut self,
        escrow_reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.require(DepositStatus::Paid, "hold in escrow")?;
        let reference = non_empty("escrow reference", escrow_reference.into())?;
        self.book(
            LedgerEntryKind::EscrowHold,
            self.amount,
            reference.clone(),
            None,
            now,
        );
        self.escrow_reference = Some(reference);
        self.held_at = Some(now);
        self.status = DepositStatus::HeldInEscrow;
        Ok(())
    }

    /// `amount − released − refunded`.
    pub fn remaining_amount(&self) -> Decimal {
        self.amount - self.released_amount - self.refunded_amount
    }

    /// Whether a new claim may be filed.
    pub fn can_be_claimed(&self) -> bool {
        self.status == DepositStatus::HeldInEscrow && self.remaining_amount() > Decimal::ZERO
    }

    /// True when every submitted claim is resolved and nothing remains in
    /// escrow. Drafts hold no funds and are ignored.
    pub fn is_fully_resolved(&self, claims: &[Claim]) -> bool {
        let all_resolved = claims
            .iter()
            .filter(|c| c.account_id == self.id && c.submitted_at.is_some())
            .all(|c| c.status.is_terminal());
        all_resolved && self.remaining_amount() == Decimal::ZERO
    }

    /// Book the approved amount of a resolved claim as released to the
    /// landlord. Each claim is booked at most once.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotInEscrow`] unless `HeldInEscrow`.
    /// - [`LedgerError::DuplicateRelease`] if the claim was already booked.
    /// - [`LedgerError::InsufficientEscrow`] if `amount` exceeds the remainder.
    pub fn record_release(
        &mut self,
        claim_id: ClaimId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.status != DepositStatus::HeldInEscrow {
            return Err(LedgerError::NotInEscrow {
                account_id: self.id,
                status: self.status.as_str().to_string(),
            });
        }
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount {
                field: "release amount",
                value: amount,
            }
            .into());
        }
        if self.has_release_for(claim_id) {
            return Err(LedgerError::DuplicateRelease {
                account_id: self.id,
                claim_id,
            });
        }
        let remaining = self.remaining_amount();
        if amount > remaining {
            return Err(LedgerError::InsufficientEscrow {
                account_id: self.id,
                requested: amount,
                remaining,
            });
        }
        self.released_amount += amount;
        self.book(
            LedgerEntryKind::ReleaseToLandlord,
            amount,
            claim_id.to_string(),
            Some(claim_id),
            now,
        );
        tracing::info!(
            account_id = %self.id,
            claim_id = %claim_id,
            %amount,
            remaining = %self.remaining_amount(),
            "release to landlord booked"
        );
        Ok(())
    }

    /// Whether a release for `claim_id` has been booked.
    pub fn has_release_for(&self, claim_id: ClaimId) -> bool {
        self.entries
            .iter()
            .any(|e| e.kind == LedgerEntryKind::ReleaseToLandlord && e.claim_id == Some(claim_id))
    }

    /// Move the remainder to the tenant and set the terminal status.
    pub(crate) fn apply_finalization(&mut self, now: DateTime<Utc>) -> Decimal {
        let refund = self.remaining_amount();
        if refund > Decimal::ZERO {
            self.refunded_amount += refund;
            self.book(
                LedgerEntryKind::RefundToTenant,
                refund,
                self.tenancy_id.to_string(),
                None,
                now,
            );
        }
        self.status = if self.released_amount.is_zero() {
            DepositStatus::Refunded
        } else if self.refunded_amount.is_zero() {
            DepositStatus::Claimed
        } else {
            DepositStatus::PartiallyReleased
        };
        self.finalized_at = Some(now);
        refund
    }

    fn require(&self, expected: DepositStatus, operation: &'static str) -> Result<(), LedgerError> {
        if self.status != expected {
            return Err(LedgerError::InvalidTransition {
                account_id: self.id,
                operation,
                status: self.status.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn book(
        &mut self,
        kind: LedgerEntryKind,
        amount: Decimal,
        reference: String,
        claim_id: Option<ClaimId>,
        at: DateTime<Utc>,
    ) {
        self.entries.push(LedgerEntry {
            kind,
            amount,
            reference,
            claim_id,
            at,
        });
    }
}

fn non_empty(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyReference(field));
    }
    Ok(value)
}
