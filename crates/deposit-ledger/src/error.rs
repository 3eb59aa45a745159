//! # Ledger Errors
//!
//! [`LedgerError`] covers rejected operations. [`ConsistencyError`] is the
//! separate class of reconciliation failures: they mean the ledger and its
//! claims disagree, which is a bug, and processing of that account must stop.

use deposit_core::{AccountId, ClaimId, Decimal, ValidationError};
use thiserror::Error;

/// Errors arising from deposit account operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Operation not valid in the account's current status.
    #[error("deposit {account_id} cannot {operation} in status {status}")]
    InvalidTransition {
        /// The account.
        account_id: AccountId,
        /// Attempted operation.
        operation: &'static str,
        /// Current status name.
        status: String,
    },

    /// Funds are not (yet) held in escrow.
    #[error("deposit {account_id} is not held in escrow (status {status})")]
    NotInEscrow {
        /// The account.
        account_id: AccountId,
        /// Current status name.
        status: String,
    },

    /// The account has already been finalized.
    #[error("deposit {account_id} is already finalized")]
    AlreadyFinalized {
        /// The account.
        account_id: AccountId,
    },

    /// Finalization attempted while claims still hold funds.
    #[error("deposit {account_id} has {open} open claim(s)")]
    ClaimsStillOpen {
        /// The account.
        account_id: AccountId,
        /// Number of open claims.
        open: usize,
    },

    /// Release exceeds the remaining balance.
    #[error("release of {requested} exceeds remaining {remaining} on deposit {account_id}")]
    InsufficientEscrow {
        /// The account.
        account_id: AccountId,
        /// Requested amount.
        requested: Decimal,
        /// Remaining balance.
        remaining: Decimal,
    },

    /// The claim's release was already booked.
    #[error("release for {claim_id} already booked on deposit {account_id}")]
    DuplicateRelease {
        /// The account.
        account_id: AccountId,
        /// The claim.
        claim_id: ClaimId,
    },

    /// Credit score outside the 300–850 scale.
    #[error("credit score {0} is outside 300..=850")]
    InvalidCreditScore(u16),

    /// Input validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Reconciliation failure. Fatal for the account.
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

impl LedgerError {
    /// Whether this error signals a broken ledger rather than a rejected request.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

/// The ledger and its claims disagree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsistencyError {
    /// `released + refunded + remaining != total`.
    #[error("deposit {account_id} does not reconcile: released {released} + refunded {refunded} + remaining {remaining} != total {total}")]
    ReconciliationFailed {
        /// The account.
        account_id: AccountId,
        /// Total deposit.
        total: Decimal,
        /// Released to landlord.
        released: Decimal,
        /// Refunded to tenant.
        refunded: Decimal,
        /// Still in escrow.
        remaining: Decimal,
    },

    /// A breakdown component went negative (claims overcommit the deposit).
    #[error("deposit {account_id}: {component} is negative ({value})")]
    NegativeComponent {
        /// The account.
        account_id: AccountId,
        /// Which component.
        component: &'static str,
        /// Its value.
        value: Decimal,
    },

    /// Booked releases differ from the approved amounts on resolved claims.
    #[error("deposit {account_id}: booked releases {booked} differ from resolved claims {derived}")]
    LedgerMismatch {
        /// The account.
        account_id: AccountId,
        /// `released_amount` on the account.
        booked: Decimal,
        /// Sum of approved amounts on resolved claims.
        derived: Decimal,
    },

    /// A claim for another account was passed in.
    #[error("claim {claim_id} does not belong to deposit {account_id}")]
    ForeignClaim {
        /// The account.
        account_id: AccountId,
        /// The foreign claim.
        claim_id: ClaimId,
    },

    /// A finalized account still holds funds or has open claims.
    #[error("finalized deposit {account_id} still holds {residual}")]
    ResidualAfterFinalization {
        /// The account.
        account_id: AccountId,
        /// Unaccounted amount.
        residual: Decimal,
    },
}
