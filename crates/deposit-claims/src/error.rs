//! # Claim and Dispute Errors
//!
//! Validation errors for both state machines. All of these are returned
//! synchronously to the caller; none indicate a bug.

use chrono::{DateTime, Utc};
use deposit_core::{ClaimId, Decimal, DisputeId, ValidationError};
use thiserror::Error;

/// Errors arising from claim and dispute operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClaimError {
    /// The event is not valid from the claim's current status.
    #[error("claim {claim_id}: {event} is not valid in status {from}")]
    InvalidTransition {
        /// The claim.
        claim_id: ClaimId,
        /// Current status name.
        from: String,
        /// Attempted event name.
        event: String,
    },

    /// The claim is already resolved; resolution is irreversible.
    #[error("claim {claim_id} is already resolved")]
    AlreadyResolved {
        /// The claim.
        claim_id: ClaimId,
    },

    /// The claimed amount exceeds what is still available in escrow.
    #[error("claim {claim_id} requests {requested} but only {available} is available in escrow")]
    ExceedsAvailableEscrow {
        /// The claim.
        claim_id: ClaimId,
        /// Requested amount.
        requested: Decimal,
        /// Amount not yet released, refunded, or contested.
        available: Decimal,
    },

    /// The tenant response window has closed.
    #[error("claim {claim_id}: tenant response deadline passed at {deadline}")]
    DeadlinePassed {
        /// The claim.
        claim_id: ClaimId,
        /// The lapsed deadline.
        deadline: DateTime<Utc>,
    },

    /// The tenant has already responded.
    #[error("claim {claim_id}: tenant has already responded")]
    AlreadyResponded {
        /// The claim.
        claim_id: ClaimId,
    },

    /// Auto-approval guard not satisfied.
    #[error("claim {claim_id} is not eligible for auto-approval: {reason}")]
    NotEligibleForAutoApproval {
        /// The claim.
        claim_id: ClaimId,
        /// Which guard failed.
        reason: String,
    },

    /// Partial-accept counter offer outside `(0, claimed)`.
    #[error("claim {claim_id}: counter amount {counter} must be above zero and below the claimed {claimed}")]
    InvalidCounterAmount {
        /// The claim.
        claim_id: ClaimId,
        /// Offered amount.
        counter: Decimal,
        /// Claimed amount.
        claimed: Decimal,
    },

    /// A reminder for this deadline was already requested.
    #[error("claim {claim_id}: response reminder already sent")]
    ReminderAlreadySent {
        /// The claim.
        claim_id: ClaimId,
    },

    /// The dispute event is not valid from its current status.
    #[error("dispute {dispute_id}: invalid transition from {from} to {to}: {reason}")]
    InvalidDisputeTransition {
        /// The dispute.
        dispute_id: DisputeId,
        /// Current status name.
        from: String,
        /// Attempted target status name.
        to: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The dispute is resolved and its resolution amount is immutable.
    #[error("dispute {dispute_id} is already resolved")]
    DisputeAlreadyResolved {
        /// The dispute.
        dispute_id: DisputeId,
    },

    /// Resolution amount is negative or above the claimed amount.
    #[error("dispute {dispute_id}: resolution amount {amount} must be between 0 and the claimed {claimed}")]
    InvalidResolutionAmount {
        /// The dispute.
        dispute_id: DisputeId,
        /// Proposed amount.
        amount: Decimal,
        /// Claimed amount on the parent claim.
        claimed: Decimal,
    },

    /// Resolution method is reserved for the claim's own transitions.
    #[error("resolution method {0} cannot be supplied externally")]
    InvalidResolutionMethod(String),

    /// Escalation guard not satisfied.
    #[error("dispute {dispute_id} cannot be escalated: {reason}")]
    NotEscalatable {
        /// The dispute.
        dispute_id: DisputeId,
        /// Which guard failed.
        reason: String,
    },

    /// A dispute was paired with a claim it does not belong to.
    #[error("dispute {dispute_id} does not belong to claim {claim_id}")]
    DisputeMismatch {
        /// The dispute.
        dispute_id: DisputeId,
        /// The claim it was paired with.
        claim_id: ClaimId,
    },

    /// Input validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
