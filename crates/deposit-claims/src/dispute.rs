//! # Dispute Lifecycle
//!
//! Opened when a tenant partially accepts or rejects a claim.
//!
//! ```text
//! Open ──respond_landlord(AcceptCounter)──────────────▶ Resolved
//!  │  ──respond_landlord(RejectCounter)──▶ Open (claim stays Disputed)
//!  └──respond_landlord(Escalate)──▶ UnderMediation
//!                                        │
//!                       mediation window lapses unresolved
//!                                        │
//!                       flag_for_forced_resolution()  (marker only)
//!
//! resolve(amount, method) from Open or UnderMediation ──▶ Resolved
//! ```
//!
//! A dispute never touches its claim. Every mutating method returns a
//! [`DisputeOutcome`] that the caller applies to the parent claim.
//! Once `Resolved`, `resolution_amount` never changes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use deposit_core::{round_money, AccountId, ClaimId, Decimal, DisputeId, PartyId};

use crate::claim::{Claim, ClaimStatus, ResolutionMethod, TenantResponse, TenantResponseKind};
use crate::error::ClaimError;
use crate::transition::TransitionRecord;

/// The lifecycle status of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    /// Awaiting the landlord's answer to the tenant's position.
    Open,
    /// In mediation.
    UnderMediation,
    /// Resolution amount fixed. Terminal.
    Resolved,
}

impl DisputeStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::UnderMediation => "UNDER_MEDIATION",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The landlord's answer to the tenant's counter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandlordResponse {
    /// Take the tenant's counter amount (zero after a full rejection).
    AcceptCounter,
    /// Maintain the original claimed amount.
    RejectCounter,
    /// Send the dispute to mediation.
    Escalate,
}

impl LandlordResponse {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptCounter => "ACCEPT_COUNTER",
            Self::RejectCounter => "REJECT_COUNTER",
            Self::Escalate => "ESCALATE",
        }
    }
}

/// What the caller must apply to the parent claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisputeOutcome {
    /// Resolve the claim at `amount`.
    Resolved {
        /// Final approved amount.
        amount: Decimal,
        /// How it was fixed.
        method: ResolutionMethod,
    },
    /// The claim stays disputed at its original amount.
    CounterRejected,
    /// The claim moves to mediation.
    Escalated,
}

/// A dispute over one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    /// Unique dispute identifier, reserved by the claim.
    pub id: DisputeId,
    /// The contested claim.
    pub claim_id: ClaimId,
    /// The deposit account the claim draws on.
    pub account_id: AccountId,
    /// Claimed amount on the parent claim; upper bound for any resolution.
    pub claimed_amount: Decimal,
    /// How the tenant responded.
    pub tenant_response: TenantResponseKind,
    /// Tenant's counter amount, present only for partial acceptance.
    pub tenant_counter_amount: Option<Decimal>,
    /// Landlord's latest answer.
    pub landlord_response: Option<LandlordResponse>,
    /// When the landlord last answered.
    pub landlord_responded_at: Option<DateTime<Utc>>,
    /// Self-resolution and mediation must finish by this instant.
    pub mediation_deadline: DateTime<Utc>,
    /// Set when the dispute is flagged for forced resolution.
    pub escalation_deadline: Option<DateTime<Utc>>,
    /// When the mediation window lapse was flagged.
    pub escalated_at: Option<DateTime<Utc>>,
    /// Final amount released to the landlord.
    pub resolution_amount: Option<Decimal>,
    /// How the resolution was reached.
    pub resolution_method: Option<ResolutionMethod>,
    /// Mediator or administrator who supplied an external resolution.
    pub resolved_by: Option<PartyId>,
    /// When the dispute resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: DisputeStatus,
    /// When the dispute was opened.
    pub opened_at: DateTime<Utc>,
    /// Audit trail.
    pub transition_log: Vec<TransitionRecord<DisputeStatus>>,
    /// Optimistic concurrency version, bumped on every committed update.
    pub version: u64,
}

impl Dispute {
    /// Open the dispute reserved by a contested claim.
    ///
    /// # Errors
    ///
    /// [`ClaimError::DisputeMismatch`] unless the claim is `Disputed` with
    /// this dispute id reserved and a contesting tenant response recorded.
    pub fn open(
        id: DisputeId,
        claim: &Claim,
        mediation_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, ClaimError> {
        let contested = matches!(
            claim.tenant_response,
            Some(TenantResponse::PartialAccept { .. } | TenantResponse::Reject)
        );
        if claim.dispute_id != Some(id) || claim.status != ClaimStatus::Disputed || !contested {
            return Err(ClaimError::DisputeMismatch {
                dispute_id: id,
                claim_id: claim.id,
            });
        }
        let (tenant_response, tenant_counter_amount) = match claim.tenant_response {
            Some(response) => (response.kind(), response.counter_amount()),
            None => (TenantResponseKind::Reject, None),
        };
        Ok(Self {
            id,
            claim_id: claim.id,
            account_id: claim.account_id,
            claimed_amount: claim.claimed_amount,
            tenant_response,
            tenant_counter_amount,
            landlord_response: None,
            landlord_responded_at: None,
            mediation_deadline: now + mediation_window,
            escalation_deadline: None,
            escalated_at: None,
            resolution_amount: None,
            resolution_method: None,
            resolved_by: None,
            resolved_at: None,
            status: DisputeStatus::Open,
            opened_at: now,
            transition_log: Vec::new(),
            version: 0,
        })
    }

    /// Apply the landlord's answer. Only valid while `Open`.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::DisputeAlreadyResolved`] once resolved.
    /// - [`ClaimError::InvalidDisputeTransition`] outside `Open`, or on a
    ///   repeated `RejectCounter`.
    pub fn respond_landlord(
        &mut self,
        response: LandlordResponse,
        now: DateTime<Utc>,
    ) -> Result<DisputeOutcome, ClaimError> {
        self.ensure_unresolved()?;
        if self.status != DisputeStatus::Open {
            return Err(self.invalid(
                DisputeStatus::Open,
                format!("landlord may only answer while OPEN, got {}", self.status),
            ));
        }
        if response == LandlordResponse::RejectCounter
            && self.landlord_response == Some(LandlordResponse::RejectCounter)
        {
            return Err(self.invalid(
                DisputeStatus::Open,
                "counter offer already rejected".to_string(),
            ));
        }

        self.landlord_response = Some(response);
        self.landlord_responded_at = Some(now);

        match response {
            LandlordResponse::AcceptCounter => {
                let amount = self.tenant_counter_amount.unwrap_or(Decimal::ZERO);
                let method = ResolutionMethod::CounterAccepted;
                self.settle(amount, method, None, now);
                Ok(DisputeOutcome::Resolved { amount, method })
            }
            LandlordResponse::RejectCounter => {
                self.record(DisputeStatus::Open, "counter_rejected", now);
                Ok(DisputeOutcome::CounterRejected)
            }
            LandlordResponse::Escalate => {
                self.record(DisputeStatus::UnderMediation, "escalated", now);
                self.status = DisputeStatus::UnderMediation;
                Ok(DisputeOutcome::Escalated)
            }
        }
    }

    /// Whether the mediation window lapsed with no resolution amount.
    pub fn can_escalate(&self, now: DateTime<Utc>) -> bool {
        self.status == DisputeStatus::UnderMediation
            && now > self.mediation_deadline
            && self.resolution_amount.is_none()
    }

    /// [`can_escalate`](Self::can_escalate) and not yet flagged.
    pub fn needs_forced_resolution_flag(&self, now: DateTime<Utc>) -> bool {
        self.can_escalate(now) && self.escalated_at.is_none()
    }

    /// Mark the dispute as needing forced resolution. Leaves the status and
    /// `resolution_amount` untouched.
    ///
    /// # Errors
    ///
    /// [`ClaimError::NotEscalatable`] unless
    /// [`needs_forced_resolution_flag`](Self::needs_forced_resolution_flag).
    pub fn flag_for_forced_resolution(
        &mut self,
        escalation_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        if !self.needs_forced_resolution_flag(now) {
            let reason = if self.escalated_at.is_some() {
                "already flagged".to_string()
            } else {
                format!(
                    "status {} with mediation deadline {}",
                    self.status, self.mediation_deadline
                )
            };
            return Err(ClaimError::NotEscalatable {
                dispute_id: self.id,
                reason,
            });
        }
        self.escalated_at = Some(now);
        self.escalation_deadline = Some(now + escalation_window);
        self.record(self.status, "flagged_for_forced_resolution", now);
        Ok(())
    }

    /// Fix the resolution from outside (mediator, arbitrator, administrator),
    /// regardless of sub-state.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::DisputeAlreadyResolved`] once resolved.
    /// - [`ClaimError::InvalidResolutionMethod`] for claim-internal methods.
    /// - [`ClaimError::InvalidResolutionAmount`] outside `[0, claimed]`.
    pub fn resolve(
        &mut self,
        amount: Decimal,
        method: ResolutionMethod,
        resolver: PartyId,
        now: DateTime<Utc>,
    ) -> Result<DisputeOutcome, ClaimError> {
        self.ensure_unresolved()?;
        if !method.is_external() {
            return Err(ClaimError::InvalidResolutionMethod(method.to_string()));
        }
        let rounded = round_money(amount);
        if amount < Decimal::ZERO || rounded > self.claimed_amount {
            return Err(ClaimError::InvalidResolutionAmount {
                dispute_id: self.id,
                amount,
                claimed: self.claimed_amount,
            });
        }
        let amount = rounded;
        self.settle(amount, method, Some(resolver), now);
        Ok(DisputeOutcome::Resolved { amount, method })
    }

    fn settle(
        &mut self,
        amount: Decimal,
        method: ResolutionMethod,
        resolver: Option<PartyId>,
        now: DateTime<Utc>,
    ) {
        self.resolution_amount = Some(amount);
        self.resolution_method = Some(method);
        self.resolved_by = resolver;
        self.resolved_at = Some(now);
        self.record(DisputeStatus::Resolved, method.as_str(), now);
        self.status = DisputeStatus::Resolved;
    }

    fn ensure_unresolved(&self) -> Result<(), ClaimError> {
        if self.status.is_terminal() {
            return Err(ClaimError::DisputeAlreadyResolved {
                dispute_id: self.id,
            });
        }
        Ok(())
    }

    fn invalid(&self, to: DisputeStatus, reason: String) -> ClaimError {
        ClaimError::InvalidDisputeTransition {
            dispute_id: self.id,
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason,
        }
    }

    fn record(&mut self, to: DisputeStatus, note: &str, now: DateTime<Utc>) {
        tracing::debug!(
            dispute_id = %self.id,
            from = %self.status,
            to = %to,
            note,
            "dispute transition"
        );
        self.transition_log.push(TransitionRecord {
            from_state: self.status,
            to_state: to,
            at: now,
            note: note.to_string(),
        });
    }
}
