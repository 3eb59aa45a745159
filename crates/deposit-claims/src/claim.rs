//! # Claim Lifecycle
//!
//! A landlord's demand for part of the deposit.
//!
//! ## Transition Graph
//!
//! ```text
//! Draft ──submit()──▶ Submitted ──mark_tenant_notified()──▶ TenantNotified
//!                        │                                        │
//!                        ├──────────────┬─────────────────────────┤
//!                        │              │                         │
//!                respond(Accept)  respond(PartialAccept|Reject)  auto_approve()
//!                        │              │                         │
//!                        ▼              ▼                         │
//!                    Accepted       Disputed ──escalate──▶ Mediation
//!                        │              │                    │    │
//!                        │      dispute resolved    dispute resolved
//!                        ▼              ▼                    ▼    ▼
//!                    Resolved ◀─────────┴────────────────────┴────┘
//! ```
//!
//! `Accepted` is passed through on the way to `Resolved`; it appears in the
//! transition log but a claim never rests there.
//!
//! ## Deadline Semantics
//!
//! `tenant_response_deadline` is inclusive for the tenant: a response at
//! exactly the deadline is accepted. Auto-approval requires the clock to be
//! strictly after `auto_approve_at`, so the two can never both be valid at
//! the same instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use deposit_core::{
    ensure_positive, round_money, AccountId, ClaimId, Decimal, DisputeId, PartyId, TenancyId,
};

use crate::error::ClaimError;
use crate::transition::TransitionRecord;

// ── Status ─────────────────────────────────────────────────────────────

/// The lifecycle status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Being prepared by the landlord. Holds no funds.
    Draft,
    /// Submitted; the tenant response clock is running.
    Submitted,
    /// The tenant has been informed. Same business meaning as `Submitted`.
    TenantNotified,
    /// Tenant accepted in full. Transient on the way to `Resolved`.
    Accepted,
    /// Tenant contested; a dispute is open.
    Disputed,
    /// The dispute was escalated to mediation.
    Mediation,
    /// Final. `approved_amount` is fixed.
    Resolved,
}

/// Events that drive [`ClaimStatus`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimEvent {
    /// Landlord submits the draft.
    Submit,
    /// Notification to the tenant was dispatched.
    TenantNotified,
    /// Tenant accepted the full amount.
    TenantAccepted,
    /// Tenant partially accepted or rejected.
    TenantContested,
    /// The response window lapsed without a tenant response.
    AutoApproved,
    /// Landlord rejected the tenant's counter offer.
    CounterRejected,
    /// Landlord escalated the dispute to mediation.
    Escalated,
    /// The dispute reached a resolution amount.
    DisputeResolved,
    /// Close an accepted claim.
    Close,
}

impl ClaimEvent {
    /// Canonical event name for logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::TenantNotified => "tenant_notified",
            Self::TenantAccepted => "tenant_accepted",
            Self::TenantContested => "tenant_contested",
            Self::AutoApproved => "auto_approved",
            Self::CounterRejected => "counter_rejected",
            Self::Escalated => "escalated",
            Self::DisputeResolved => "dispute_resolved",
            Self::Close => "close",
        }
    }
}

impl std::fmt::Display for ClaimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClaimStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::TenantNotified => "TENANT_NOTIFIED",
            Self::Accepted => "ACCEPTED",
            Self::Disputed => "DISPUTED",
            Self::Mediation => "MEDIATION",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Whether the claim's amount is currently contested in escrow.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::Submitted | Self::TenantNotified | Self::Disputed | Self::Mediation
        )
    }

    /// Whether the claim is waiting on the tenant.
    pub fn awaits_tenant(&self) -> bool {
        matches!(self, Self::Submitted | Self::TenantNotified)
    }

    /// Pure transition table. `None` means the event is not valid here.
    pub fn on(self, event: ClaimEvent) -> Option<ClaimStatus> {
        use ClaimEvent as E;
        use ClaimStatus as S;
        match (self, event) {
            (S::Draft, E::Submit) => Some(S::Submitted),
            (S::Submitted, E::TenantNotified) => Some(S::TenantNotified),
            (S::Submitted | S::TenantNotified, E::TenantAccepted) => Some(S::Accepted),
            (S::Submitted | S::TenantNotified, E::TenantContested) => Some(S::Disputed),
            (S::Submitted | S::TenantNotified, E::AutoApproved) => Some(S::Resolved),
            (S::Accepted, E::Close) => Some(S::Resolved),
            (S::Disputed, E::CounterRejected) => Some(S::Disputed),
            (S::Disputed, E::Escalated) => Some(S::Mediation),
            (S::Disputed | S::Mediation, E::DisputeResolved) => Some(S::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Category ───────────────────────────────────────────────────────────

/// What the landlord is claiming for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    /// Professional cleaning beyond normal wear.
    Cleaning,
    /// Damage to the property or fittings.
    Damage,
    /// Rent arrears.
    UnpaidRent,
    /// Utility bills left unpaid.
    UnpaidUtilities,
    /// Inventory items missing at check-out.
    MissingItems,
    /// Lost or unreturned keys.
    KeyReplacement,
    /// Anything else, described in the claim text.
    Other,
}

impl ClaimCategory {
    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Damage => "damage",
            Self::UnpaidRent => "unpaid_rent",
            Self::UnpaidUtilities => "unpaid_utilities",
            Self::MissingItems => "missing_items",
            Self::KeyReplacement => "key_replacement",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ClaimCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Resolution ─────────────────────────────────────────────────────────

/// How a claim's approved amount was fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionMethod {
    /// Tenant accepted the full claim.
    #[serde(rename = "tenant_accepted")]
    TenantAccepted,
    /// Tenant did not respond before the deadline.
    #[serde(rename = "auto_approved_no_response")]
    AutoApprovedNoResponse,
    /// Landlord accepted the tenant's counter offer.
    #[serde(rename = "landlord_accepted_counter")]
    CounterAccepted,
    /// Settled by a mediator.
    #[serde(rename = "mediation")]
    Mediation,
    /// Decided by an external arbitrator.
    #[serde(rename = "arbitration")]
    Arbitration,
    /// Decided by a platform administrator.
    #[serde(rename = "admin_decision")]
    AdminDecision,
}

impl ResolutionMethod {
    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantAccepted => "tenant_accepted",
            Self::AutoApprovedNoResponse => "auto_approved_no_response",
            Self::CounterAccepted => "landlord_accepted_counter",
            Self::Mediation => "mediation",
            Self::Arbitration => "arbitration",
            Self::AdminDecision => "admin_decision",
        }
    }

    /// Whether an authorized resolver may supply this method directly.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::Mediation | Self::Arbitration | Self::AdminDecision
        )
    }
}

impl std::fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tenant Response ────────────────────────────────────────────────────

/// The tenant's answer to a submitted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantResponse {
    /// Accept the full claimed amount.
    Accept,
    /// Accept part of the claim.
    PartialAccept {
        /// Amount the tenant agrees to pay out of the deposit.
        counter_amount: Decimal,
    },
    /// Reject the claim entirely.
    Reject,
}

/// Discriminant of [`TenantResponse`], stored on the dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantResponseKind {
    /// Full acceptance.
    Accept,
    /// Partial acceptance with a counter amount.
    PartialAccept,
    /// Rejection.
    Reject,
}

impl TenantResponse {
    /// The response discriminant.
    pub fn kind(&self) -> TenantResponseKind {
        match self {
            Self::Accept => TenantResponseKind::Accept,
            Self::PartialAccept { .. } => TenantResponseKind::PartialAccept,
            Self::Reject => TenantResponseKind::Reject,
        }
    }

    /// The counter amount, present only for partial acceptance.
    pub fn counter_amount(&self) -> Option<Decimal> {
        match self {
            Self::PartialAccept { counter_amount } => Some(*counter_amount),
            Self::Accept | Self::Reject => None,
        }
    }
}

/// What happened when the tenant responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The claim resolved at the full amount.
    Accepted {
        /// Amount now approved for release to the landlord.
        approved_amount: Decimal,
    },
    /// The claim is contested; the caller must open the dispute.
    Contested {
        /// Identifier reserved for the dispute.
        dispute_id: DisputeId,
    },
}

// ── The Claim ──────────────────────────────────────────────────────────

/// A landlord claim against one deposit account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Unique claim identifier.
    pub id: ClaimId,
    /// The deposit account the claim draws on.
    pub account_id: AccountId,
    /// The tenancy the account belongs to.
    pub tenancy_id: TenancyId,
    /// The landlord who filed it.
    pub landlord_id: PartyId,
    /// What is being claimed for.
    pub category: ClaimCategory,
    /// Landlord's description.
    pub description: String,
    /// Opaque references to uploaded evidence documents.
    pub evidence_refs: Vec<String>,
    /// Amount requested.
    pub claimed_amount: Decimal,
    /// Amount approved for release. Set only on resolution.
    pub approved_amount: Option<Decimal>,
    /// Current status.
    pub status: ClaimStatus,
    /// When the draft was created.
    pub created_at: DateTime<Utc>,
    /// When the claim was submitted.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Last instant a tenant response is accepted.
    pub tenant_response_deadline: Option<DateTime<Utc>>,
    /// After this instant the claim may be auto-approved.
    pub auto_approve_at: Option<DateTime<Utc>>,
    /// When the tenant notification was dispatched.
    pub tenant_notified_at: Option<DateTime<Utc>>,
    /// When the tenant responded.
    pub tenant_responded_at: Option<DateTime<Utc>>,
    /// The tenant's response, once given.
    pub tenant_response: Option<TenantResponse>,
    /// When a deadline reminder was requested.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// The dispute opened on this claim, if any.
    pub dispute_id: Option<DisputeId>,
    /// How the approved amount was fixed.
    pub resolution_method: Option<ResolutionMethod>,
    /// When the claim resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Audit trail.
    pub transition_log: Vec<TransitionRecord<ClaimStatus>>,
    /// Optimistic concurrency version, bumped on every committed update.
    pub version: u64,
}

impl Claim {
    /// Create a claim in [`Draft`](ClaimStatus::Draft).
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Validation`] if `claimed_amount` is not positive.
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        account_id: AccountId,
        tenancy_id: TenancyId,
        landlord_id: PartyId,
        category: ClaimCategory,
        description: impl Into<String>,
        claimed_amount: Decimal,
        evidence_refs: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ClaimError> {
        let claimed_amount = ensure_positive("claimed_amount", round_money(claimed_amount))?;
        Ok(Self {
            id: ClaimId::new(),
            account_id,
            tenancy_id,
            landlord_id,
            category,
            description: description.into(),
            evidence_refs,
            claimed_amount,
            approved_amount: None,
            status: ClaimStatus::Draft,
            created_at: now,
            submitted_at: None,
            tenant_response_deadline: None,
            auto_approve_at: None,
            tenant_notified_at: None,
            tenant_responded_at: None,
            tenant_response: None,
            reminder_sent_at: None,
            dispute_id: None,
            resolution_method: None,
            resolved_at: None,
            transition_log: Vec::new(),
            version: 0,
        })
    }

    /// Submit the draft, starting the tenant response clock.
    ///
    /// `available` is the escrow not yet released, refunded, or held by
    /// other open claims. `response_window` is normally 7 days.
    ///
    /// # Errors
    ///
    /// [`ClaimError::ExceedsAvailableEscrow`] if the claim is larger than
    /// `available`; [`ClaimError::InvalidTransition`] if not a draft.
    pub fn submit(
        &mut self,
        available: Decimal,
        response_window: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        let next = self.next_status(ClaimEvent::Submit)?;
        if self.claimed_amount > available {
            return Err(ClaimError::ExceedsAvailableEscrow {
                claim_id: self.id,
                requested: self.claimed_amount,
                available,
            });
        }
        let deadline = now + response_window;
        self.submitted_at = Some(now);
        self.tenant_response_deadline = Some(deadline);
        self.auto_approve_at = Some(deadline);
        self.apply(next, ClaimEvent::Submit, now);
        Ok(())
    }

    /// Record that the tenant notification went out.
    ///
    /// # Errors
    ///
    /// [`ClaimError::InvalidTransition`] unless the claim is `Submitted`.
    pub fn mark_tenant_notified(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        let next = self.next_status(ClaimEvent::TenantNotified)?;
        self.tenant_notified_at = Some(now);
        self.apply(next, ClaimEvent::TenantNotified, now);
        Ok(())
    }

    /// Apply the tenant's response.
    ///
    /// Accepting resolves the claim at the full amount. Partial acceptance or
    /// rejection moves the claim to `Disputed` and reserves a dispute id; the
    /// caller opens the [`Dispute`](crate::Dispute) with it.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::AlreadyResponded`] on a second response.
    /// - [`ClaimError::DeadlinePassed`] strictly after the deadline.
    /// - [`ClaimError::AlreadyResolved`] if auto-approval won the race.
    /// - [`ClaimError::InvalidCounterAmount`] for a counter outside `(0, claimed)`.
    pub fn respond(
        &mut self,
        response: TenantResponse,
        now: DateTime<Utc>,
    ) -> Result<ResponseOutcome, ClaimError> {
        if self.tenant_responded_at.is_some() {
            return Err(ClaimError::AlreadyResponded { claim_id: self.id });
        }
        if let Some(deadline) = self.tenant_response_deadline {
            if now > deadline {
                return Err(ClaimError::DeadlinePassed {
                    claim_id: self.id,
                    deadline,
                });
            }
        }
        if self.status.is_terminal() {
            return Err(ClaimError::AlreadyResolved { claim_id: self.id });
        }

        match response {
            TenantResponse::Accept => {
                let accepted = self.next_status(ClaimEvent::TenantAccepted)?;
                self.tenant_responded_at = Some(now);
                self.tenant_response = Some(response);
                self.apply(accepted, ClaimEvent::TenantAccepted, now);
                let resolved = self.next_status(ClaimEvent::Close)?;
                self.settle(self.claimed_amount, ResolutionMethod::TenantAccepted, now);
                self.apply(resolved, ClaimEvent::Close, now);
                Ok(ResponseOutcome::Accepted {
                    approved_amount: self.claimed_amount,
                })
            }
            TenantResponse::PartialAccept { .. } | TenantResponse::Reject => {
                let next = self.next_status(ClaimEvent::TenantContested)?;
                let response = match response {
                    TenantResponse::PartialAccept { counter_amount } => {
                        let counter = round_money(counter_amount);
                        if counter <= Decimal::ZERO || counter >= self.claimed_amount {
                            return Err(ClaimError::InvalidCounterAmount {
                                claim_id: self.id,
                                counter: counter_amount,
                                claimed: self.claimed_amount,
                            });
                        }
                        TenantResponse::PartialAccept {
                            counter_amount: counter,
                        }
                    }
                    other => other,
                };
                let dispute_id = DisputeId::new();
                self.tenant_responded_at = Some(now);
                self.tenant_response = Some(response);
                self.dispute_id = Some(dispute_id);
                self.apply(next, ClaimEvent::TenantContested, now);
                Ok(ResponseOutcome::Contested { dispute_id })
            }
        }
    }

    /// Whether the scheduler may auto-approve this claim at `now`.
    pub fn can_auto_approve(&self, now: DateTime<Utc>) -> bool {
        self.status.awaits_tenant()
            && self.tenant_responded_at.is_none()
            && self.auto_approve_at.is_some_and(|at| now > at)
    }

    /// Resolve in the landlord's favour because the tenant never answered.
    ///
    /// Callers must run this inside the same atomic update that read the
    /// claim so a concurrent tenant response cannot also apply.
    ///
    /// # Errors
    ///
    /// [`ClaimError::AlreadyResolved`], [`ClaimError::AlreadyResponded`], or
    /// [`ClaimError::NotEligibleForAutoApproval`] when the guard fails.
    pub fn auto_approve(&mut self, now: DateTime<Utc>) -> Result<Decimal, ClaimError> {
        if self.status.is_terminal() {
            return Err(ClaimError::AlreadyResolved { claim_id: self.id });
        }
        if self.tenant_responded_at.is_some() {
            return Err(ClaimError::AlreadyResponded { claim_id: self.id });
        }
        if !self.can_auto_approve(now) {
            let reason = match self.auto_approve_at {
                Some(at) if self.status.awaits_tenant() => {
                    format!("auto-approval opens after {at}")
                }
                _ => format!("status {} does not await the tenant", self.status),
            };
            return Err(ClaimError::NotEligibleForAutoApproval {
                claim_id: self.id,
                reason,
            });
        }
        let next = self.next_status(ClaimEvent::AutoApproved)?;
        self.settle(
            self.claimed_amount,
            ResolutionMethod::AutoApprovedNoResponse,
            now,
        );
        self.apply(next, ClaimEvent::AutoApproved, now);
        Ok(self.claimed_amount)
    }

    /// Whether a deadline reminder is due: the tenant has not answered,
    /// the deadline is still ahead and within `lead`, and no reminder went out.
    pub fn needs_reminder(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        if !self.status.awaits_tenant()
            || self.tenant_responded_at.is_some()
            || self.reminder_sent_at.is_some()
        {
            return false;
        }
        match self.tenant_response_deadline {
            Some(deadline) => now <= deadline && deadline - now <= lead,
            None => false,
        }
    }

    /// Record that a reminder was requested.
    ///
    /// # Errors
    ///
    /// [`ClaimError::ReminderAlreadySent`] on repeat.
    pub fn mark_reminder_sent(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if self.reminder_sent_at.is_some() {
            return Err(ClaimError::ReminderAlreadySent { claim_id: self.id });
        }
        self.reminder_sent_at = Some(now);
        Ok(())
    }

    /// The landlord rejected the counter offer; the claim stays contested
    /// at its original amount.
    ///
    /// # Errors
    ///
    /// [`ClaimError::InvalidTransition`] unless `Disputed`.
    pub fn mark_counter_rejected(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        let next = self.next_status(ClaimEvent::CounterRejected)?;
        self.apply(next, ClaimEvent::CounterRejected, now);
        Ok(())
    }

    /// The dispute went to mediation.
    ///
    /// # Errors
    ///
    /// [`ClaimError::InvalidTransition`] unless `Disputed`.
    pub fn mark_escalated(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        let next = self.next_status(ClaimEvent::Escalated)?;
        self.apply(next, ClaimEvent::Escalated, now);
        Ok(())
    }

    /// Take the resolution amount fixed by this claim's dispute.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::DisputeMismatch`] if `dispute_id` is not this claim's dispute.
    /// - [`ClaimError::AlreadyResolved`] if the claim is resolved.
    /// - [`ClaimError::InvalidResolutionAmount`] if `amount` exceeds the claim.
    pub fn resolve_from_dispute(
        &mut self,
        dispute_id: DisputeId,
        amount: Decimal,
        method: ResolutionMethod,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        if self.dispute_id != Some(dispute_id) {
            return Err(ClaimError::DisputeMismatch {
                dispute_id,
                claim_id: self.id,
            });
        }
        if self.status.is_terminal() {
            return Err(ClaimError::AlreadyResolved { claim_id: self.id });
        }
        let rounded = round_money(amount);
        if amount < Decimal::ZERO || rounded > self.claimed_amount {
            return Err(ClaimError::InvalidResolutionAmount {
                dispute_id,
                amount,
                claimed: self.claimed_amount,
            });
        }
        let next = self.next_status(ClaimEvent::DisputeResolved)?;
        self.settle(rounded, method, now);
        self.apply(next, ClaimEvent::DisputeResolved, now);
        Ok(())
    }

    /// The amount this claim currently holds back in escrow.
    pub fn contested_amount(&self) -> Decimal {
        if self.status.is_open() {
            self.claimed_amount
        } else {
            Decimal::ZERO
        }
    }

    fn next_status(&self, event: ClaimEvent) -> Result<ClaimStatus, ClaimError> {
        if self.status.is_terminal() {
            return Err(ClaimError::AlreadyResolved { claim_id: self.id });
        }
        self.status
            .on(event)
            .ok_or_else(|| ClaimError::InvalidTransition {
                claim_id: self.id,
                from: self.status.as_str().to_string(),
                event: event.as_str().to_string(),
            })
    }

    fn settle(&mut self, amount: Decimal, method: ResolutionMethod, now: DateTime<Utc>) {
        self.approved_amount = Some(amount);
        self.resolution_method = Some(method);
        self.resolved_at = Some(now);
    }

    fn apply(&mut self, to: ClaimStatus, event: ClaimEvent, now: DateTime<Utc>) {
        tracing::debug!(
            claim_id = %self.id,
            from = %self.status,
            to = %to,
            event = %event,
            "claim transition"
        );
        self.transition_log.push(TransitionRecord {
            from_state: self.status,
            to_state: to,
            at: now,
            note: event.as_str().to_string(),
        });
        self.status = to;
    }
}
