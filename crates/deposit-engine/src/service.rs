//! # Deposit Service
//!
//! Commands and queries over the repository. Each command reads time once
//! from the injected clock and performs its transition inside the
//! repository's compare-and-set updates. Transitions that touch several
//! records nest their updates (account, then claim, then dispute) so the
//! claim status and the account's booked releases always commit together.
//!
//! Notifications go out after the transition has committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use deposit_claims::{
    Claim, ClaimCategory, Dispute, DisputeOutcome, LandlordResponse, ResolutionMethod,
    ResponseOutcome, TenantResponse,
};
use deposit_core::{AccountId, ClaimId, Clock, Decimal, DisputeId, PartyId, TenancyId};
use deposit_ledger::{
    calculate_deposit_amount, DepositAccount, DepositCalculation, DepositStatus, FundBreakdown,
    FundReleaseCalculator, LedgerError, PaymentMethod, PropertyDetails, Tenancy, TenantProfile,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::{dispatch, NotificationGateway, NotificationKind};
use crate::scheduler::DeadlineScheduler;
use crate::store::DepositRepository;

/// Input for [`DepositService::open_tenancy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenancy {
    /// Landlord party.
    pub landlord_id: PartyId,
    /// Tenant party.
    pub tenant_id: PartyId,
    /// Lease start.
    pub lease_start: DateTime<Utc>,
    /// Lease end.
    pub lease_end: DateTime<Utc>,
    /// Monthly rent, the calculation base.
    pub monthly_rent: Decimal,
    /// Tenant risk signals.
    pub profile: TenantProfile,
    /// Property characteristics.
    #[serde(default)]
    pub property: PropertyDetails,
}

/// Input for [`DepositService::draft_claim`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaim {
    /// Category.
    pub category: ClaimCategory,
    /// Free-text description.
    pub description: String,
    /// Amount claimed.
    pub amount: Decimal,
    /// Opaque evidence document ids.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

/// The deposit escrow service.
pub struct DepositService<R> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationGateway>,
    config: EngineConfig,
}

impl<R: DepositRepository> DepositService<R> {
    /// Assemble the service.
    pub fn new(
        repo: Arc<R>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            clock,
            notifier,
            config,
        }
    }

    /// The repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A scheduler sharing this service's repository, clock, and notifier.
    pub fn scheduler(&self) -> DeadlineScheduler<R> {
        DeadlineScheduler::new(
            Arc::clone(&self.repo),
            Arc::clone(&self.clock),
            Arc::clone(&self.notifier),
            self.config.policy.clone(),
        )
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Quote a deposit without creating anything.
    ///
    /// # Errors
    ///
    /// [`EngineError::Ledger`] for invalid inputs.
    pub fn calculate_deposit_amount(
        &self,
        monthly_rent: Decimal,
        profile: &TenantProfile,
        property: &PropertyDetails,
    ) -> Result<DepositCalculation, EngineError> {
        Ok(calculate_deposit_amount(monthly_rent, profile, property)?)
    }

    /// Current fund breakdown of an account.
    ///
    /// # Errors
    ///
    /// Not found, not yet in escrow, or a consistency failure.
    pub fn get_breakdown(&self, account_id: AccountId) -> Result<FundBreakdown, EngineError> {
        let result = self
            .repo
            .view_account(account_id, FundReleaseCalculator::breakdown)
            .ok_or_else(|| EngineError::not_found("deposit", account_id))?;
        result.map_err(|e| {
            if e.is_consistency_violation() {
                tracing::error!(%account_id, error = %e, "deposit ledger does not reconcile");
            }
            e.into()
        })
    }

    /// Fetch a tenancy.
    ///
    /// # Errors
    ///
    /// Not found.
    pub fn get_tenancy(&self, id: TenancyId) -> Result<Tenancy, EngineError> {
        self.repo
            .tenancy(id)
            .ok_or_else(|| EngineError::not_found("tenancy", id))
    }

    /// Fetch an account.
    ///
    /// # Errors
    ///
    /// Not found.
    pub fn get_account(&self, id: AccountId) -> Result<DepositAccount, EngineError> {
        self.repo
            .account(id)
            .ok_or_else(|| EngineError::not_found("deposit", id))
    }

    /// Fetch a claim.
    ///
    /// # Errors
    ///
    /// Not found.
    pub fn get_claim(&self, id: ClaimId) -> Result<Claim, EngineError> {
        self.repo
            .claim(id)
            .ok_or_else(|| EngineError::not_found("claim", id))
    }

    /// Fetch a dispute.
    ///
    /// # Errors
    ///
    /// Not found.
    pub fn get_dispute(&self, id: DisputeId) -> Result<Dispute, EngineError> {
        self.repo
            .dispute(id)
            .ok_or_else(|| EngineError::not_found("dispute", id))
    }

    // ── Deposit lifecycle ───────────────────────────────────────────────

    /// Record a signed tenancy and create its `Pending` deposit account.
    ///
    /// # Errors
    ///
    /// Validation of the lease dates, rent, or tenant profile.
    pub fn open_tenancy(
        &self,
        request: NewTenancy,
    ) -> Result<(Tenancy, DepositAccount), EngineError> {
        let now = self.clock.now();
        let calculation =
            calculate_deposit_amount(request.monthly_rent, &request.profile, &request.property)?;
        let tenancy_id = TenancyId::new();
        let account =
            DepositAccount::create(tenancy_id, &calculation, self.config.currency.clone(), now)?;
        let tenancy = Tenancy::new(
            tenancy_id,
            request.landlord_id,
            request.tenant_id,
            account.id,
            request.lease_start,
            request.lease_end,
            now,
        )?;
        self.repo.insert_tenancy(tenancy.clone())?;
        self.repo.insert_account(account.clone())?;
        tracing::info!(
            %tenancy_id,
            account_id = %account.id,
            amount = %account.amount,
            multiplier = %account.calculation_multiplier,
            "tenancy opened"
        );
        Ok((tenancy, account))
    }

    /// The tenant's charge succeeded.
    ///
    /// # Errors
    ///
    /// Not found, or the account is not `Pending`.
    pub fn record_payment(
        &self,
        account_id: AccountId,
        reference: &str,
        method: PaymentMethod,
    ) -> Result<DepositAccount, EngineError> {
        let now = self.clock.now();
        self.repo.update_account(account_id, |account| {
            account.mark_as_paid(reference, method, now)?;
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(%account_id, reference, "deposit paid");
        self.get_account(account_id)
    }

    /// The escrow provider confirmed it holds the funds.
    ///
    /// # Errors
    ///
    /// Not found, or the account is not `Paid`.
    pub fn confirm_escrow(
        &self,
        account_id: AccountId,
        escrow_reference: &str,
    ) -> Result<DepositAccount, EngineError> {
        let now = self.clock.now();
        self.repo.update_account(account_id, |account| {
            account.mark_as_held_in_escrow(escrow_reference, now)?;
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(%account_id, escrow_reference, "deposit held in escrow");
        self.get_account(account_id)
    }

    // ── Claims ──────────────────────────────────────────────────────────

    /// Create a draft claim. Only the tenancy's landlord may file.
    ///
    /// # Errors
    ///
    /// Not found, not the landlord, or an invalid amount.
    pub fn draft_claim(
        &self,
        landlord: PartyId,
        account_id: AccountId,
        request: NewClaim,
    ) -> Result<Claim, EngineError> {
        let now = self.clock.now();
        let account = self.get_account(account_id)?;
        let tenancy = self.get_tenancy(account.tenancy_id)?;
        require_landlord(&tenancy, landlord, "file a claim")?;
        let claim = Claim::draft(
            account.id,
            tenancy.id,
            landlord,
            request.category,
            request.description,
            request.amount,
            request.evidence_refs,
            now,
        )?;
        self.repo.insert_claim(claim.clone())?;
        tracing::info!(claim_id = %claim.id, %account_id, amount = %claim.claimed_amount, "claim drafted");
        Ok(claim)
    }

    /// Submit a draft, starting the tenant's response window, and notify
    /// the tenant.
    ///
    /// The availability check and the status change commit under the
    /// account's update, so two concurrent submissions cannot together
    /// overcommit the escrow.
    ///
    /// # Errors
    ///
    /// - Not found, or not the landlord.
    /// - [`LedgerError::AlreadyFinalized`] / [`LedgerError::NotInEscrow`].
    /// - `ClaimError::ExceedsAvailableEscrow`.
    pub fn submit_claim(&self, landlord: PartyId, claim_id: ClaimId) -> Result<Claim, EngineError> {
        let now = self.clock.now();
        let claim = self.get_claim(claim_id)?;
        let tenancy = self.get_tenancy(claim.tenancy_id)?;
        require_landlord(&tenancy, landlord, "submit a claim")?;
        let window = self.config.policy.response_window();

        let submitted = self.repo.update_account(claim.account_id, |account| {
            ensure_claimable(account)?;
            let claims = self.repo.claims_for_account(account.id);
            let available =
                FundReleaseCalculator::available_for_claims(account, &claims, Some(claim_id));
            self.repo.update_claim(claim_id, |claim| {
                claim.submit(available, window, now)?;
                Ok::<_, EngineError>(claim.clone())
            })
        })?;
        tracing::info!(
            %claim_id,
            account_id = %submitted.account_id,
            amount = %submitted.claimed_amount,
            deadline = ?submitted.tenant_response_deadline,
            "claim submitted"
        );

        if dispatch(
            self.notifier.as_ref(),
            tenancy.tenant_id,
            NotificationKind::ClaimSubmitted,
            claim_payload(&submitted),
        ) {
            self.repo.update_claim(claim_id, |claim| {
                claim.mark_tenant_notified(now)?;
                Ok::<_, EngineError>(())
            })?;
        }
        self.get_claim(claim_id)
    }

    /// Apply the tenant's response.
    ///
    /// Acceptance books the release in the same commit. A contest opens the
    /// dispute in the same commit.
    ///
    /// # Errors
    ///
    /// - Not found, or not the tenant.
    /// - `ClaimError::DeadlinePassed`, `ClaimError::AlreadyResponded`,
    ///   `ClaimError::AlreadyResolved` (auto-approval won),
    ///   `ClaimError::InvalidCounterAmount`.
    pub fn respond_to_claim(
        &self,
        tenant: PartyId,
        claim_id: ClaimId,
        response: TenantResponse,
    ) -> Result<ResponseOutcome, EngineError> {
        let now = self.clock.now();
        let claim = self.get_claim(claim_id)?;
        let tenancy = self.get_tenancy(claim.tenancy_id)?;
        if tenant != tenancy.tenant_id {
            return Err(not_a_party(tenant, "respond to", claim_id));
        }
        let mediation_window = self.config.policy.mediation_window();

        let outcome = self.repo.update_account(claim.account_id, |account| {
            self.repo.update_claim(claim_id, |claim| {
                let outcome = claim.respond(response, now)?;
                match outcome {
                    ResponseOutcome::Accepted { approved_amount } => {
                        account.record_release(claim.id, approved_amount, now)?;
                    }
                    ResponseOutcome::Contested { dispute_id } => {
                        let dispute = Dispute::open(dispute_id, claim, mediation_window, now)?;
                        self.repo.insert_dispute(dispute)?;
                    }
                }
                Ok::<_, EngineError>(outcome)
            })
        })?;

        match outcome {
            ResponseOutcome::Accepted { approved_amount } => {
                tracing::info!(%claim_id, %approved_amount, "claim accepted by tenant");
                self.notify_both(
                    &tenancy,
                    NotificationKind::ClaimResolved,
                    json!({
                        "claim_id": claim_id,
                        "approved_amount": approved_amount,
                        "resolution_method": ResolutionMethod::TenantAccepted,
                    }),
                );
            }
            ResponseOutcome::Contested { dispute_id } => {
                tracing::info!(%claim_id, %dispute_id, response = ?response.kind(), "claim contested");
                dispatch(
                    self.notifier.as_ref(),
                    tenancy.landlord_id,
                    NotificationKind::DisputeOpened,
                    json!({
                        "claim_id": claim_id,
                        "dispute_id": dispute_id,
                        "counter_amount": response.counter_amount(),
                    }),
                );
            }
        }
        Ok(outcome)
    }

    // ── Disputes ────────────────────────────────────────────────────────

    /// Apply the landlord's answer to the tenant's counter position.
    ///
    /// # Errors
    ///
    /// Not found, not the landlord, or an invalid dispute transition.
    pub fn respond_to_dispute(
        &self,
        landlord: PartyId,
        dispute_id: DisputeId,
        response: LandlordResponse,
    ) -> Result<DisputeOutcome, EngineError> {
        let dispute = self.get_dispute(dispute_id)?;
        let claim = self.get_claim(dispute.claim_id)?;
        let tenancy = self.get_tenancy(claim.tenancy_id)?;
        require_landlord(&tenancy, landlord, "answer a dispute")?;
        let now = self.clock.now();

        let outcome = self.apply_to_dispute(&claim, dispute_id, now, |dispute| {
            dispute.respond_landlord(response, now)
        })?;
        tracing::info!(%dispute_id, response = response.as_str(), ?outcome, "landlord answered dispute");
        self.announce_dispute_outcome(&tenancy, &claim, dispute_id, outcome);
        Ok(outcome)
    }

    /// Record a resolution fixed outside the system (mediator, arbitrator,
    /// administrator). Authorization of `resolver` is external.
    ///
    /// # Errors
    ///
    /// Not found, already resolved, a non-external method, or an amount
    /// outside `[0, claimed]`.
    pub fn resolve_dispute(
        &self,
        resolver: PartyId,
        dispute_id: DisputeId,
        amount: Decimal,
        method: ResolutionMethod,
    ) -> Result<DisputeOutcome, EngineError> {
        let dispute = self.get_dispute(dispute_id)?;
        let claim = self.get_claim(dispute.claim_id)?;
        let tenancy = self.get_tenancy(claim.tenancy_id)?;
        let now = self.clock.now();

        let outcome = self.apply_to_dispute(&claim, dispute_id, now, |dispute| {
            dispute.resolve(amount, method, resolver, now)
        })?;
        tracing::info!(%dispute_id, %resolver, %amount, %method, "dispute resolved externally");
        self.announce_dispute_outcome(&tenancy, &claim, dispute_id, outcome);
        Ok(outcome)
    }

    /// Run a dispute transition and feed its outcome back into the claim and
    /// the account in one nested commit.
    fn apply_to_dispute(
        &self,
        claim: &Claim,
        dispute_id: DisputeId,
        now: DateTime<Utc>,
        transition: impl FnOnce(&mut Dispute) -> Result<DisputeOutcome, deposit_claims::ClaimError>,
    ) -> Result<DisputeOutcome, EngineError> {
        self.repo.update_account(claim.account_id, |account| {
            self.repo.update_claim(claim.id, |claim| {
                self.repo.update_dispute(dispute_id, |dispute| {
                    let outcome = transition(dispute)?;
                    match outcome {
                        DisputeOutcome::Resolved { amount, method } => {
                            claim.resolve_from_dispute(dispute.id, amount, method, now)?;
                            if amount > Decimal::ZERO {
                                account.record_release(claim.id, amount, now)?;
                            }
                        }
                        DisputeOutcome::CounterRejected => claim.mark_counter_rejected(now)?,
                        DisputeOutcome::Escalated => claim.mark_escalated(now)?,
                    }
                    Ok::<_, EngineError>(outcome)
                })
            })
        })
    }

    fn announce_dispute_outcome(
        &self,
        tenancy: &Tenancy,
        claim: &Claim,
        dispute_id: DisputeId,
        outcome: DisputeOutcome,
    ) {
        match outcome {
            DisputeOutcome::Resolved { amount, method } => self.notify_both(
                tenancy,
                NotificationKind::ClaimResolved,
                json!({
                    "claim_id": claim.id,
                    "dispute_id": dispute_id,
                    "approved_amount": amount,
                    "resolution_method": method,
                }),
            ),
            DisputeOutcome::Escalated => self.notify_both(
                tenancy,
                NotificationKind::DisputeEscalated,
                json!({ "claim_id": claim.id, "dispute_id": dispute_id, "stage": "mediation" }),
            ),
            DisputeOutcome::CounterRejected => {
                dispatch(
                    self.notifier.as_ref(),
                    tenancy.tenant_id,
                    NotificationKind::DisputeOpened,
                    json!({
                        "claim_id": claim.id,
                        "dispute_id": dispute_id,
                        "landlord_response": LandlordResponse::RejectCounter,
                    }),
                );
            }
        }
    }

    fn notify_both(&self, tenancy: &Tenancy, kind: NotificationKind, payload: serde_json::Value) {
        notify_parties(self.notifier.as_ref(), tenancy, kind, payload);
    }
}

pub(crate) fn notify_parties(
    notifier: &dyn NotificationGateway,
    tenancy: &Tenancy,
    kind: NotificationKind,
    payload: serde_json::Value,
) -> bool {
    let landlord = dispatch(notifier, tenancy.landlord_id, kind, payload.clone());
    let tenant = dispatch(notifier, tenancy.tenant_id, kind, payload);
    landlord && tenant
}

pub(crate) fn claim_payload(claim: &Claim) -> serde_json::Value {
    json!({
        "claim_id": claim.id,
        "account_id": claim.account_id,
        "category": claim.category,
        "claimed_amount": claim.claimed_amount,
        "tenant_response_deadline": claim.tenant_response_deadline,
    })
}

fn ensure_claimable(account: &DepositAccount) -> Result<(), LedgerError> {
    if account.status.is_terminal() {
        return Err(LedgerError::AlreadyFinalized {
            account_id: account.id,
        });
    }
    if account.status != DepositStatus::HeldInEscrow {
        return Err(LedgerError::NotInEscrow {
            account_id: account.id,
            status: account.status.as_str().to_string(),
        });
    }
    Ok(())
}

fn require_landlord(
    tenancy: &Tenancy,
    party: PartyId,
    action: &'static str,
) -> Result<(), EngineError> {
    if party != tenancy.landlord_id {
        return Err(not_a_party(party, action, tenancy.id));
    }
    Ok(())
}

fn not_a_party(party: PartyId, action: &'static str, entity: impl ToString) -> EngineError {
    EngineError::NotAParty {
        party,
        action,
        entity: entity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::store::InMemoryRepository;
    use chrono::{Duration, TimeZone};
    use deposit_claims::{ClaimError, ClaimStatus, DisputeStatus};
    use deposit_core::ManualClock;
    use deposit_ledger::EmploymentType;
    use rust_decimal_macros::dec;

    struct Harness {
        service: DepositService<InMemoryRepository>,
        clock: ManualClock,
        notifier: Arc<RecordingNotifier>,
        tenancy: Tenancy,
        account_id: AccountId,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(start());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = DepositService::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(clock.clone()),
            notifier.clone(),
            EngineConfig::default(),
        );
        let (tenancy, account) = service
            .open_tenancy(NewTenancy {
                landlord_id: PartyId::new(),
                tenant_id: PartyId::new(),
                lease_start: start(),
                lease_end: start() + Duration::days(365),
                monthly_rent: dec!(2000),
                profile: TenantProfile {
                    employment_type: EmploymentType::Corporate,
                    credit_score: Some(780),
                    has_guarantor: false,
                    has_pets: false,
                },
                property: PropertyDetails::default(),
            })
            .unwrap();
        service
            .record_payment(account.id, "pay_1", PaymentMethod::Card)
            .unwrap();
        service.confirm_escrow(account.id, "esc_1").unwrap();
        Harness {
            service,
            clock,
            notifier,
            account_id: account.id,
            tenancy,
        }
    }

    fn submitted_claim(h: &Harness, amount: Decimal) -> Claim {
        let claim = h
            .service
            .draft_claim(
                h.tenancy.landlord_id,
                h.account_id,
                NewClaim {
                    category: ClaimCategory::Damage,
                    description: "scratched floor".to_string(),
                    amount,
                    evidence_refs: vec!["doc_1".to_string()],
                },
            )
            .unwrap();
        h.service
            .submit_claim(h.tenancy.landlord_id, claim.id)
            .unwrap()
    }

    #[test]
    fn opened_account_reaches_escrow() {
        let h = harness();
        let account = h.service.get_account(h.account_id).unwrap();
        assert_eq!(account.amount, dec!(4000));
        assert_eq!(account.status, DepositStatus::HeldInEscrow);
        assert_eq!(account.currency, "EUR");
        assert_eq!(account.version, 2);
    }

    #[test]
    fn submit_notifies_tenant() {
        let h = harness();
        let claim = submitted_claim(&h, dec!(800));
        assert_eq!(claim.status, ClaimStatus::TenantNotified);
        assert_eq!(
            claim.tenant_response_deadline,
            Some(start() + Duration::days(7))
        );
        assert_eq!(h.notifier.count(NotificationKind::ClaimSubmitted), 1);
    }

    #[test]
    fn failed_notification_keeps_claim_submitted() {
        let h = harness();
        h.notifier.set_failing(true);
        let claim = submitted_claim(&h, dec!(800));
        assert_eq!(claim.status, ClaimStatus::Submitted);
    }

    #[test]
    fn submit_beyond_available_escrow_fails() {
        let h = harness();
        submitted_claim(&h, dec!(3000));
        let claim = h
            .service
            .draft_claim(
                h.tenancy.landlord_id,
                h.account_id,
                NewClaim {
                    category: ClaimCategory::Cleaning,
                    description: "deep clean".to_string(),
                    amount: dec!(1500),
                    evidence_refs: vec![],
                },
            )
            .unwrap();
        let err = h
            .service
            .submit_claim(h.tenancy.landlord_id, claim.id)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Claim(ClaimError::ExceedsAvailableEscrow { .. })
        ));
        assert_eq!(h.service.get_claim(claim.id).unwrap().status, ClaimStatus::Draft);
    }

    #[test]
    fn only_the_landlord_files_and_only_the_tenant_responds() {
        let h = harness();
        let err = h
            .service
            .draft_claim(
                h.tenancy.tenant_id,
                h.account_id,
                NewClaim {
                    category: ClaimCategory::Other,
                    description: "x".to_string(),
                    amount: dec!(10),
                    evidence_refs: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAParty { .. }));

        let claim = submitted_claim(&h, dec!(100));
        let err = h
            .service
            .respond_to_claim(h.tenancy.landlord_id, claim.id, TenantResponse::Accept)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAParty { .. }));
    }

    #[test]
    fn acceptance_books_release() {
        let h = harness();
        let claim = submitted_claim(&h, dec!(800));
        let outcome = h
            .service
            .respond_to_claim(h.tenancy.tenant_id, claim.id, TenantResponse::Accept)
            .unwrap();
        assert_eq!(
            outcome,
            ResponseOutcome::Accepted {
                approved_amount: dec!(800)
            }
        );
        let breakdown = h.service.get_breakdown(h.account_id).unwrap();
        assert_eq!(breakdown.released_to_landlord, dec!(800));
        assert_eq!(breakdown.refunded_to_tenant, dec!(3200));
        assert_eq!(breakdown.remaining_in_escrow, Decimal::ZERO);
        assert_eq!(h.notifier.count(NotificationKind::ClaimResolved), 2);
    }

    #[test]
    fn response_at_deadline_accepted_after_rejected() {
        let h = harness();
        let on_time = submitted_claim(&h, dec!(100));
        let late = submitted_claim(&h, dec!(100));
        h.clock.advance(Duration::days(7));
        h.service
            .respond_to_claim(h.tenancy.tenant_id, on_time.id, TenantResponse::Accept)
            .unwrap();
        h.clock.advance(Duration::seconds(1));
        let err = h
            .service
            .respond_to_claim(h.tenancy.tenant_id, late.id, TenantResponse::Accept)
            .unwrap_err();
        assert!(matches!(err, EngineError::Claim(ClaimError::DeadlinePassed { .. })));
    }

    #[test]
    fn counter_accepted_resolves_at_counter() {
        let h = harness();
        let claim = submitted_claim(&h, dec!(800));
        let ResponseOutcome::Contested { dispute_id } = h
            .service
            .respond_to_claim(
                h.tenancy.tenant_id,
                claim.id,
                TenantResponse::PartialAccept {
                    counter_amount: dec!(400),
                },
            )
            .unwrap()
        else {
            panic!("expected a dispute");
        };
        assert_eq!(h.notifier.count(NotificationKind::DisputeOpened), 1);

        let outcome = h
            .service
            .respond_to_dispute(h.tenancy.landlord_id, dispute_id, LandlordResponse::AcceptCounter)
            .unwrap();
        assert_eq!(
            outcome,
            DisputeOutcome::Resolved {
                amount: dec!(400),
                method: ResolutionMethod::CounterAccepted
            }
        );
        let claim = h.service.get_claim(claim.id).unwrap();
        assert_eq!(claim.status, ClaimStatus::Resolved);
        assert_eq!(claim.approved_amount, Some(dec!(400)));
        let dispute = h.service.get_dispute(dispute_id).unwrap();
        assert_eq!(dispute.resolution_amount, Some(dec!(400)));
        let account = h.service.get_account(h.account_id).unwrap();
        assert_eq!(account.released_amount, dec!(400));
    }

    #[test]
    fn sub_cent_amounts_are_judged_after_rounding() {
        let h = harness();
        let err = h
            .service
            .draft_claim(
                h.tenancy.landlord_id,
                h.account_id,
                NewClaim {
                    category: ClaimCategory::Cleaning,
                    description: "smudge".to_string(),
                    amount: dec!(0.004),
                    evidence_refs: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Claim(ClaimError::Validation(_))));

        let claim = submitted_claim(&h, dec!(800));
        let err = h
            .service
            .respond_to_claim(
                h.tenancy.tenant_id,
                claim.id,
                TenantResponse::PartialAccept {
                    counter_amount: dec!(799.999),
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Claim(ClaimError::InvalidCounterAmount { .. })
        ));

        let ResponseOutcome::Contested { dispute_id } = h
            .service
            .respond_to_claim(
                h.tenancy.tenant_id,
                claim.id,
                TenantResponse::PartialAccept {
                    counter_amount: dec!(799.994),
                },
            )
            .unwrap()
        else {
            panic!("expected a dispute");
        };
        h.service
            .respond_to_dispute(h.tenancy.landlord_id, dispute_id, LandlordResponse::AcceptCounter)
            .unwrap();
        let account = h.service.get_account(h.account_id).unwrap();
        assert_eq!(account.released_amount, dec!(799.99));
        h.service.get_breakdown(h.account_id).unwrap();
    }

    #[test]
    fn rejection_then_escalation_then_external_resolution() {
        let h = harness();
        let claim = submitted_claim(&h, dec!(800));
        let ResponseOutcome::Contested { dispute_id } = h
            .service
            .respond_to_claim(h.tenancy.tenant_id, claim.id, TenantResponse::Reject)
            .unwrap()
        else {
            panic!("expected a dispute");
        };
        h.service
            .respond_to_dispute(h.tenancy.landlord_id, dispute_id, LandlordResponse::RejectCounter)
            .unwrap();
        assert_eq!(
            h.service.get_claim(claim.id).unwrap().status,
            ClaimStatus::Disputed
        );
        h.service
            .respond_to_dispute(h.tenancy.landlord_id, dispute_id, LandlordResponse::Escalate)
            .unwrap();
        assert_eq!(
            h.service.get_claim(claim.id).unwrap().status,
            ClaimStatus::Mediation
        );
        assert_eq!(
            h.service.get_dispute(dispute_id).unwrap().status,
            DisputeStatus::UnderMediation
        );

        let breakdown = h.service.get_breakdown(h.account_id).unwrap();
        assert_eq!(breakdown.remaining_in_escrow, dec!(800));

        let mediator = PartyId::new();
        h.service
            .resolve_dispute(mediator, dispute_id, dec!(650), ResolutionMethod::Mediation)
            .unwrap();
        let dispute = h.service.get_dispute(dispute_id).unwrap();
        assert_eq!(dispute.resolved_by, Some(mediator));
        let err = h
            .service
            .resolve_dispute(mediator, dispute_id, dec!(100), ResolutionMethod::Mediation)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Claim(ClaimError::DisputeAlreadyResolved { .. })
        ));
        assert_eq!(
            h.service.get_dispute(dispute_id).unwrap().resolution_amount,
            Some(dec!(650))
        );
        assert_eq!(
            h.service.get_breakdown(h.account_id).unwrap().released_to_landlord,
            dec!(650)
        );
    }

    #[test]
    fn zero_resolution_releases_nothing() {
        let h = harness();
        let claim = submitted_claim(&h, dec!(800));
        let ResponseOutcome::Contested { dispute_id } = h
            .service
            .respond_to_claim(h.tenancy.tenant_id, claim.id, TenantResponse::Reject)
            .unwrap()
        else {
            panic!("expected a dispute");
        };
        h.service
            .respond_to_dispute(h.tenancy.landlord_id, dispute_id, LandlordResponse::AcceptCounter)
            .unwrap();
        let breakdown = h.service.get_breakdown(h.account_id).unwrap();
        assert_eq!(breakdown.released_to_landlord, Decimal::ZERO);
        assert_eq!(breakdown.refunded_to_tenant, dec!(4000));
    }

    #[test]
    fn breakdown_before_escrow_is_rejected() {
        let h = harness();
        let (_, pending) = h
            .service
            .open_tenancy(NewTenancy {
                landlord_id: PartyId::new(),
                tenant_id: PartyId::new(),
                lease_start: start(),
                lease_end: start() + Duration::days(30),
                monthly_rent: dec!(900),
                profile: TenantProfile {
                    employment_type: EmploymentType::Student,
                    credit_score: None,
                    has_guarantor: true,
                    has_pets: false,
                },
                property: PropertyDetails::default(),
            })
            .unwrap();
        assert!(matches!(
            h.service.get_breakdown(pending.id),
            Err(EngineError::Ledger(LedgerError::NotInEscrow { .. }))
        ));
        assert!(matches!(
            h.service.get_breakdown(AccountId::new()),
            Err(EngineError::Store(_))
        ));
    }
}
