//! # Deposit Lifecycle Integration Tests
//!
//! End-to-end flows through the service and the deadline scheduler:
//! - Deposit quote for a low-risk tenant
//! - Auto-approval after the tenant stays silent
//! - Counter offer accepted by the landlord
//! - Mediation lapse flagged for forced resolution
//! - Inspection window closure refunds the remainder

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use deposit_claims::{
    ClaimCategory, ClaimStatus, DisputeOutcome, DisputeStatus, LandlordResponse,
    ResolutionMethod, ResponseOutcome, TenantResponse,
};
use deposit_core::{AccountId, ClaimId, Clock, DisputeId, ManualClock, PartyId};
use deposit_engine::{
    DepositService, EngineConfig, InMemoryRepository, NewClaim, NewTenancy, NotificationKind,
    RecordingNotifier, SweepStep,
};
use deposit_ledger::{
    DepositStatus, EmploymentType, PaymentMethod, PropertyDetails, ReleasePhase, Tenancy,
    TenantProfile,
};

struct World {
    service: DepositService<InMemoryRepository>,
    clock: ManualClock,
    notifier: Arc<RecordingNotifier>,
    tenancy: Tenancy,
    account_id: AccountId,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap()
}

fn corporate() -> TenantProfile {
    TenantProfile {
        employment_type: EmploymentType::Corporate,
        credit_score: Some(780),
        has_guarantor: false,
        has_pets: false,
    }
}

/// A 2000/month tenancy whose lease ends `lease_days` after `t0`, with the
/// deposit paid and held in escrow.
fn world(lease_days: i64) -> World {
    let clock = ManualClock::new(t0());
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
            lease_start: t0() - Duration::days(365),
            lease_end: t0() + Duration::days(lease_days),
            monthly_rent: dec!(2000),
            profile: corporate(),
            property: PropertyDetails::default(),
        })
        .unwrap();
    service
        .record_payment(account.id, "pi_2026_0504", PaymentMethod::BankTransfer)
        .unwrap();
    service.confirm_escrow(account.id, "escrow_7731").unwrap();
    World {
        service,
        clock,
        notifier,
        tenancy,
        account_id: account.id,
    }
}

fn file_claim(w: &World, amount: Decimal) -> ClaimId {
    let claim = w
        .service
        .draft_claim(
            w.tenancy.landlord_id,
            w.account_id,
            NewClaim {
                category: ClaimCategory::Damage,
                description: "broken kitchen cabinet door".to_string(),
                amount,
                evidence_refs: vec!["photo_01".to_string(), "invoice_17".to_string()],
            },
        )
        .unwrap();
    w.service
        .submit_claim(w.tenancy.landlord_id, claim.id)
        .unwrap()
        .id
}

fn contest(w: &World, claim_id: ClaimId, response: TenantResponse) -> DisputeId {
    match w
        .service
        .respond_to_claim(w.tenancy.tenant_id, claim_id, response)
        .unwrap()
    {
        ResponseOutcome::Contested { dispute_id } => dispute_id,
        other => panic!("expected a contest, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 1. Deposit quote
// ---------------------------------------------------------------------------

#[test]
fn low_risk_tenant_pays_two_months() {
    let w = world(60);
    let calc = w
        .service
        .calculate_deposit_amount(dec!(2000), &corporate(), &PropertyDetails::default())
        .unwrap();
    assert_eq!(calc.final_multiplier, dec!(2.0));
    assert_eq!(calc.amount, dec!(4000.00));

    let account = w.service.get_account(w.account_id).unwrap();
    assert_eq!(account.amount, dec!(4000.00));
    assert_eq!(account.calculation_multiplier, dec!(2.0));
    assert_eq!(account.status, DepositStatus::HeldInEscrow);
}

// ---------------------------------------------------------------------------
// 2. Auto-approval
// ---------------------------------------------------------------------------

#[test]
fn silent_tenant_claim_auto_approves_after_deadline() {
    let w = world(60);
    let claim_id = file_claim(&w, dec!(800));
    let auto_approve_at = w
        .service
        .get_claim(claim_id)
        .unwrap()
        .auto_approve_at
        .unwrap();

    w.clock.set(auto_approve_at);
    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::AutoApproval), 0);

    w.clock.set(auto_approve_at + Duration::minutes(1));
    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::AutoApproval), 1);

    let claim = w.service.get_claim(claim_id).unwrap();
    assert_eq!(claim.status, ClaimStatus::Resolved);
    assert_eq!(claim.approved_amount, Some(dec!(800)));
    assert_eq!(
        claim.resolution_method,
        Some(ResolutionMethod::AutoApprovedNoResponse)
    );
    assert_eq!(
        serde_json::to_value(claim.resolution_method).unwrap(),
        "auto_approved_no_response"
    );
    assert_eq!(w.notifier.count(NotificationKind::ClaimAutoApproved), 2);

    let breakdown = w.service.get_breakdown(w.account_id).unwrap();
    assert_eq!(breakdown.released_to_landlord, dec!(800));
    assert_eq!(breakdown.refunded_to_tenant, dec!(3200));
    assert_eq!(breakdown.phase, ReleasePhase::AwaitingFinalization);
}

#[test]
fn reminder_precedes_auto_approval() {
    let w = world(60);
    let claim_id = file_claim(&w, dec!(300));

    w.clock.advance(Duration::days(6) + Duration::hours(1));
    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::DeadlineReminder), 1);
    assert_eq!(w.notifier.count(NotificationKind::ClaimResponseReminder), 1);
    assert_eq!(
        w.service.get_claim(claim_id).unwrap().status,
        ClaimStatus::TenantNotified
    );
}

// ---------------------------------------------------------------------------
// 3. Counter offer
// ---------------------------------------------------------------------------

#[test]
fn landlord_accepts_partial_counter() {
    let w = world(60);
    let claim_id = file_claim(&w, dec!(800));
    let dispute_id = contest(
        &w,
        claim_id,
        TenantResponse::PartialAccept {
            counter_amount: dec!(400),
        },
    );

    let breakdown = w.service.get_breakdown(w.account_id).unwrap();
    assert_eq!(breakdown.phase, ReleasePhase::Contested);
    assert_eq!(breakdown.remaining_in_escrow, dec!(800));

    let outcome = w
        .service
        .respond_to_dispute(w.tenancy.landlord_id, dispute_id, LandlordResponse::AcceptCounter)
        .unwrap();
    assert_eq!(
        outcome,
        DisputeOutcome::Resolved {
            amount: dec!(400),
            method: ResolutionMethod::CounterAccepted,
        }
    );

    let dispute = w.service.get_dispute(dispute_id).unwrap();
    assert_eq!(dispute.resolution_amount, Some(dec!(400)));
    assert_eq!(dispute.status, DisputeStatus::Resolved);
    let claim = w.service.get_claim(claim_id).unwrap();
    assert_eq!(claim.approved_amount, Some(dec!(400)));
    assert_eq!(claim.status, ClaimStatus::Resolved);

    let breakdown = w.service.get_breakdown(w.account_id).unwrap();
    assert_eq!(breakdown.released_to_landlord, dec!(400));
    assert_eq!(breakdown.refunded_to_tenant, dec!(3600));
    assert_eq!(breakdown.remaining_in_escrow, Decimal::ZERO);
}

// ---------------------------------------------------------------------------
// 4. Mediation lapse
// ---------------------------------------------------------------------------

#[test]
fn lapsed_mediation_is_flagged_not_resolved() {
    let w = world(60);
    let claim_id = file_claim(&w, dec!(800));
    let dispute_id = contest(&w, claim_id, TenantResponse::Reject);
    w.service
        .respond_to_dispute(w.tenancy.landlord_id, dispute_id, LandlordResponse::Escalate)
        .unwrap();

    let dispute = w.service.get_dispute(dispute_id).unwrap();
    assert_eq!(dispute.status, DisputeStatus::UnderMediation);
    assert_eq!(dispute.mediation_deadline, t0() + Duration::days(14));
    assert!(!dispute.can_escalate(t0() + Duration::days(14)));

    w.clock.set(t0() + Duration::days(14) + Duration::seconds(1));
    assert!(w
        .service
        .get_dispute(dispute_id)
        .unwrap()
        .can_escalate(w.clock.now()));
    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::DisputeEscalation), 1);

    let dispute = w.service.get_dispute(dispute_id).unwrap();
    assert_eq!(dispute.status, DisputeStatus::UnderMediation);
    assert!(dispute.escalated_at.is_some());
    assert_eq!(dispute.resolution_amount, None);
    assert_eq!(
        w.service.get_claim(claim_id).unwrap().status,
        ClaimStatus::Mediation
    );
    assert_eq!(w.notifier.count(NotificationKind::DisputeEscalated), 2);

    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::DisputeEscalation), 0);

    w.service
        .resolve_dispute(PartyId::new(), dispute_id, dec!(500), ResolutionMethod::Arbitration)
        .unwrap();
    assert_eq!(
        w.service.get_breakdown(w.account_id).unwrap().released_to_landlord,
        dec!(500)
    );
}

// ---------------------------------------------------------------------------
// 5. Inspection window closure
// ---------------------------------------------------------------------------

#[test]
fn lease_ended_eight_days_ago_refunds_everything() {
    let w = world(-8);
    let report = w.service.scheduler().run_sweep();
    assert_eq!(report.count(SweepStep::InspectionClosure), 1);

    let account = w.service.get_account(w.account_id).unwrap();
    assert_eq!(account.status, DepositStatus::Refunded);
    assert_eq!(account.refunded_amount, dec!(4000));
    assert_eq!(account.remaining_amount(), Decimal::ZERO);

    let breakdown = w.service.get_breakdown(w.account_id).unwrap();
    assert_eq!(breakdown.phase, ReleasePhase::Finalized);
    assert_eq!(breakdown.refunded_to_tenant, dec!(4000));
    assert_eq!(breakdown.remaining_in_escrow, Decimal::ZERO);
    assert_eq!(w.notifier.count(NotificationKind::DepositFinalized), 2);
}

#[test]
fn resolved_claim_then_closure_splits_the_deposit() {
    let w = world(3);
    let claim_id = file_claim(&w, dec!(1250.50));
    w.service
        .respond_to_claim(w.tenancy.tenant_id, claim_id, TenantResponse::Accept)
        .unwrap();

    w.clock.advance(Duration::days(11));
    w.service.scheduler().run_sweep();

    let account = w.service.get_account(w.account_id).unwrap();
    assert_eq!(account.status, DepositStatus::PartiallyReleased);
    assert_eq!(account.released_amount, dec!(1250.50));
    assert_eq!(account.refunded_amount, dec!(2749.50));
    assert_eq!(
        account.released_amount + account.refunded_amount,
        account.amount
    );
}
