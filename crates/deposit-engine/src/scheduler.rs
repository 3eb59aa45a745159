//! # Deadline Scheduler
//!
//! One sweep applies every time-triggered transition that is due. The
//! scheduler holds no state of its own: every guard is re-evaluated from the
//! repository at the sweep's instant, so a second sweep with nothing new to
//! do changes nothing.
//!
//! ## Steps, in order
//!
//! 1. **Redelivery**: claims still `Submitted` (tenant notification failed)
//!    are notified again and moved to `TenantNotified`.
//! 2. **Auto-approval**: claims past `auto_approve_at` with no response.
//! 3. **Reminders**: claims whose response deadline is within the lead.
//! 4. **Escalation**: disputes whose mediation window lapsed unresolved are
//!    flagged for forced resolution.
//! 5. **Lease notices**: tenancies ending within the notice window.
//! 6. **Inspection closure**: tenancies past the inspection window with no
//!    open claims are finalized.
//!
//! Items are independent. A failing item is logged and recorded in the
//! [`SweepReport`]; the rest of the sweep continues. Nothing is retried
//! within a sweep; the next sweep re-evaluates the guards.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use deposit_claims::{Claim, ClaimStatus, Dispute};
use deposit_core::{Clock, TenancyId};
use deposit_ledger::{DepositStatus, FundReleaseCalculator, Tenancy};

use crate::config::DeadlinePolicy;
use crate::error::EngineError;
use crate::notify::{dispatch, NotificationGateway, NotificationKind};
use crate::service::{claim_payload, notify_parties};
use crate::store::DepositRepository;

/// A sweep step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStep {
    /// Tenant notification redelivery.
    NotificationRedelivery,
    /// Claim auto-approval.
    AutoApproval,
    /// Response deadline reminder.
    DeadlineReminder,
    /// Dispute forced-resolution flag.
    DisputeEscalation,
    /// Lease expiry advance notice.
    LeaseExpiryNotice,
    /// Inspection window closure and finalization.
    InspectionClosure,
}

impl SweepStep {
    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotificationRedelivery => "notification_redelivery",
            Self::AutoApproval => "auto_approval",
            Self::DeadlineReminder => "deadline_reminder",
            Self::DisputeEscalation => "dispute_escalation",
            Self::LeaseExpiryNotice => "lease_expiry_notice",
            Self::InspectionClosure => "inspection_closure",
        }
    }
}

impl std::fmt::Display for SweepStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition the sweep applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepAction {
    /// Step.
    pub step: SweepStep,
    /// Affected record.
    pub entity: String,
    /// What changed.
    pub detail: String,
}

/// An item the sweep could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// Step.
    pub step: SweepStep,
    /// Affected record.
    pub entity: String,
    /// Error message.
    pub error: String,
    /// Whether the error is a consistency violation.
    pub fatal: bool,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// The instant every guard was evaluated at.
    pub swept_at: DateTime<Utc>,
    /// Applied transitions.
    pub actions: Vec<SweepAction>,
    /// Failed items.
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(swept_at: DateTime<Utc>) -> Self {
        Self {
            swept_at,
            actions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Nothing was applied and nothing failed.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.failures.is_empty()
    }

    /// Number of actions taken by `step`.
    pub fn count(&self, step: SweepStep) -> usize {
        self.actions.iter().filter(|a| a.step == step).count()
    }

    /// Whether any item hit a consistency violation.
    pub fn has_fatal(&self) -> bool {
        self.failures.iter().any(|f| f.fatal)
    }

    fn record(
        &mut self,
        step: SweepStep,
        entity: impl ToString,
        result: Result<Option<String>, EngineError>,
    ) {
        let entity = entity.to_string();
        match result {
            Ok(Some(detail)) => self.actions.push(SweepAction {
                step,
                entity,
                detail,
            }),
            Ok(None) => {}
            Err(e) => {
                let fatal = e.is_fatal();
                if fatal {
                    tracing::error!(%step, %entity, error = %e, "consistency violation, item halted");
                } else {
                    tracing::error!(%step, %entity, error = %e, "sweep item failed");
                }
                self.failures.push(SweepFailure {
                    step,
                    entity,
                    error: e.to_string(),
                    fatal,
                });
            }
        }
    }
}

/// Applies time-triggered transitions.
pub struct DeadlineScheduler<R> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationGateway>,
    policy: DeadlinePolicy,
}

impl<R: DepositRepository> DeadlineScheduler<R> {
    /// Assemble a scheduler.
    pub fn new(
        repo: Arc<R>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationGateway>,
        policy: DeadlinePolicy,
    ) -> Self {
        Self {
            repo,
            clock,
            notifier,
            policy,
        }
    }

    /// Run every step once at the clock's current instant.
    pub fn run_sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::new(now);
        let tenancies: HashMap<TenancyId, Tenancy> = self
            .repo
            .tenancies()
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        self.redeliver(now, &tenancies, &mut report);
        self.auto_approve(now, &tenancies, &mut report);
        self.remind(now, &tenancies, &mut report);
        self.escalate(now, &tenancies, &mut report);
        self.notify_lease_expiry(now, &mut report);
        self.close_inspection_windows(now, &mut report);

        tracing::info!(
            swept_at = %now,
            actions = report.actions.len(),
            failures = report.failures.len(),
            "deadline sweep finished"
        );
        report
    }

    fn redeliver(
        &self,
        now: DateTime<Utc>,
        tenancies: &HashMap<TenancyId, Tenancy>,
        report: &mut SweepReport,
    ) {
        for claim in self.claims_where(|c| c.status == ClaimStatus::Submitted) {
            let result = self.tenancy_of(tenancies, &claim).and_then(|tenancy| {
                if !dispatch(
                    self.notifier.as_ref(),
                    tenancy.tenant_id,
                    NotificationKind::ClaimSubmitted,
                    claim_payload(&claim),
                ) {
                    return Ok(None);
                }
                self.repo.update_claim(claim.id, |claim| {
                    claim.mark_tenant_notified(now)?;
                    Ok::<_, EngineError>(Some("tenant notified".to_string()))
                })
            });
            report.record(SweepStep::NotificationRedelivery, claim.id, result);
        }
    }

    fn auto_approve(
        &self,
        now: DateTime<Utc>,
        tenancies: &HashMap<TenancyId, Tenancy>,
        report: &mut SweepReport,
    ) {
        for claim in self.claims_where(|c| c.can_auto_approve(now)) {
            let result = self
                .repo
                .update_account(claim.account_id, |account| {
                    self.repo.update_claim(claim.id, |claim| {
                        let amount = claim.auto_approve(now)?;
                        account.record_release(claim.id, amount, now)?;
                        Ok::<_, EngineError>(amount)
                    })
                })
                .map(|amount| {
                    tracing::info!(claim_id = %claim.id, %amount, "claim auto-approved");
                    if let Some(tenancy) = tenancies.get(&claim.tenancy_id) {
                        notify_parties(
                            self.notifier.as_ref(),
                            tenancy,
                            NotificationKind::ClaimAutoApproved,
                            json!({
                                "claim_id": claim.id,
                                "approved_amount": amount,
                                "resolution_method": "auto_approved_no_response",
                            }),
                        );
                    }
                    Some(format!("approved {amount}"))
                });
            report.record(SweepStep::AutoApproval, claim.id, result);
        }
    }

    fn remind(
        &self,
        now: DateTime<Utc>,
        tenancies: &HashMap<TenancyId, Tenancy>,
        report: &mut SweepReport,
    ) {
        let lead = self.policy.reminder_lead();
        for claim in self.claims_where(|c| c.needs_reminder(now, lead)) {
            let result = self.tenancy_of(tenancies, &claim).and_then(|tenancy| {
                self.repo.update_claim(claim.id, |claim| {
                    claim.mark_reminder_sent(now)?;
                    Ok::<_, EngineError>(())
                })?;
                dispatch(
                    self.notifier.as_ref(),
                    tenancy.tenant_id,
                    NotificationKind::ClaimResponseReminder,
                    claim_payload(&claim),
                );
                Ok(Some("reminder requested".to_string()))
            });
            report.record(SweepStep::DeadlineReminder, claim.id, result);
        }
    }

    fn escalate(
        &self,
        now: DateTime<Utc>,
        tenancies: &HashMap<TenancyId, Tenancy>,
        report: &mut SweepReport,
    ) {
        let window = self.policy.escalation_window();
        let due: Vec<Dispute> = self
            .repo
            .disputes()
            .into_iter()
            .filter(|d| d.needs_forced_resolution_flag(now))
            .collect();
        for dispute in due {
            let result = self
                .repo
                .update_dispute(dispute.id, |dispute| {
                    dispute.flag_for_forced_resolution(window, now)?;
                    Ok::<_, EngineError>(dispute.escalation_deadline)
                })
                .map(|deadline| {
                    tracing::warn!(dispute_id = %dispute.id, claim_id = %dispute.claim_id, "dispute flagged for forced resolution");
                    let tenancy = self
                        .repo
                        .claim(dispute.claim_id)
                        .and_then(|c| tenancies.get(&c.tenancy_id));
                    if let Some(tenancy) = tenancy {
                        let payload = json!({
                            "dispute_id": dispute.id,
                            "claim_id": dispute.claim_id,
                            "mediation_deadline": dispute.mediation_deadline,
                            "escalation_deadline": deadline,
                            "stage": "forced_resolution",
                        });
                        notify_parties(
                            self.notifier.as_ref(),
                            tenancy,
                            NotificationKind::DisputeEscalated,
                            payload.clone(),
                        );
                        notify_parties(
                            self.notifier.as_ref(),
                            tenancy,
                            NotificationKind::MediationReminder,
                            payload,
                        );
                    }
                    Some("flagged for forced resolution".to_string())
                });
            report.record(SweepStep::DisputeEscalation, dispute.id, result);
        }
    }

    fn notify_lease_expiry(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let window = self.policy.lease_notice_window();
        for tenancy in self
            .repo
            .tenancies()
            .into_iter()
            .filter(|t| t.needs_lease_expiry_notice(now, window))
        {
            let result = self
                .repo
                .update_tenancy(tenancy.id, |t| {
                    if !t.needs_lease_expiry_notice(now, window) {
                        return Ok(false);
                    }
                    Ok::<_, EngineError>(t.mark_lease_expiry_notified(now))
                })
                .map(|marked| {
                    marked.then(|| {
                        notify_parties(
                            self.notifier.as_ref(),
                            &tenancy,
                            NotificationKind::LeaseExpiryNotice,
                            json!({ "tenancy_id": tenancy.id, "lease_end": tenancy.lease_end }),
                        );
                        format!("lease ends {}", tenancy.lease_end)
                    })
                });
            report.record(SweepStep::LeaseExpiryNotice, tenancy.id, result);
        }
    }

    fn close_inspection_windows(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let window = self.policy.inspection_window();
        for tenancy in self.repo.tenancies() {
            if tenancy.inspection_closed_at.is_some()
                || !tenancy.inspection_window_closed(now, window)
            {
                continue;
            }
            let Some(account) = self.repo.account(tenancy.account_id) else {
                report.record(
                    SweepStep::InspectionClosure,
                    tenancy.id,
                    Err(EngineError::not_found("deposit", tenancy.account_id)),
                );
                continue;
            };
            if account.status != DepositStatus::HeldInEscrow {
                continue;
            }
            let claims = self.repo.claims_for_account(account.id);
            if claims.iter().any(|c| c.status.is_open()) {
                continue;
            }

            let result = self
                .repo
                .update_tenancy(tenancy.id, |t| {
                    self.repo.update_account(t.account_id, |account| {
                        let claims = self.repo.claims_for_account(account.id);
                        let breakdown = FundReleaseCalculator::finalize(account, &claims, now)?;
                        t.mark_inspection_closed(now);
                        Ok::<_, EngineError>(breakdown)
                    })
                })
                .map(|breakdown| {
                    notify_parties(
                        self.notifier.as_ref(),
                        &tenancy,
                        NotificationKind::DepositFinalized,
                        json!({
                            "account_id": breakdown.account_id,
                            "released_to_landlord": breakdown.released_to_landlord,
                            "refunded_to_tenant": breakdown.refunded_to_tenant,
                            "status": breakdown.account_status,
                        }),
                    );
                    Some(format!(
                        "released {} refunded {}",
                        breakdown.released_to_landlord, breakdown.refunded_to_tenant
                    ))
                });
            report.record(SweepStep::InspectionClosure, tenancy.id, result);
        }
    }

    fn claims_where(&self, pred: impl Fn(&Claim) -> bool) -> Vec<Claim> {
        self.repo.claims().into_iter().filter(|c| pred(c)).collect()
    }

    fn tenancy_of<'a>(
        &self,
        tenancies: &'a HashMap<TenancyId, Tenancy>,
        claim: &Claim,
    ) -> Result<&'a Tenancy, EngineError> {
        tenancies
            .get(&claim.tenancy_id)
            .ok_or_else(|| EngineError::not_found("tenancy", claim.tenancy_id))
    }
}
