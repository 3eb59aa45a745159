//! # Notifications
//!
//! The engine decides *that* a party should be told something; delivery is
//! the gateway's business. Dispatch is fire-and-forget: a failed send is
//! logged and never rolls back the state transition that triggered it.

use std::sync::atomic::{AtomicBool, Ordering};

use deposit_core::PartyId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::NotificationError;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Tenant: a claim was filed against the deposit.
    ClaimSubmitted,
    /// Tenant: the response deadline is close.
    ClaimResponseReminder,
    /// Both parties: a claim was approved because the tenant did not respond.
    ClaimAutoApproved,
    /// Both parties: a claim reached its final amount.
    ClaimResolved,
    /// Landlord: the tenant contested a claim.
    DisputeOpened,
    /// Both parties: a dispute was flagged for forced resolution.
    DisputeEscalated,
    /// Both parties: mediation is overdue.
    MediationReminder,
    /// Both parties: the lease ends soon.
    LeaseExpiryNotice,
    /// Both parties: the deposit was finalized.
    DepositFinalized,
}

impl NotificationKind {
    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimSubmitted => "claim_submitted",
            Self::ClaimResponseReminder => "claim_response_reminder",
            Self::ClaimAutoApproved => "claim_auto_approved",
            Self::ClaimResolved => "claim_resolved",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeEscalated => "dispute_escalated",
            Self::MediationReminder => "mediation_reminder",
            Self::LeaseExpiryNotice => "lease_expiry_notice",
            Self::DepositFinalized => "deposit_finalized",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound notification channel.
pub trait NotificationGateway: Send + Sync {
    /// Hand a notification to the delivery channel.
    fn notify(
        &self,
        recipient: PartyId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl NotificationGateway for LoggingNotifier {
    fn notify(
        &self,
        recipient: PartyId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        tracing::info!(%recipient, %kind, %payload, "notification");
        Ok(())
    }
}

/// A captured notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub recipient: PartyId,
    /// Kind.
    pub kind: NotificationKind,
    /// Payload.
    pub payload: serde_json::Value,
}

/// Keeps every notification in memory. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Empty recorder that accepts every notification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// How many notifications of `kind` were delivered.
    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }
}

impl NotificationGateway for RecordingNotifier {
    fn notify(
        &self,
        recipient: PartyId,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError {
                kind: kind.to_string(),
                recipient,
                reason: "channel unavailable".to_string(),
            });
        }
        self.sent.lock().push(Notification {
            recipient,
            kind,
            payload,
        });
        Ok(())
    }
}

/// Send and log the outcome. Returns whether the gateway accepted it.
pub(crate) fn dispatch(
    gateway: &dyn NotificationGateway,
    recipient: PartyId,
    kind: NotificationKind,
    payload: serde_json::Value,
) -> bool {
    match gateway.notify(recipient, kind, payload) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(%recipient, %kind, error = %e, "notification dispatch failed");
            false
        }
    }
}
