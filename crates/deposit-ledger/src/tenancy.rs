//! # Tenancy
//!
//! Lease dates and parties for one deposit. The tenancy drives two
//! time-based sweep steps: the advance notice before the lease ends, and
//! closure of the inspection window after it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use deposit_core::{AccountId, PartyId, TenancyId, ValidationError};

/// A lease between one landlord and one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenancy {
    /// Unique tenancy identifier.
    pub id: TenancyId,
    /// Landlord party.
    pub landlord_id: PartyId,
    /// Tenant party.
    pub tenant_id: PartyId,
    /// The deposit account of this tenancy.
    pub account_id: AccountId,
    /// Lease start.
    pub lease_start: DateTime<Utc>,
    /// Lease end. The inspection window opens here.
    pub lease_end: DateTime<Utc>,
    /// When the advance lease-expiry notice was requested.
    pub lease_expiry_notified_at: Option<DateTime<Utc>>,
    /// When the inspection window was closed and the deposit finalized.
    pub inspection_closed_at: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version.
    pub version: u64,
}

impl Tenancy {
    /// Create a tenancy.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidDateRange`] if the lease does not end after it starts.
    pub fn new(
        id: TenancyId,
        landlord_id: PartyId,
        tenant_id: PartyId,
        account_id: AccountId,
        lease_start: DateTime<Utc>,
        lease_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if lease_end <= lease_start {
            return Err(ValidationError::InvalidDateRange {
                field: "lease",
                reason: format!("end {lease_end} is not after start {lease_start}"),
            });
        }
        Ok(Self {
            id,
            landlord_id,
            tenant_id,
            account_id,
            lease_start,
            lease_end,
            lease_expiry_notified_at: None,
            inspection_closed_at: None,
            created_at: now,
            version: 0,
        })
    }

    /// Whether the party is the landlord or the tenant.
    pub fn is_party(&self, party: PartyId) -> bool {
        party == self.landlord_id || party == self.tenant_id
    }

    /// The lease ends within `window` from now and no notice was sent yet.
    pub fn needs_lease_expiry_notice(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if self.lease_expiry_notified_at.is_some() {
            return false;
        }
        let until_end = self.lease_end - now;
        until_end >= Duration::zero() && until_end <= window
    }

    /// Record that the advance notice was requested. Returns `false` if it
    /// already had been.
    pub fn mark_lease_expiry_notified(&mut self, now: DateTime<Utc>) -> bool {
        if self.lease_expiry_notified_at.is_some() {
            return false;
        }
        self.lease_expiry_notified_at = Some(now);
        true
    }

    /// Strictly more than `window` has passed since the lease ended.
    pub fn inspection_window_closed(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now > self.lease_end + window
    }

    /// Record that the deposit was finalized.
    pub fn mark_inspection_closed(&mut self, now: DateTime<Utc>) {
        if self.inspection_closed_at.is_none() {
            self.inspection_closed_at = Some(now);
        }
    }
}
