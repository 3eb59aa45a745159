//! # Persistence
//!
//! [`DepositRepository`] is the storage seam. Its `update_*` methods are the
//! compare-and-set primitive the whole engine relies on: the closure sees the
//! current record under the write lock, validates its guards, mutates a
//! working copy, and the copy is committed only if the closure returns `Ok`.
//! Every commit bumps the record's `version`.
//!
//! Lock order is tenancy, account, claim, dispute. An update may nest an
//! update of a later kind inside its closure, never an earlier one.

use std::collections::HashMap;
use std::sync::Arc;

use deposit_claims::{Claim, Dispute};
use deposit_core::{AccountId, ClaimId, DisputeId, TenancyId};
use deposit_ledger::{DepositAccount, Tenancy};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Records carrying an optimistic concurrency version.
pub trait Versioned {
    /// Current version.
    fn version(&self) -> u64;
    /// Increment on commit.
    fn bump_version(&mut self);
}

macro_rules! versioned {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Versioned for $ty {
                fn version(&self) -> u64 {
                    self.version
                }

                fn bump_version(&mut self) {
                    self.version += 1;
                }
            }
        )*
    };
}

versioned!(Tenancy, DepositAccount, Claim, Dispute);

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory table keyed by UUID.
///
/// The lock is `parking_lot`, never held across an `.await`.
#[derive(Debug)]
pub struct Store<T> {
    kind: &'static str,
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Versioned> Store<T> {
    /// Create an empty table for records of `kind`.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the id is taken.
    pub fn insert(&self, id: Uuid, value: T) -> Result<(), StoreError> {
        let mut guard = self.data.write();
        if guard.contains_key(&id) {
            return Err(StoreError::Duplicate {
                kind: self.kind,
                id: id.to_string(),
            });
        }
        guard.insert(id, value);
        Ok(())
    }

    /// Clone a record out.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// Run `f` against a record while holding the read lock.
    pub fn read<R>(&self, id: &Uuid, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.data.read().get(id).map(f)
    }

    /// Clone out every record matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// Clone out every record.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically read, validate, and update a record.
    ///
    /// The closure works on a copy. The copy replaces the stored record, with
    /// its version bumped, only when the closure returns `Ok`; on `Err` the
    /// stored record is untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] (converted into `E`) or the closure's error.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.data.write();
        let Some(current) = guard.get(id) else {
            return Err(StoreError::NotFound {
                kind: self.kind,
                id: id.to_string(),
            }
            .into());
        };
        let mut working = current.clone();
        let out = f(&mut working)?;
        working.bump_version();
        guard.insert(*id, working);
        Ok(out)
    }
}

// -- Repository ---------------------------------------------------------------

/// Storage for tenancies, accounts, claims, and disputes.
pub trait DepositRepository: Send + Sync {
    /// Insert a new tenancy.
    fn insert_tenancy(&self, tenancy: Tenancy) -> Result<(), StoreError>;
    /// Insert a new account.
    fn insert_account(&self, account: DepositAccount) -> Result<(), StoreError>;
    /// Insert a new claim.
    fn insert_claim(&self, claim: Claim) -> Result<(), StoreError>;
    /// Insert a new dispute.
    fn insert_dispute(&self, dispute: Dispute) -> Result<(), StoreError>;

    /// Fetch a tenancy.
    fn tenancy(&self, id: TenancyId) -> Option<Tenancy>;
    /// Fetch an account.
    fn account(&self, id: AccountId) -> Option<DepositAccount>;
    /// Fetch a claim.
    fn claim(&self, id: ClaimId) -> Option<Claim>;
    /// Fetch a dispute.
    fn dispute(&self, id: DisputeId) -> Option<Dispute>;

    /// Every tenancy, ordered by id.
    fn tenancies(&self) -> Vec<Tenancy>;
    /// Every account, ordered by id.
    fn accounts(&self) -> Vec<DepositAccount>;
    /// Every claim, ordered by id.
    fn claims(&self) -> Vec<Claim>;
    /// Every dispute, ordered by id.
    fn disputes(&self) -> Vec<Dispute>;
    /// Claims filed against one account, ordered by id.
    fn claims_for_account(&self, account_id: AccountId) -> Vec<Claim>;

    /// Run `f` on an account and its claims as one consistent view.
    fn view_account<R>(
        &self,
        id: AccountId,
        f: impl FnOnce(&DepositAccount, &[Claim]) -> R,
    ) -> Option<R>;

    /// Compare-and-set update of a tenancy.
    fn update_tenancy<R, E: From<StoreError>>(
        &self,
        id: TenancyId,
        f: impl FnOnce(&mut Tenancy) -> Result<R, E>,
    ) -> Result<R, E>;
    /// Compare-and-set update of an account.
    fn update_account<R, E: From<StoreError>>(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut DepositAccount) -> Result<R, E>,
    ) -> Result<R, E>;
    /// Compare-and-set update of a claim.
    fn update_claim<R, E: From<StoreError>>(
        &self,
        id: ClaimId,
        f: impl FnOnce(&mut Claim) -> Result<R, E>,
    ) -> Result<R, E>;
    /// Compare-and-set update of a dispute.
    fn update_dispute<R, E: From<StoreError>>(
        &self,
        id: DisputeId,
        f: impl FnOnce(&mut Dispute) -> Result<R, E>,
    ) -> Result<R, E>;
}

/// Process-local repository.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    tenancies: Store<Tenancy>,
    accounts: Store<DepositAccount>,
    claims: Store<Claim>,
    disputes: Store<Dispute>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self {
            tenancies: Store::new("tenancy"),
            accounts: Store::new("deposit"),
            claims: Store::new("claim"),
            disputes: Store::new("dispute"),
        }
    }

    /// Rebuild from a snapshot.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the snapshot repeats an id.
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Result<Self, StoreError> {
        let repo = Self::new();
        for tenancy in snapshot.tenancies {
            repo.insert_tenancy(tenancy)?;
        }
        for account in snapshot.accounts {
            repo.insert_account(account)?;
        }
        for claim in snapshot.claims {
            repo.insert_claim(claim)?;
        }
        for dispute in snapshot.disputes {
            repo.insert_dispute(dispute)?;
        }
        Ok(repo)
    }

    /// Copy every record out, ordered by id.
    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            tenancies: self.tenancies(),
            accounts: self.accounts(),
            claims: self.claims(),
            disputes: self.disputes(),
        }
    }
}

fn sorted<T>(mut items: Vec<T>, key: impl Fn(&T) -> Uuid) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

impl DepositRepository for InMemoryRepository {
    fn insert_tenancy(&self, tenancy: Tenancy) -> Result<(), StoreError> {
        self.tenancies.insert(*tenancy.id.as_uuid(), tenancy)
    }

    fn insert_account(&self, account: DepositAccount) -> Result<(), StoreError> {
        self.accounts.insert(*account.id.as_uuid(), account)
    }

    fn insert_claim(&self, claim: Claim) -> Result<(), StoreError> {
        self.claims.insert(*claim.id.as_uuid(), claim)
    }

    fn insert_dispute(&self, dispute: Dispute) -> Result<(), StoreError> {
        self.disputes.insert(*dispute.id.as_uuid(), dispute)
    }

    fn tenancy(&self, id: TenancyId) -> Option<Tenancy> {
        self.tenancies.get(id.as_uuid())
    }

    fn account(&self, id: AccountId) -> Option<DepositAccount> {
        self.accounts.get(id.as_uuid())
    }

    fn claim(&self, id: ClaimId) -> Option<Claim> {
        self.claims.get(id.as_uuid())
    }

    fn dispute(&self, id: DisputeId) -> Option<Dispute> {
        self.disputes.get(id.as_uuid())
    }

    fn tenancies(&self) -> Vec<Tenancy> {
        sorted(self.tenancies.list(), |t| *t.id.as_uuid())
    }

    fn accounts(&self) -> Vec<DepositAccount> {
        sorted(self.accounts.list(), |a| *a.id.as_uuid())
    }

    fn claims(&self) -> Vec<Claim> {
        sorted(self.claims.list(), |c| *c.id.as_uuid())
    }

    fn disputes(&self) -> Vec<Dispute> {
        sorted(self.disputes.list(), |d| *d.id.as_uuid())
    }

    fn claims_for_account(&self, account_id: AccountId) -> Vec<Claim> {
        sorted(
            self.claims.filter(|c| c.account_id == account_id),
            |c| *c.id.as_uuid(),
        )
    }

    fn view_account<R>(
        &self,
        id: AccountId,
        f: impl FnOnce(&DepositAccount, &[Claim]) -> R,
    ) -> Option<R> {
        self.accounts.read(id.as_uuid(), |account| {
            let claims = self.claims_for_account(id);
            f(account, &claims)
        })
    }

    fn update_tenancy<R, E: From<StoreError>>(
        &self,
        id: TenancyId,
        f: impl FnOnce(&mut Tenancy) -> Result<R, E>,
    ) -> Result<R, E> {
        self.tenancies.try_update(id.as_uuid(), f)
    }

    fn update_account<R, E: From<StoreError>>(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut DepositAccount) -> Result<R, E>,
    ) -> Result<R, E> {
        self.accounts.try_update(id.as_uuid(), f)
    }

    fn update_claim<R, E: From<StoreError>>(
        &self,
        id: ClaimId,
        f: impl FnOnce(&mut Claim) -> Result<R, E>,
    ) -> Result<R, E> {
        self.claims.try_update(id.as_uuid(), f)
    }

    fn update_dispute<R, E: From<StoreError>>(
        &self,
        id: DisputeId,
        f: impl FnOnce(&mut Dispute) -> Result<R, E>,
    ) -> Result<R, E> {
        self.disputes.try_update(id.as_uuid(), f)
    }
}

/// Serializable copy of a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    /// Tenancies.
    #[serde(default)]
    pub tenancies: Vec<Tenancy>,
    /// Deposit accounts.
    #[serde(default)]
    pub accounts: Vec<DepositAccount>,
    /// Claims.
    #[serde(default)]
    pub claims: Vec<Claim>,
    /// Disputes.
    #[serde(default)]
    pub disputes: Vec<Dispute>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use deposit_core::PartyId;

    fn tenancy() -> Tenancy {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        Tenancy::new(
            TenancyId::new(),
            PartyId::new(),
            PartyId::new(),
            AccountId::new(),
            start,
            start + chrono::Duration::days(365),
            start,
        )
        .unwrap()
    }

    #[test]
    fn insert_rejects_duplicates() {
        let repo = InMemoryRepository::new();
        let t = tenancy();
        repo.insert_tenancy(t.clone()).unwrap();
        assert!(matches!(
            repo.insert_tenancy(t),
            Err(StoreError::Duplicate { kind: "tenancy", .. })
        ));
    }

    #[test]
    fn update_commits_on_ok_and_bumps_version() {
        let repo = InMemoryRepository::new();
        let t = tenancy();
        let id = t.id;
        repo.insert_tenancy(t).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 28, 0, 0, 0).unwrap();
        let marked = repo
            .update_tenancy(id, |t| Ok::<_, StoreError>(t.mark_lease_expiry_notified(now)))
            .unwrap();
        assert!(marked);
        let stored = repo.tenancy(id).unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.lease_expiry_notified_at, Some(now));
    }

    #[derive(Debug)]
    enum TestError {
        Store(StoreError),
        Rejected,
    }

    impl From<StoreError> for TestError {
        fn from(e: StoreError) -> Self {
            Self::Store(e)
        }
    }

    #[test]
    fn update_discards_on_err() {
        let repo = InMemoryRepository::new();
        let t = tenancy();
        let id = t.id;
        repo.insert_tenancy(t).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 5, 28, 0, 0, 0).unwrap();
        let result: Result<(), TestError> = repo.update_tenancy(id, |t| {
            t.mark_lease_expiry_notified(now);
            Err(TestError::Rejected)
        });
        assert!(matches!(result, Err(TestError::Rejected)));
        let stored = repo.tenancy(id).unwrap();
        assert_eq!(stored.version, 0);
        assert!(stored.lease_expiry_notified_at.is_none());
    }

    #[test]
    fn update_missing_is_not_found() {
        let repo = InMemoryRepository::new();
        let result: Result<(), TestError> = repo.update_tenancy(TenancyId::new(), |_| Ok(()));
        assert!(matches!(
            result,
            Err(TestError::Store(StoreError::NotFound { kind: "tenancy", .. }))
        ));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let repo = InMemoryRepository::new();
        repo.insert_tenancy(tenancy()).unwrap();
        repo.insert_tenancy(tenancy()).unwrap();
        let snapshot = repo.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored =
            InMemoryRepository::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.tenancies().len(), 2);
    }
}
