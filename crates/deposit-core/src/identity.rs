//! # Identity Newtypes
//!
//! UUID-backed identifiers for every persisted entity. Each identifier is a
//! distinct type and renders with a short prefix (`claim:…`, `dispute:…`)
//! so log lines are unambiguous.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifies one tenancy (lease agreement) and its deposit lifecycle.
    TenancyId,
    "tenancy"
);

uuid_identifier!(
    /// Identifies the escrow ledger of one tenancy.
    AccountId,
    "deposit"
);

uuid_identifier!(
    /// Identifies a landlord claim against a deposit.
    ClaimId,
    "claim"
);

uuid_identifier!(
    /// Identifies the dispute opened on a contested claim.
    DisputeId,
    "dispute"
);

uuid_identifier!(
    /// Identifies a landlord, tenant, or mediator. Authentication is external.
    PartyId,
    "party"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        let id = ClaimId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "claim:00000000-0000-0000-0000-000000000000");
        assert!(DisputeId::new().to_string().starts_with("dispute:"));
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn fresh_identifiers_are_distinct() {
        assert_ne!(TenancyId::new(), TenancyId::new());
    }
}
