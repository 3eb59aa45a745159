//! # deposit-claims: Claim and Dispute Lifecycles
//!
//! - **Claim** ([`claim`]): a landlord's demand against the deposit.
//!   `Draft → Submitted → TenantNotified → (Accepted → Resolved | Disputed)`,
//!   with auto-approval to `Resolved` once the tenant response window lapses.
//!
//! - **Dispute** ([`dispute`]): opened when the tenant partially accepts or
//!   rejects a claim. `Open → UnderMediation → Resolved`, with an external
//!   resolution escape hatch from any non-terminal state.
//!
//! Both machines are validated enums: the status enum owns a pure transition
//! table (`status.on(event)`), and entity methods layer the guards that need
//! deadlines and amounts on top of it.
//!
//! A `Dispute` never mutates its parent `Claim`. Methods that change dispute
//! state return an outcome the caller applies to the claim explicitly.

pub mod claim;
pub mod dispute;
pub mod error;
pub mod transition;

pub use claim::{
    Claim, ClaimCategory, ClaimEvent, ClaimStatus, ResolutionMethod, ResponseOutcome,
    TenantResponse, TenantResponseKind,
};
pub use dispute::{Dispute, DisputeOutcome, DisputeStatus, LandlordResponse};
pub use error::ClaimError;
pub use transition::TransitionRecord;
