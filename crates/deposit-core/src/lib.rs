#![deny(missing_docs)]

//! # deposit-core: Foundational Types for Deposit Escrow
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`ClaimId`]
//!    where a [`DisputeId`] is expected.
//!
//! 2. **Time is injected.** All deadline math goes through a [`Clock`].
//!    Production uses [`SystemClock`]; tests drive a [`ManualClock`].
//!
//! 3. **Money is decimal.** Amounts are [`rust_decimal::Decimal`] and
//!    serialize as strings. Floats never touch a balance.

pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use error::ValidationError;
pub use identity::{AccountId, ClaimId, DisputeId, PartyId, TenancyId};
pub use money::{ensure_positive, round_money, validate_currency, Decimal};
pub use temporal::{Clock, ManualClock, SystemClock};
