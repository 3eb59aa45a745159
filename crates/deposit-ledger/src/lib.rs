//! # deposit-ledger: Escrow Ledger
//!
//! - **Calculation** ([`calculation`]): risk-adjusted deposit amount with a
//!   bounded multiplier and an auditable adjustment breakdown.
//!
//! - **Account** ([`account`]): one deposit per tenancy, `Pending → Paid →
//!   HeldInEscrow`, with releases booked per claim and a terminal status set
//!   only at finalization.
//!
//! - **Tenancy** ([`tenancy`]): lease dates and the notice flag driving the
//!   inspection window.
//!
//! - **Release** ([`release`]): [`FundReleaseCalculator`] derives the
//!   released / refunded / contested breakdown from the claims and checks the
//!   reconciliation invariant on every computation.

pub mod account;
pub mod calculation;
pub mod error;
pub mod release;
pub mod tenancy;

pub use account::{
    DepositAccount, DepositStatus, LedgerEntry, LedgerEntryKind, PaymentMethod, PaymentRecord,
};
pub use calculation::{
    calculate_deposit_amount, AdjustmentFactor, DepositCalculation, EmploymentType,
    MultiplierAdjustment, PropertyDetails, TenantProfile, BASE_MULTIPLIER, MAX_MULTIPLIER,
    MIN_MULTIPLIER,
};
pub use error::{ConsistencyError, LedgerError};
pub use release::{FundBreakdown, FundReleaseCalculator, ReleasePhase};
pub use tenancy::Tenancy;
