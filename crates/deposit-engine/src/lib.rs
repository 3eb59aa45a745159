//! # deposit-engine: Deposit Escrow Engine
//!
//! Wires the ledger and the claim/dispute state machines to storage, time,
//! and notifications.
//!
//! - **Service** ([`service`]): [`DepositService`] exposes the commands
//!   (open tenancy, record payment, confirm escrow, draft/submit claim,
//!   respond to claim, respond to dispute, resolve dispute) and queries
//!   (quote, breakdown, get claim/dispute).
//!
//! - **Scheduler** ([`scheduler`]): [`DeadlineScheduler::run_sweep`] applies
//!   every due time-triggered transition and returns a [`SweepReport`].
//!   Callable from a timer or synchronously from tests.
//!
//! - **Store** ([`store`]): [`DepositRepository`] with compare-and-set
//!   updates; [`InMemoryRepository`] implements it over `parking_lot` locks.
//!
//! - **Notify** ([`notify`]): [`NotificationGateway`], fire-and-forget.
//!
//! - **Config** ([`config`]): [`EngineConfig`] and [`DeadlinePolicy`] from YAML.
//!
//! ## Concurrency
//!
//! The race that matters is a tenant response against the sweep's
//! auto-approval of the same claim. Both run their guard and transition
//! inside one `update_claim` closure, so the second writer sees the first
//! writer's committed state and fails with a typed error.

pub mod config;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::{DeadlinePolicy, EngineConfig, MAX_REMINDER_LEAD_HOURS, MAX_WINDOW_DAYS};
pub use error::{ConfigError, EngineError, NotificationError, StoreError};
pub use notify::{
    LoggingNotifier, Notification, NotificationGateway, NotificationKind, RecordingNotifier,
};
pub use scheduler::{DeadlineScheduler, SweepAction, SweepFailure, SweepReport, SweepStep};
pub use service::{DepositService, NewClaim, NewTenancy};
pub use store::{DepositRepository, InMemoryRepository, RepositorySnapshot, Store, Versioned};
