//! # Engine Errors

use std::path::PathBuf;

use deposit_claims::ClaimError;
use deposit_core::{PartyId, ValidationError};
use deposit_ledger::LedgerError;
use thiserror::Error;

/// Errors returned by [`DepositService`](crate::DepositService) and the sweep.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Ledger rejection or consistency failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Claim or dispute state machine rejection.
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// Input validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The caller is not allowed to act on this record.
    #[error("party {party} may not {action} on {entity}")]
    NotAParty {
        /// Acting party.
        party: PartyId,
        /// Attempted action.
        action: &'static str,
        /// Target record.
        entity: String,
    },
}

impl EngineError {
    /// Consistency violations halt processing of the affected account.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_consistency_violation())
    }

    /// Shorthand for a missing record.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::Store(StoreError::NotFound {
            kind,
            id: id.to_string(),
        })
    }
}

/// Repository errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Requested id.
        id: String,
    },

    /// A record with this id already exists.
    #[error("{kind} {id} already exists")]
    Duplicate {
        /// Record kind.
        kind: &'static str,
        /// Conflicting id.
        id: String,
    },
}

/// A notification could not be handed to the delivery channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification {kind} to {recipient} failed: {reason}")]
pub struct NotificationError {
    /// Notification kind.
    pub kind: String,
    /// Intended recipient.
    pub recipient: PartyId,
    /// Channel-specific reason.
    pub reason: String,
}

/// Errors loading [`EngineConfig`](crate::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML did not parse.
    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
