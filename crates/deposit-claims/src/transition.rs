//! Append-only audit entries shared by claims and disputes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord<S> {
    /// State before the transition.
    pub from_state: S,
    /// State after the transition.
    pub to_state: S,
    /// When it was applied, per the injected clock.
    pub at: DateTime<Utc>,
    /// Short machine-readable cause, e.g. `"tenant_accepted"`.
    pub note: String,
}
