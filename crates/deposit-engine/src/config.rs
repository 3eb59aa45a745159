//! # Engine Configuration
//!
//! Deadline windows and sweep cadence, loaded from YAML. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ```yaml
//! sweep_interval_secs: 600
//! currency: EUR
//! policy:
//!   tenant_response_days: 7
//!   mediation_days: 14
//!   escalation_days: 14
//!   inspection_days: 7
//!   reminder_lead_hours: 24
//!   lease_notice_days: 7
//! ```

use std::path::Path;

use chrono::Duration;
use deposit_core::validate_currency;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest accepted day-based window (about ten years).
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Longest accepted reminder lead (one year).
pub const MAX_REMINDER_LEAD_HOURS: i64 = 8760;

/// Deadline windows applied by the service and the sweep.
///
/// The window accessors clamp each field into `0..=MAX`, so a policy that
/// skipped [`validate`](Self::validate) still yields representable durations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadlinePolicy {
    /// Days the tenant has to answer a claim. Auto-approval opens after it.
    #[serde(default = "default_seven")]
    pub tenant_response_days: i64,
    /// Days from dispute creation to the mediation deadline.
    #[serde(default = "default_fourteen")]
    pub mediation_days: i64,
    /// Days a flagged dispute has before its escalation deadline.
    #[serde(default = "default_fourteen")]
    pub escalation_days: i64,
    /// Days after lease end during which claims may be filed.
    #[serde(default = "default_seven")]
    pub inspection_days: i64,
    /// Hours before the response deadline when the reminder goes out.
    #[serde(default = "default_reminder_lead")]
    pub reminder_lead_hours: i64,
    /// Days before lease end when the advance notice goes out.
    #[serde(default = "default_seven")]
    pub lease_notice_days: i64,
}

fn default_seven() -> i64 {
    7
}

fn default_fourteen() -> i64 {
    14
}

fn default_reminder_lead() -> i64 {
    24
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            tenant_response_days: default_seven(),
            mediation_days: default_fourteen(),
            escalation_days: default_fourteen(),
            inspection_days: default_seven(),
            reminder_lead_hours: default_reminder_lead(),
            lease_notice_days: default_seven(),
        }
    }
}

fn window_days(days: i64) -> Duration {
    Duration::days(days.clamp(0, MAX_WINDOW_DAYS))
}

impl DeadlinePolicy {
    /// Tenant response window.
    pub fn response_window(&self) -> Duration {
        window_days(self.tenant_response_days)
    }

    /// Mediation window.
    pub fn mediation_window(&self) -> Duration {
        window_days(self.mediation_days)
    }

    /// Escalation window.
    pub fn escalation_window(&self) -> Duration {
        window_days(self.escalation_days)
    }

    /// Inspection window after lease end.
    pub fn inspection_window(&self) -> Duration {
        window_days(self.inspection_days)
    }

    /// Reminder lead before the response deadline.
    pub fn reminder_lead(&self) -> Duration {
        Duration::hours(self.reminder_lead_hours.clamp(0, MAX_REMINDER_LEAD_HOURS))
    }

    /// Advance notice window before lease end.
    pub fn lease_notice_window(&self) -> Duration {
        window_days(self.lease_notice_days)
    }

    /// Check every window is positive and within its maximum, and that the
    /// reminder fits inside the response window.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value, max) in [
            ("tenant_response_days", self.tenant_response_days, MAX_WINDOW_DAYS),
            ("mediation_days", self.mediation_days, MAX_WINDOW_DAYS),
            ("escalation_days", self.escalation_days, MAX_WINDOW_DAYS),
            ("inspection_days", self.inspection_days, MAX_WINDOW_DAYS),
            ("reminder_lead_hours", self.reminder_lead_hours, MAX_REMINDER_LEAD_HOURS),
            ("lease_notice_days", self.lease_notice_days, MAX_WINDOW_DAYS),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "policy.{field} must be positive, got {value}"
                )));
            }
            if value > max {
                return Err(ConfigError::Invalid(format!(
                    "policy.{field} must be at most {max}, got {value}"
                )));
            }
        }
        if self.reminder_lead() >= self.response_window() {
            return Err(ConfigError::Invalid(format!(
                "policy.reminder_lead_hours ({}) must be shorter than the response window ({} days)",
                self.reminder_lead_hours, self.tenant_response_days
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Seconds between timer-driven sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Currency for new deposit accounts (ISO 4217).
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Deadline windows.
    #[serde(default)]
    pub policy: DeadlinePolicy,
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            currency: default_currency(),
            policy: DeadlinePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_yaml_str`](Self::from_yaml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Check the interval, currency, and policy.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        validate_currency(&self.currency).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.policy.validate()
    }

    /// Sweep interval as a std duration.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sweep_interval_secs, 600);
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.policy.response_window(), Duration::days(7));
        assert_eq!(config.policy.mediation_window(), Duration::days(14));
        assert_eq!(config.policy.reminder_lead(), Duration::hours(24));
        config.validate().unwrap();
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = EngineConfig::from_yaml_str(
            "currency: GBP\npolicy:\n  mediation_days: 21\n",
        )
        .unwrap();
        assert_eq!(config.currency, "GBP");
        assert_eq!(config.policy.mediation_days, 21);
        assert_eq!(config.policy.tenant_response_days, 7);
        assert_eq!(config.sweep_interval_secs, 600);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_yaml_str("sweep_interval_secs: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("currency: euro"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("policy:\n  reminder_lead_hours: 200\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("policy:\n  inspection_days: -1\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("unknown_key: 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_windows_beyond_maximum() {
        for yaml in [
            "policy:\n  tenant_response_days: 9223372036854775807\n",
            "policy:\n  tenant_response_days: 100000000\n",
            "policy:\n  mediation_days: 3651\n",
            "policy:\n  reminder_lead_hours: 9223372036854775807\n",
            "policy:\n  lease_notice_days: 9223372036854775807\n",
        ] {
            let err = EngineConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}");
            assert!(err.to_string().contains("at most"), "{err}");
        }

        let config = EngineConfig::from_yaml_str(
            "policy:\n  tenant_response_days: 3650\n  reminder_lead_hours: 8760\n",
        )
        .unwrap();
        assert_eq!(config.policy.response_window(), Duration::days(3650));
    }

    #[test]
    fn unvalidated_policy_windows_are_clamped() {
        let policy = DeadlinePolicy {
            tenant_response_days: i64::MAX,
            reminder_lead_hours: i64::MIN,
            ..DeadlinePolicy::default()
        };
        assert!(policy.validate().is_err());
        assert_eq!(policy.response_window(), Duration::days(MAX_WINDOW_DAYS));
        assert_eq!(policy.reminder_lead(), Duration::zero());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sweep_interval_secs: 30").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.sweep_interval_secs, 30);

        let missing = EngineConfig::load(Path::new("/nonexistent/deposit.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
