//! # Validation Errors
//!
//! Input validation failures shared by every crate. These are always
//! returned synchronously to the caller.

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation errors for amounts and domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    NonPositiveAmount {
        /// Which input was rejected.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },

    /// Amount is negative where zero or more is required.
    #[error("{field} must not be negative, got {value}")]
    NegativeAmount {
        /// Which input was rejected.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },

    /// Currency code is not a 3-letter ISO 4217 code.
    #[error("invalid currency code: \"{0}\" (expected 3 uppercase letters)")]
    InvalidCurrency(String),

    /// A reference string (payment, escrow, evidence) was empty.
    #[error("{0} must be non-empty")]
    EmptyReference(&'static str),

    /// A date range is inverted.
    #[error("invalid date range: {field} ({reason})")]
    InvalidDateRange {
        /// Which input was rejected.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_amount_display() {
        let err = ValidationError::NonPositiveAmount {
            field: "claimed_amount",
            value: Decimal::ZERO,
        };
        let msg = format!("{err}");
        assert!(msg.contains("claimed_amount"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn invalid_currency_display() {
        let err = ValidationError::InvalidCurrency("euro".to_string());
        assert!(format!("{err}").contains("euro"));
    }
}
