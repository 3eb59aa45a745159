//! # Money
//!
//! All amounts are [`Decimal`] in the deposit's currency and are rounded
//! to two decimal places at every booking point.

pub use rust_decimal::Decimal;

use rust_decimal::RoundingStrategy;

use crate::error::ValidationError;

/// Round to cents using banker's rounding.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Reject zero and negative amounts.
///
/// # Errors
///
/// Returns [`ValidationError::NonPositiveAmount`] naming `field`.
pub fn ensure_positive(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount { field, value });
    }
    Ok(value)
}

/// Validate an ISO 4217 currency code (three ASCII uppercase letters).
///
/// # Errors
///
/// Returns [`ValidationError::InvalidCurrency`] otherwise.
pub fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.00));
        assert_eq!(round_money(dec!(1.015)), dec!(1.02));
        assert_eq!(round_money(dec!(4000)), dec!(4000));
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(ensure_positive("amount", dec!(0)).is_err());
        assert!(ensure_positive("amount", dec!(-1)).is_err());
        assert_eq!(ensure_positive("amount", dec!(0.01)).unwrap(), dec!(0.01));
    }

    #[test]
    fn currency_codes() {
        assert!(validate_currency("EUR").is_ok());
        assert!(validate_currency("eur").is_err());
        assert!(validate_currency("EURO").is_err());
    }
}
