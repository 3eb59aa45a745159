//! # Deposit Calculation
//!
//! `amount = monthly_rent × multiplier`, where the multiplier starts at two
//! months' rent and moves in 0.25 steps on risk signals, then is clamped to
//! `[1.5, 2.5]`.
//!
//! | Signal | Condition | Δ |
//! |---|---|---|
//! | credit score | ≥ 800 | −0.25 |
//! | | 700–799 | 0 |
//! | | 600–699 | +0.25 |
//! | | < 600 | +0.50 |
//! | | unknown | +0.25 |
//! | employment | corporate, government, retired | 0 |
//! | | self-employed, contract | +0.25 |
//! | | student, unemployed | +0.50 |
//! | guarantor | present | −0.25 |
//! | property | furnished | +0.25 |
//! | pets | tenant keeps pets | +0.25 |
//!
//! The function is pure: identical inputs give identical output.

use serde::{Deserialize, Serialize};

use deposit_core::{ensure_positive, round_money, Decimal};
use rust_decimal_macros::dec;

use crate::error::LedgerError;

/// Two months' rent.
pub const BASE_MULTIPLIER: Decimal = dec!(2.0);
/// Lower clamp.
pub const MIN_MULTIPLIER: Decimal = dec!(1.5);
/// Upper clamp.
pub const MAX_MULTIPLIER: Decimal = dec!(2.5);

const STEP: Decimal = dec!(0.25);

/// Tenant employment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    /// Permanent employee of a company.
    Corporate,
    /// Public sector employee.
    Government,
    /// Self-employed or freelance.
    SelfEmployed,
    /// Fixed-term contract.
    Contract,
    /// Student.
    Student,
    /// Not employed.
    Unemployed,
    /// Retired with pension income.
    Retired,
}

impl EmploymentType {
    fn adjustment(self) -> Decimal {
        match self {
            Self::Corporate | Self::Government | Self::Retired => Decimal::ZERO,
            Self::SelfEmployed | Self::Contract => STEP,
            Self::Student | Self::Unemployed => STEP * dec!(2),
        }
    }

    /// The canonical string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Corporate => "corporate",
            Self::Government => "government",
            Self::SelfEmployed => "self_employed",
            Self::Contract => "contract",
            Self::Student => "student",
            Self::Unemployed => "unemployed",
            Self::Retired => "retired",
        }
    }
}

/// Risk signals about the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfile {
    /// Employment category.
    pub employment_type: EmploymentType,
    /// Credit score on the 300–850 scale, if known.
    pub credit_score: Option<u16>,
    /// Whether a guarantor co-signs the lease.
    #[serde(default)]
    pub has_guarantor: bool,
    /// Whether the tenant keeps pets.
    #[serde(default)]
    pub has_pets: bool,
}

/// Property characteristics that affect the deposit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    /// Let furnished.
    #[serde(default)]
    pub furnished: bool,
}

/// Which signal produced an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentFactor {
    /// Credit score band.
    CreditScore,
    /// Employment category.
    Employment,
    /// Guarantor present.
    Guarantor,
    /// Furnished property.
    Furnished,
    /// Pets.
    Pets,
}

/// One applied multiplier shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierAdjustment {
    /// Source signal.
    pub factor: AdjustmentFactor,
    /// Signed multiplier change.
    pub delta: Decimal,
    /// Human-readable explanation.
    pub reason: String,
}

/// Result of [`calculate_deposit_amount`], kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositCalculation {
    /// Calculation base.
    pub monthly_rent: Decimal,
    /// Starting multiplier.
    pub base_multiplier: Decimal,
    /// Base plus adjustments, before clamping.
    pub unclamped_multiplier: Decimal,
    /// Multiplier actually applied.
    pub final_multiplier: Decimal,
    /// Deposit amount, rounded to cents.
    pub amount: Decimal,
    /// Every non-zero adjustment in evaluation order.
    pub adjustments: Vec<MultiplierAdjustment>,
}

impl DepositCalculation {
    /// Whether clamping changed the multiplier.
    pub fn was_clamped(&self) -> bool {
        self.unclamped_multiplier != self.final_multiplier
    }
}

/// Compute the deposit for a tenancy.
///
/// # Errors
///
/// [`LedgerError::Validation`] for a rent that is not positive once
/// rounded to cents;
/// [`LedgerError::InvalidCreditScore`] outside 300–850.
pub fn calculate_deposit_amount(
    monthly_rent: Decimal,
    profile: &TenantProfile,
    property: &PropertyDetails,
) -> Result<DepositCalculation, LedgerError> {
    let monthly_rent = ensure_positive("monthly_rent", round_money(monthly_rent))?;
    let mut adjustments = Vec::new();
    let mut push = |factor, delta: Decimal, reason: String| {
        if !delta.is_zero() {
            adjustments.push(MultiplierAdjustment {
                factor,
                delta,
                reason,
            });
        }
    };

    match profile.credit_score {
        Some(score) if !(300..=850).contains(&score) => {
            return Err(LedgerError::InvalidCreditScore(score));
        }
        Some(score) => {
            let delta = match score {
                800.. => -STEP,
                700..=799 => Decimal::ZERO,
                600..=699 => STEP,
                _ => STEP * dec!(2),
            };
            push(
                AdjustmentFactor::CreditScore,
                delta,
                format!("credit score {score}"),
            );
        }
        None => push(
            AdjustmentFactor::CreditScore,
            STEP,
            "no credit score on file".to_string(),
        ),
    }

    push(
        AdjustmentFactor::Employment,
        profile.employment_type.adjustment(),
        format!("employment {}", profile.employment_type.as_str()),
    );
    if profile.has_guarantor {
        push(
            AdjustmentFactor::Guarantor,
            -STEP,
            "guarantor co-signs".to_string(),
        );
    }
    if property.furnished {
        push(
            AdjustmentFactor::Furnished,
            STEP,
            "furnished property".to_string(),
        );
    }
    if profile.has_pets {
        push(AdjustmentFactor::Pets, STEP, "tenant keeps pets".to_string());
    }

    let unclamped = adjustments
        .iter()
        .fold(BASE_MULTIPLIER, |acc, adj| acc + adj.delta);
    let final_multiplier = unclamped.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER);
    let amount = ensure_positive("amount", round_money(monthly_rent * final_multiplier))?;

    Ok(DepositCalculation {
        monthly_rent,
        base_multiplier: BASE_MULTIPLIER,
        unclamped_multiplier: unclamped,
        final_multiplier,
        amount,
        adjustments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn profile(employment_type: EmploymentType, credit_score: Option<u16>) -> TenantProfile {
        TenantProfile {
            employment_type,
            credit_score,
            has_guarantor: false,
            has_pets: false,
        }
    }

    #[test]
    fn corporate_good_credit_is_two_months() {
        let calc = calculate_deposit_amount(
            dec!(2000),
            &profile(EmploymentType::Corporate, Some(780)),
            &PropertyDetails::default(),
        )
        .unwrap();
        assert_eq!(calc.final_multiplier, dec!(2.0));
        assert_eq!(calc.amount, dec!(4000.00));
        assert!(calc.adjustments.is_empty());
        assert!(!calc.was_clamped());
    }

    #[test]
    fn high_risk_is_clamped_at_upper_bound() {
        let mut tenant = profile(EmploymentType::Unemployed, Some(520));
        tenant.has_pets = true;
        let calc = calculate_deposit_amount(
            dec!(1000),
            &tenant,
            &PropertyDetails { furnished: true },
        )
        .unwrap();
        assert_eq!(calc.unclamped_multiplier, dec!(3.5));
        assert_eq!(calc.final_multiplier, MAX_MULTIPLIER);
        assert_eq!(calc.amount, dec!(2500.00));
        assert!(calc.was_clamped());
        assert_eq!(calc.adjustments.len(), 4);
    }

    #[test]
    fn low_risk_with_guarantor() {
        let mut tenant = profile(EmploymentType::Government, Some(820));
        tenant.has_guarantor = true;
        let calc =
            calculate_deposit_amount(dec!(1234.56), &tenant, &PropertyDetails::default()).unwrap();
        assert_eq!(calc.final_multiplier, dec!(1.5));
        assert_eq!(calc.amount, dec!(1851.84));
    }

    #[test]
    fn missing_credit_score_adds_a_step() {
        let calc = calculate_deposit_amount(
            dec!(1000),
            &profile(EmploymentType::Corporate, None),
            &PropertyDetails::default(),
        )
        .unwrap();
        assert_eq!(calc.final_multiplier, dec!(2.25));
        assert_eq!(calc.adjustments[0].factor, AdjustmentFactor::CreditScore);
    }

    #[test]
    fn rejects_bad_inputs() {
        let tenant = profile(EmploymentType::Corporate, Some(700));
        assert!(matches!(
            calculate_deposit_amount(dec!(0), &tenant, &PropertyDetails::default()),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(
            calculate_deposit_amount(
                dec!(1000),
                &profile(EmploymentType::Corporate, Some(900)),
                &PropertyDetails::default()
            ),
            Err(LedgerError::InvalidCreditScore(900))
        );
    }

    #[test]
    fn sub_cent_rent_is_rejected() {
        let tenant = profile(EmploymentType::Corporate, Some(700));
        for rent in [dec!(0.001), dec!(0.004), dec!(0.005)] {
            assert!(
                matches!(
                    calculate_deposit_amount(rent, &tenant, &PropertyDetails::default()),
                    Err(LedgerError::Validation(_))
                ),
                "{rent}"
            );
        }
        let calc =
            calculate_deposit_amount(dec!(0.006), &tenant, &PropertyDetails::default()).unwrap();
        assert_eq!(calc.monthly_rent, dec!(0.01));
        assert_eq!(calc.amount, dec!(0.02));
    }

    fn employment() -> impl Strategy<Value = EmploymentType> {
        prop_oneof![
            Just(EmploymentType::Corporate),
            Just(EmploymentType::Government),
            Just(EmploymentType::SelfEmployed),
            Just(EmploymentType::Contract),
            Just(EmploymentType::Student),
            Just(EmploymentType::Unemployed),
            Just(EmploymentType::Retired),
        ]
    }

    proptest! {
        /// The multiplier stays in bounds and the amount is rent × multiplier.
        #[test]
        fn multiplier_bounded_and_amount_exact(
            rent_cents in 1i64..10_000_000,
            employment in employment(),
            score in proptest::option::of(300u16..=850),
            has_guarantor in any::<bool>(),
            has_pets in any::<bool>(),
            furnished in any::<bool>(),
        ) {
            let rent = Decimal::new(rent_cents, 2);
            let tenant = TenantProfile { employment_type: employment, credit_score: score, has_guarantor, has_pets };
            let calc = calculate_deposit_amount(rent, &tenant, &PropertyDetails { furnished }).unwrap();
            prop_assert!(calc.final_multiplier >= MIN_MULTIPLIER);
            prop_assert!(calc.final_multiplier <= MAX_MULTIPLIER);
            prop_assert_eq!(calc.amount, round_money(rent * calc.final_multiplier));
            let again = calculate_deposit_amount(rent, &tenant, &PropertyDetails { furnished }).unwrap();
            prop_assert_eq!(calc, again);
        }

        /// Any accepted rent, whole cents or not, yields a positive deposit.
        #[test]
        fn accepted_rent_always_yields_positive_amount(
            rent_mills in 0i64..100_000,
            employment in employment(),
            has_pets in any::<bool>(),
        ) {
            let rent = Decimal::new(rent_mills, 3);
            let tenant = TenantProfile { employment_type: employment, credit_score: None, has_guarantor: false, has_pets };
            match calculate_deposit_amount(rent, &tenant, &PropertyDetails::default()) {
                Ok(calc) => {
                    prop_assert!(calc.amount > Decimal::ZERO);
                    prop_assert_eq!(calc.monthly_rent, round_money(rent));
                }
                Err(err) => {
                    prop_assert!(matches!(err, LedgerError::Validation(_)));
                    prop_assert!(round_money(rent) <= Decimal::ZERO);
                }
            }
        }
    }
}
