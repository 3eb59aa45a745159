//! # Quote Subcommand
//!
//! Computes a deposit without touching the state file.

use anyhow::Result;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

use deposit_ledger::{calculate_deposit_amount, EmploymentType, PropertyDetails, TenantProfile};

/// Arguments for `deposit quote`.
#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Monthly rent.
    #[arg(long)]
    pub rent: Decimal,

    /// Tenant employment category.
    #[arg(long, value_enum)]
    pub employment: EmploymentArg,

    /// Credit score (300–850). Omit if unknown.
    #[arg(long)]
    pub credit_score: Option<u16>,

    /// A guarantor co-signs the lease.
    #[arg(long)]
    pub guarantor: bool,

    /// The tenant keeps pets.
    #[arg(long)]
    pub pets: bool,

    /// The property is let furnished.
    #[arg(long)]
    pub furnished: bool,

    /// Print the calculation as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Employment category on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmploymentArg {
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

impl From<EmploymentArg> for EmploymentType {
    fn from(arg: EmploymentArg) -> Self {
        match arg {
            EmploymentArg::Corporate => Self::Corporate,
            EmploymentArg::Government => Self::Government,
            EmploymentArg::SelfEmployed => Self::SelfEmployed,
            EmploymentArg::Contract => Self::Contract,
            EmploymentArg::Student => Self::Student,
            EmploymentArg::Unemployed => Self::Unemployed,
            EmploymentArg::Retired => Self::Retired,
        }
    }
}

/// Execute `deposit quote`.
pub fn run_quote(args: &QuoteArgs) -> Result<u8> {
    let profile = TenantProfile {
        employment_type: args.employment.into(),
        credit_score: args.credit_score,
        has_guarantor: args.guarantor,
        has_pets: args.pets,
    };
    let property = PropertyDetails {
        furnished: args.furnished,
    };
    let calc = calculate_deposit_amount(args.rent, &profile, &property)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&calc)?);
        return Ok(0);
    }

    println!("Monthly rent:     {}", calc.monthly_rent);
    println!("Base multiplier:  {}", calc.base_multiplier);
    for adj in &calc.adjustments {
        println!("  {:+}  {}", adj.delta, adj.reason);
    }
    if calc.was_clamped() {
        println!(
            "Clamped:          {} -> {}",
            calc.unclamped_multiplier, calc.final_multiplier
        );
    }
    println!("Final multiplier: {}", calc.final_multiplier);
    println!("Deposit:          {}", calc.amount);
    Ok(0)
}
