use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use underwrite_core::amortization::{self, LoanTerms};

use crate::input;

/// Arguments for a standalone debt schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to a JSON or YAML loan terms file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan amount
    #[arg(long)]
    pub loan: Option<Decimal>,

    /// Annual interest rate (e.g. 0.07 for 7%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Amortization term in years, including any interest-only period (0 = interest-only)
    #[arg(long, default_value = "30")]
    pub amortization: u32,

    /// Interest-only period in years
    #[arg(long, default_value = "0")]
    pub io: u32,

    /// Loan term in years; shorter than the amortization term leaves a balloon
    #[arg(long)]
    pub term: Option<u32>,

    /// Payments per year
    #[arg(long, default_value = "12")]
    pub periods_per_year: u32,

    /// Return annual roll-ups only, without the period rows
    #[arg(long)]
    pub annual: bool,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = if let Some(ref path) = args.input {
        input::file::read_document(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        LoanTerms {
            loan_amount: args.loan.ok_or("--loan is required (or provide --input)")?,
            annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            amortization_years: args.amortization,
            interest_only_years: args.io,
            term_years: args.term,
            periods_per_year: args.periods_per_year,
        }
    };

    let mut result = amortization::amortize(&terms)?;
    if args.annual {
        result.result.periods.clear();
    }
    Ok(serde_json::to_value(result)?)
}
