pub mod file;
pub mod stdin;

use clap::Args;
use tracing::debug;
use underwrite_core::assumptions::{NumericInput, RawAssumptions};

/// Where a deal's assumptions come from: a file, piped stdin, or flags.
/// Flags override whatever the document supplies.
#[derive(Args, Debug, Default)]
pub struct AssumptionArgs {
    /// Path to a JSON or YAML assumptions file
    #[arg(long)]
    pub input: Option<String>,

    /// Property name
    #[arg(long)]
    pub name: Option<String>,

    /// Purchase price, e.g. 18000000 or "$18,000,000"
    #[arg(long)]
    pub price: Option<String>,

    /// Number of units
    #[arg(long)]
    pub units: Option<String>,

    /// In-place monthly rent per unit
    #[arg(long)]
    pub rent: Option<String>,

    /// Loan-to-value, e.g. 0.70 or 70%
    #[arg(long)]
    pub ltv: Option<String>,

    /// Annual interest rate
    #[arg(long)]
    pub rate: Option<String>,

    /// Amortization term in years (0 = interest-only)
    #[arg(long)]
    pub amortization: Option<String>,

    /// Interest-only period in years
    #[arg(long)]
    pub io: Option<String>,

    /// Hold period in years
    #[arg(long)]
    pub hold: Option<String>,

    /// Vacancy rate
    #[arg(long)]
    pub vacancy: Option<String>,

    /// Exit cap rate
    #[arg(long)]
    pub exit_cap: Option<String>,
}

impl AssumptionArgs {
    /// Raw assumptions from the first available source, with flags applied.
    pub fn resolve(&self) -> Result<RawAssumptions, Box<dyn std::error::Error>> {
        let (mut raw, source): (RawAssumptions, &str) = if let Some(ref path) = self.input {
            (file::read_document(path)?, path.as_str())
        } else if let Some(data) = stdin::read_stdin()? {
            (data, "stdin")
        } else {
            (RawAssumptions::default(), "defaults")
        };
        debug!(source, "assumptions loaded");

        if let Some(ref name) = self.name {
            raw.property_name = Some(name.clone());
        }
        overlay(&mut raw.purchase_price, &self.price);
        overlay(&mut raw.units, &self.units);
        overlay(&mut raw.monthly_rent_per_unit, &self.rent);
        overlay(&mut raw.ltv, &self.ltv);
        overlay(&mut raw.interest_rate, &self.rate);
        overlay(&mut raw.amortization_years, &self.amortization);
        overlay(&mut raw.interest_only_years, &self.io);
        overlay(&mut raw.hold_period_years, &self.hold);
        overlay(&mut raw.vacancy_rate, &self.vacancy);
        overlay(&mut raw.exit_cap_rate, &self.exit_cap);

        Ok(raw)
    }
}

fn overlay(target: &mut Option<NumericInput>, flag: &Option<String>) {
    if let Some(text) = flag {
        *target = Some(NumericInput::Text(text.clone()));
    }
}
