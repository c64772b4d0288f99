use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::analysis::{underwrite, UnderwritingReport, UnderwritingRequest};
use crate::assumptions::{normalize, AssumptionSet, NumericInput, RawAssumptions, RawExpenseItem};
use crate::error::UnderwritingError;
use crate::types::ComputationOutput;
use crate::UnderwritingResult;

/// Form state for one underwriting modal.
///
/// Holds the raw input as typed and the report from the last
/// [`recalculate`](UnderwritingSession::recalculate). Each instance is
/// independent; nothing is shared between sessions.
#[derive(Debug, Clone, Default)]
pub struct UnderwritingSession {
    request: UnderwritingRequest,
    last: Option<ComputationOutput<UnderwritingReport>>,
    stale: bool,
}

impl UnderwritingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(request: UnderwritingRequest) -> Self {
        UnderwritingSession {
            request,
            last: None,
            stale: false,
        }
    }

    pub fn raw(&self) -> &RawAssumptions {
        &self.request.assumptions
    }

    /// Normalized view of the current form input.
    pub fn assumptions(&self) -> AssumptionSet {
        normalize(&self.request.assumptions)
    }

    /// Set one form field from its text.
    ///
    /// Numeric fields keep the text as typed; it is parsed (or coerced to 0)
    /// on the next recalculation. Choice fields must name a valid option.
    pub fn set_field(&mut self, name: &str, text: &str) -> UnderwritingResult<()> {
        let raw = &mut self.request.assumptions;
        let number = || Some(NumericInput::Text(text.to_string()));

        match name {
            "property_name" => raw.property_name = Some(text.to_string()),
            "units" => raw.units = number(),
            "square_feet" => raw.square_feet = number(),
            "purchase_price" => raw.purchase_price = number(),
            "closing_costs" => raw.closing_costs = number(),
            "due_diligence_costs" => raw.due_diligence_costs = number(),
            "ltv" => raw.ltv = number(),
            "interest_rate" => raw.interest_rate = number(),
            "amortization_years" => raw.amortization_years = number(),
            "interest_only_years" => raw.interest_only_years = number(),
            "loan_term_years" => raw.loan_term_years = number(),
            "hold_period_years" => raw.hold_period_years = number(),
            "monthly_rent_per_unit" => raw.monthly_rent_per_unit = number(),
            "other_income" => raw.other_income = number(),
            "vacancy_rate" => raw.vacancy_rate = number(),
            "expense_ratio" => raw.expense_ratio = number(),
            "rent_growth" => raw.rent_growth = number(),
            "expense_growth" => raw.expense_growth = number(),
            "exit_cap_rate" => raw.exit_cap_rate = number(),
            "appreciation_rate" => raw.appreciation_rate = number(),
            "disposition_cost_rate" => raw.disposition_cost_rate = number(),
            "property_class" => raw.property_class = Some(parse_choice(name, text)?),
            "asset_type" => raw.asset_type = Some(parse_choice(name, text)?),
            "loan_type" => raw.loan_type = Some(parse_choice(name, text)?),
            "exit_valuation" => raw.exit_valuation = Some(parse_choice(name, text)?),
            "acquisition_date" => {
                raw.acquisition_date = if text.trim().is_empty() {
                    None
                } else {
                    Some(NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|e| {
                        UnderwritingError::InvalidInput {
                            field: name.into(),
                            reason: format!("Expected YYYY-MM-DD: {e}"),
                        }
                    })?)
                }
            }
            other => {
                return Err(UnderwritingError::InvalidInput {
                    field: other.into(),
                    reason: "Unknown underwriting field".into(),
                })
            }
        }

        self.stale = true;
        Ok(())
    }

    /// Replace the itemized expense categories; empty reverts to the ratio.
    pub fn set_expense_items(&mut self, items: Vec<RawExpenseItem>) {
        self.request.assumptions.expense_items = if items.is_empty() { None } else { Some(items) };
        self.stale = true;
    }

    pub fn set_include_sensitivity(&mut self, include: bool) {
        self.request.include_sensitivity = include;
        self.stale = true;
    }

    /// Back to the documented defaults with no results.
    pub fn reset(&mut self) {
        self.request.assumptions = RawAssumptions::default();
        self.last = None;
        self.stale = false;
    }

    /// Rerun the full underwriting from the current input.
    pub fn recalculate(&mut self) -> UnderwritingResult<&ComputationOutput<UnderwritingReport>> {
        let out = underwrite(&self.request)?;
        self.stale = false;
        Ok(self.last.insert(out))
    }

    pub fn report(&self) -> Option<&ComputationOutput<UnderwritingReport>> {
        self.last.as_ref()
    }

    /// True when the input changed since the last recalculation.
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

fn parse_choice<T: DeserializeOwned>(field: &str, text: &str) -> UnderwritingResult<T> {
    serde_json::from_value(serde_json::Value::String(text.trim().to_string())).map_err(|_| {
        UnderwritingError::InvalidInput {
            field: field.into(),
            reason: format!("'{text}' is not a valid option"),
        }
    })
}
