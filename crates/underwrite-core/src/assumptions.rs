use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnderwritingError;
use crate::types::{Metric, Money, Rate};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Representable domain
// ---------------------------------------------------------------------------

/// Ceiling for any single currency input (ten trillion).
pub const MAX_MONEY: Decimal = dec!(10000000000000);
pub const MAX_UNITS: u32 = 100_000;
pub const MAX_SQUARE_FEET: Decimal = dec!(1000000000);
pub const MAX_MONTHLY_RENT: Decimal = dec!(10000000);
pub const MAX_HOLD_YEARS: u32 = 30;
pub const MAX_AMORTIZATION_YEARS: u32 = 50;
pub const MAX_LOAN_TERM_YEARS: u32 = 50;
pub const MAX_INTEREST_ONLY_YEARS: u32 = 30;
const MIN_GROWTH: Rate = dec!(-0.5);
const MAX_GROWTH: Rate = dec!(0.5);
const MIN_EXIT_CAP: Rate = dec!(0.001);

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyClass {
    A,
    #[default]
    B,
    C,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(rename = "High-Rise")]
    HighRise,
    #[serde(rename = "Mid-Rise")]
    MidRise,
    #[default]
    Garden,
    Townhome,
    #[serde(rename = "Student Housing")]
    StudentHousing,
    #[serde(rename = "Senior Living")]
    SeniorLiving,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanType {
    #[default]
    Agency,
    #[serde(rename = "CMBS")]
    Cmbs,
    Bridge,
    Bank,
}

/// Rule used to value the property at each year end and at exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitValuation {
    /// Value = NOI of the year / exit cap rate
    #[default]
    DirectCap,
    /// Value = purchase price * (1 + appreciation)^year
    Appreciation,
}

/// A single itemized operating expense category (annual, year 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub name: String,
    pub annual_amount: Money,
}

/// Year-1 operating expense basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum OperatingExpenses {
    /// Fraction of year-1 effective revenue
    Ratio { ratio: Rate },
    /// Sum of fixed annual categories
    Itemized { items: Vec<ExpenseItem> },
}

impl Default for OperatingExpenses {
    fn default() -> Self {
        OperatingExpenses::Ratio { ratio: dec!(0.45) }
    }
}

/// Assumption that can be overridden for sensitivity runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionKey {
    PurchasePrice,
    ClosingCosts,
    Ltv,
    InterestRate,
    MonthlyRentPerUnit,
    VacancyRate,
    ExpenseRatio,
    RentGrowth,
    ExpenseGrowth,
    ExitCapRate,
    AppreciationRate,
    DispositionCostRate,
    /// An itemized expense category, matched by name (case-insensitive)
    ExpenseItem(String),
}

impl AssumptionKey {
    pub fn label(&self) -> String {
        match self {
            AssumptionKey::PurchasePrice => "Purchase Price".into(),
            AssumptionKey::ClosingCosts => "Closing Costs".into(),
            AssumptionKey::Ltv => "LTV".into(),
            AssumptionKey::InterestRate => "Interest Rate".into(),
            AssumptionKey::MonthlyRentPerUnit => "In-Place Rent".into(),
            AssumptionKey::VacancyRate => "Vacancy".into(),
            AssumptionKey::ExpenseRatio => "Expense Ratio".into(),
            AssumptionKey::RentGrowth => "Rent Growth".into(),
            AssumptionKey::ExpenseGrowth => "Expense Growth".into(),
            AssumptionKey::ExitCapRate => "Exit Cap Rate".into(),
            AssumptionKey::AppreciationRate => "Appreciation".into(),
            AssumptionKey::DispositionCostRate => "Disposition Costs".into(),
            AssumptionKey::ExpenseItem(name) => format!("{name} Expense"),
        }
    }
}

impl fmt::Display for AssumptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for AssumptionKey {
    type Err = UnderwritingError;

    /// Parses `exit_cap_rate`, `interest_rate`, ... or `expense_item:<name>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Some(name) = key.strip_prefix("expense_item:") {
            return Ok(AssumptionKey::ExpenseItem(name.trim().to_string()));
        }
        let parsed = match key.to_lowercase().as_str() {
            "purchase_price" => AssumptionKey::PurchasePrice,
            "closing_costs" => AssumptionKey::ClosingCosts,
            "ltv" => AssumptionKey::Ltv,
            "interest_rate" => AssumptionKey::InterestRate,
            "monthly_rent_per_unit" | "rent" => AssumptionKey::MonthlyRentPerUnit,
            "vacancy_rate" | "vacancy" => AssumptionKey::VacancyRate,
            "expense_ratio" => AssumptionKey::ExpenseRatio,
            "rent_growth" => AssumptionKey::RentGrowth,
            "expense_growth" => AssumptionKey::ExpenseGrowth,
            "exit_cap_rate" => AssumptionKey::ExitCapRate,
            "appreciation_rate" => AssumptionKey::AppreciationRate,
            "disposition_cost_rate" => AssumptionKey::DispositionCostRate,
            other => {
                return Err(UnderwritingError::InvalidInput {
                    field: "assumption_key".into(),
                    reason: format!("Unknown assumption '{other}'"),
                })
            }
        };
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Raw (form) input
// ---------------------------------------------------------------------------

/// A numeric form value: either a JSON number or free text typed by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(Decimal),
    Text(String),
}

impl NumericInput {
    /// Resolve to a number; `None` when the text is not numeric.
    ///
    /// Currency symbols, thousands separators and whitespace are ignored,
    /// a trailing `%` divides by 100, and scientific notation is accepted.
    pub fn parse(&self) -> Option<Decimal> {
        match self {
            NumericInput::Number(d) => Some(*d),
            NumericInput::Text(text) => parse_numeric_text(text),
        }
    }
}

impl From<Decimal> for NumericInput {
    fn from(d: Decimal) -> Self {
        NumericInput::Number(d)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

fn parse_numeric_text(text: &str) -> Option<Decimal> {
    let mut cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | ',' | '_'))
        .collect();

    let is_percent = cleaned.ends_with('%');
    if is_percent {
        cleaned.pop();
    }
    if cleaned.is_empty() {
        return None;
    }

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;

    if is_percent {
        value.checked_div(dec!(100))
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExpenseItem {
    #[serde(default)]
    pub name: String,
    pub annual_amount: Option<NumericInput>,
}

/// Underwriting form input as submitted. Every field is optional; omitted
/// fields take the documented defaults during [`normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAssumptions {
    pub property_name: Option<String>,
    pub units: Option<NumericInput>,
    pub property_class: Option<PropertyClass>,
    pub asset_type: Option<AssetType>,
    pub square_feet: Option<NumericInput>,
    pub purchase_price: Option<NumericInput>,
    pub closing_costs: Option<NumericInput>,
    pub due_diligence_costs: Option<NumericInput>,
    pub loan_type: Option<LoanType>,
    pub ltv: Option<NumericInput>,
    pub interest_rate: Option<NumericInput>,
    pub amortization_years: Option<NumericInput>,
    pub interest_only_years: Option<NumericInput>,
    pub loan_term_years: Option<NumericInput>,
    pub hold_period_years: Option<NumericInput>,
    pub monthly_rent_per_unit: Option<NumericInput>,
    pub other_income: Option<NumericInput>,
    pub vacancy_rate: Option<NumericInput>,
    pub expense_ratio: Option<NumericInput>,
    pub expense_items: Option<Vec<RawExpenseItem>>,
    pub rent_growth: Option<NumericInput>,
    pub expense_growth: Option<NumericInput>,
    pub exit_cap_rate: Option<NumericInput>,
    pub appreciation_rate: Option<NumericInput>,
    pub disposition_cost_rate: Option<NumericInput>,
    pub exit_valuation: Option<ExitValuation>,
    pub acquisition_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Normalized assumption set
// ---------------------------------------------------------------------------

/// Validated, normalized underwriting assumptions.
///
/// Derived figures (loan amount, price per unit, ...) are methods, computed
/// from the current fields on every call, so they can never go stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    // --- Property ---
    pub property_name: String,
    pub units: u32,
    pub property_class: PropertyClass,
    pub asset_type: AssetType,
    pub square_feet: Decimal,
    // --- Acquisition ---
    pub purchase_price: Money,
    pub closing_costs: Money,
    pub due_diligence_costs: Money,
    // --- Financing ---
    pub loan_type: LoanType,
    pub ltv: Rate,
    pub interest_rate: Rate,
    /// 0 = interest-only until maturity
    pub amortization_years: u32,
    pub interest_only_years: u32,
    pub loan_term_years: u32,
    pub hold_period_years: u32,
    // --- Operating ---
    /// In-place rent per unit per month
    pub monthly_rent_per_unit: Money,
    /// Annual other income (parking, laundry, fees), year 1
    pub other_income: Money,
    pub vacancy_rate: Rate,
    pub operating_expenses: OperatingExpenses,
    pub rent_growth: Rate,
    pub expense_growth: Rate,
    pub exit_cap_rate: Rate,
    pub appreciation_rate: Rate,
    /// Selling costs as a fraction of exit value
    pub disposition_cost_rate: Rate,
    pub exit_valuation: ExitValuation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquisition_date: Option<NaiveDate>,
}

impl Default for AssumptionSet {
    fn default() -> Self {
        AssumptionSet {
            property_name: String::new(),
            units: 150,
            property_class: PropertyClass::B,
            asset_type: AssetType::Garden,
            square_feet: dec!(135000),
            purchase_price: dec!(18000000),
            closing_costs: dec!(360000),
            due_diligence_costs: dec!(50000),
            loan_type: LoanType::Agency,
            ltv: dec!(0.70),
            interest_rate: dec!(0.07),
            amortization_years: 30,
            interest_only_years: 0,
            loan_term_years: 10,
            hold_period_years: 10,
            monthly_rent_per_unit: dec!(1300),
            other_income: Decimal::ZERO,
            vacancy_rate: dec!(0.05),
            operating_expenses: OperatingExpenses::default(),
            rent_growth: dec!(0.03),
            expense_growth: dec!(0.025),
            exit_cap_rate: dec!(0.065),
            appreciation_rate: dec!(0.03),
            disposition_cost_rate: dec!(0.02),
            exit_valuation: ExitValuation::DirectCap,
            acquisition_date: None,
        }
    }
}

/// Figures computed from an [`AssumptionSet`], never entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub loan_amount: Money,
    /// Purchase price * (1 - LTV) + closing + due diligence
    pub equity_invested: Money,
    pub total_acquisition_cost: Money,
    pub price_per_unit: Metric,
    pub price_per_square_foot: Metric,
    /// Annual gross potential rent, year 1
    pub gross_potential_rent: Money,
}

/// A field that had to be changed to fit the representable domain.
struct Adjustment {
    field: &'static str,
    reason: String,
}

impl AssumptionSet {
    pub fn loan_amount(&self) -> Money {
        self.purchase_price * self.ltv
    }

    pub fn total_acquisition_cost(&self) -> Money {
        self.purchase_price + self.closing_costs + self.due_diligence_costs
    }

    pub fn equity_invested(&self) -> Money {
        self.total_acquisition_cost() - self.loan_amount()
    }

    pub fn price_per_unit(&self) -> Metric {
        Metric::ratio(self.purchase_price, Decimal::from(self.units))
    }

    pub fn price_per_square_foot(&self) -> Metric {
        Metric::ratio(self.purchase_price, self.square_feet)
    }

    pub fn gross_potential_rent(&self) -> Money {
        self.monthly_rent_per_unit * Decimal::from(self.units) * dec!(12)
    }

    pub fn derived(&self) -> DerivedMetrics {
        DerivedMetrics {
            loan_amount: self.loan_amount(),
            equity_invested: self.equity_invested(),
            total_acquisition_cost: self.total_acquisition_cost(),
            price_per_unit: self.price_per_unit(),
            price_per_square_foot: self.price_per_square_foot(),
            gross_potential_rent: self.gross_potential_rent(),
        }
    }

    /// Restore every field, including the property name, to its default.
    pub fn reset(&mut self) {
        *self = AssumptionSet::default();
    }

    /// Reject a set that lies outside the representable domain.
    ///
    /// Sets produced by [`normalize`] or [`AssumptionSet::with_override`]
    /// always pass; this guards sets deserialized or built by hand.
    pub fn validate(&self) -> UnderwritingResult<()> {
        let (_, adjustments) = self.clone().bounded();
        match adjustments.into_iter().next() {
            Some(adj) => Err(UnderwritingError::InvalidInput {
                field: adj.field.into(),
                reason: adj.reason,
            }),
            None => Ok(()),
        }
    }

    /// Current value of an overridable assumption.
    pub fn value_of(&self, key: &AssumptionKey) -> UnderwritingResult<Decimal> {
        let value = match key {
            AssumptionKey::PurchasePrice => self.purchase_price,
            AssumptionKey::ClosingCosts => self.closing_costs,
            AssumptionKey::Ltv => self.ltv,
            AssumptionKey::InterestRate => self.interest_rate,
            AssumptionKey::MonthlyRentPerUnit => self.monthly_rent_per_unit,
            AssumptionKey::VacancyRate => self.vacancy_rate,
            AssumptionKey::RentGrowth => self.rent_growth,
            AssumptionKey::ExpenseGrowth => self.expense_growth,
            AssumptionKey::ExitCapRate => self.exit_cap_rate,
            AssumptionKey::AppreciationRate => self.appreciation_rate,
            AssumptionKey::DispositionCostRate => self.disposition_cost_rate,
            AssumptionKey::ExpenseRatio => match &self.operating_expenses {
                OperatingExpenses::Ratio { ratio } => *ratio,
                OperatingExpenses::Itemized { .. } => {
                    return Err(not_applicable(key, "expenses are itemized"))
                }
            },
            AssumptionKey::ExpenseItem(name) => self
                .expense_item(name)
                .map(|item| item.annual_amount)
                .ok_or_else(|| not_applicable(key, "no such expense category"))?,
        };
        Ok(value)
    }

    /// Clone with one assumption replaced, then re-bounded.
    pub fn with_override(&self, key: &AssumptionKey, value: Decimal) -> UnderwritingResult<AssumptionSet> {
        self.with_override_noting(key, value, &mut Vec::new())
    }

    /// [`AssumptionSet::with_override`], recording each re-bounding as a warning.
    pub fn with_override_noting(
        &self,
        key: &AssumptionKey,
        value: Decimal,
        warnings: &mut Vec<String>,
    ) -> UnderwritingResult<AssumptionSet> {
        let mut next = self.clone();
        match key {
            AssumptionKey::PurchasePrice => next.purchase_price = value,
            AssumptionKey::ClosingCosts => next.closing_costs = value,
            AssumptionKey::Ltv => next.ltv = value,
            AssumptionKey::InterestRate => next.interest_rate = value,
            AssumptionKey::MonthlyRentPerUnit => next.monthly_rent_per_unit = value,
            AssumptionKey::VacancyRate => next.vacancy_rate = value,
            AssumptionKey::RentGrowth => next.rent_growth = value,
            AssumptionKey::ExpenseGrowth => next.expense_growth = value,
            AssumptionKey::ExitCapRate => next.exit_cap_rate = value,
            AssumptionKey::AppreciationRate => next.appreciation_rate = value,
            AssumptionKey::DispositionCostRate => next.disposition_cost_rate = value,
            AssumptionKey::ExpenseRatio => match &mut next.operating_expenses {
                OperatingExpenses::Ratio { ratio } => *ratio = value,
                OperatingExpenses::Itemized { .. } => {
                    return Err(not_applicable(key, "expenses are itemized"))
                }
            },
            AssumptionKey::ExpenseItem(name) => {
                let item = next
                    .expense_item_mut(name)
                    .ok_or_else(|| not_applicable(key, "no such expense category"))?;
                item.annual_amount = value;
            }
        }
        let (bounded, adjustments) = next.bounded();
        for adj in adjustments {
            warnings.push(format!("{key} = {value}: {}: {}", adj.field, adj.reason));
        }
        Ok(bounded)
    }

    fn expense_item(&self, name: &str) -> Option<&ExpenseItem> {
        match &self.operating_expenses {
            OperatingExpenses::Itemized { items } => {
                items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
            }
            OperatingExpenses::Ratio { .. } => None,
        }
    }

    fn expense_item_mut(&mut self, name: &str) -> Option<&mut ExpenseItem> {
        match &mut self.operating_expenses {
            OperatingExpenses::Itemized { items } => {
                items.iter_mut().find(|i| i.name.eq_ignore_ascii_case(name))
            }
            OperatingExpenses::Ratio { .. } => None,
        }
    }

    /// Fit every field into the representable domain.
    fn bounded(mut self) -> (AssumptionSet, Vec<Adjustment>) {
        let mut adj = Vec::new();

        self.units = bound_count("units", self.units, 0, MAX_UNITS, &mut adj);
        self.square_feet = bound("square_feet", self.square_feet, Decimal::ZERO, MAX_SQUARE_FEET, &mut adj);
        self.purchase_price = bound("purchase_price", self.purchase_price, Decimal::ZERO, MAX_MONEY, &mut adj);
        self.closing_costs = bound("closing_costs", self.closing_costs, Decimal::ZERO, MAX_MONEY, &mut adj);
        self.due_diligence_costs =
            bound("due_diligence_costs", self.due_diligence_costs, Decimal::ZERO, MAX_MONEY, &mut adj);
        self.ltv = bound("ltv", self.ltv, Decimal::ZERO, Decimal::ONE, &mut adj);
        self.interest_rate = bound("interest_rate", self.interest_rate, Decimal::ZERO, Decimal::ONE, &mut adj);
        self.amortization_years =
            bound_count("amortization_years", self.amortization_years, 0, MAX_AMORTIZATION_YEARS, &mut adj);
        self.interest_only_years =
            bound_count("interest_only_years", self.interest_only_years, 0, MAX_INTEREST_ONLY_YEARS, &mut adj);
        self.loan_term_years = bound_count("loan_term_years", self.loan_term_years, 1, MAX_LOAN_TERM_YEARS, &mut adj);
        self.hold_period_years = bound_count("hold_period_years", self.hold_period_years, 1, MAX_HOLD_YEARS, &mut adj);
        self.monthly_rent_per_unit =
            bound("monthly_rent_per_unit", self.monthly_rent_per_unit, Decimal::ZERO, MAX_MONTHLY_RENT, &mut adj);
        self.other_income = bound("other_income", self.other_income, Decimal::ZERO, MAX_MONEY, &mut adj);
        self.vacancy_rate = bound("vacancy_rate", self.vacancy_rate, Decimal::ZERO, Decimal::ONE, &mut adj);
        self.rent_growth = bound("rent_growth", self.rent_growth, MIN_GROWTH, MAX_GROWTH, &mut adj);
        self.expense_growth = bound("expense_growth", self.expense_growth, MIN_GROWTH, MAX_GROWTH, &mut adj);
        self.appreciation_rate = bound("appreciation_rate", self.appreciation_rate, MIN_GROWTH, MAX_GROWTH, &mut adj);
        self.disposition_cost_rate =
            bound("disposition_cost_rate", self.disposition_cost_rate, Decimal::ZERO, Decimal::ONE, &mut adj);
        self.exit_cap_rate = bound("exit_cap_rate", self.exit_cap_rate, Decimal::ZERO, Decimal::ONE, &mut adj);

        match &mut self.operating_expenses {
            OperatingExpenses::Ratio { ratio } => {
                *ratio = bound("expense_ratio", *ratio, Decimal::ZERO, Decimal::ONE, &mut adj);
            }
            OperatingExpenses::Itemized { items } => {
                for (i, item) in items.iter_mut().enumerate() {
                    if item.name.trim().is_empty() {
                        item.name = format!("Expense {}", i + 1);
                    }
                    item.annual_amount = bound("expense_items", item.annual_amount, Decimal::ZERO, MAX_MONEY, &mut adj);
                }
            }
        }

        if self.exit_valuation == ExitValuation::DirectCap {
            if self.exit_cap_rate.is_zero() {
                adj.push(Adjustment {
                    field: "exit_cap_rate",
                    reason: "Exit cap rate unset; valuing by appreciation instead of direct capitalisation".into(),
                });
                self.exit_valuation = ExitValuation::Appreciation;
            } else if self.exit_cap_rate < MIN_EXIT_CAP {
                adj.push(Adjustment {
                    field: "exit_cap_rate",
                    reason: format!("Exit cap rate {} raised to {MIN_EXIT_CAP}", self.exit_cap_rate),
                });
                self.exit_cap_rate = MIN_EXIT_CAP;
            }
        }

        (self, adj)
    }
}

fn not_applicable(key: &AssumptionKey, reason: &str) -> UnderwritingError {
    UnderwritingError::InvalidInput {
        field: format!("assumption:{key}"),
        reason: format!("Cannot vary {key}: {reason}"),
    }
}

fn bound(field: &'static str, value: Decimal, min: Decimal, max: Decimal, adj: &mut Vec<Adjustment>) -> Decimal {
    if value < min || value > max {
        let fitted = value.clamp(min, max);
        adj.push(Adjustment {
            field,
            reason: format!("{value} is outside [{min}, {max}]; using {fitted}"),
        });
        fitted
    } else {
        value
    }
}

fn bound_count(field: &'static str, value: u32, min: u32, max: u32, adj: &mut Vec<Adjustment>) -> u32 {
    if value < min || value > max {
        let fitted = value.clamp(min, max);
        adj.push(Adjustment {
            field,
            reason: format!("{value} is outside [{min}, {max}]; using {fitted}"),
        });
        fitted
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Build a complete [`AssumptionSet`] from raw form input.
pub fn normalize(raw: &RawAssumptions) -> AssumptionSet {
    let mut warnings = Vec::new();
    normalize_with_warnings(raw, &mut warnings)
}

/// [`normalize`], recording every coercion and bounding as a warning.
///
/// Never fails: unparseable numbers become 0, out-of-domain values are fitted
/// to the representable range.
pub fn normalize_with_warnings(raw: &RawAssumptions, warnings: &mut Vec<String>) -> AssumptionSet {
    let d = AssumptionSet::default();
    let mut p = FieldParser { warnings };

    let operating_expenses = match &raw.expense_items {
        Some(items) if !items.is_empty() => OperatingExpenses::Itemized {
            items: items
                .iter()
                .map(|item| ExpenseItem {
                    name: item.name.trim().to_string(),
                    annual_amount: p.decimal("expense_items", item.annual_amount.as_ref(), Decimal::ZERO),
                })
                .collect(),
        },
        _ => {
            let default_ratio = match d.operating_expenses {
                OperatingExpenses::Ratio { ratio } => ratio,
                OperatingExpenses::Itemized { .. } => Decimal::ZERO,
            };
            OperatingExpenses::Ratio {
                ratio: p.decimal("expense_ratio", raw.expense_ratio.as_ref(), default_ratio),
            }
        }
    };

    let assembled = AssumptionSet {
        property_name: raw
            .property_name
            .as_ref()
            .map(|n| n.trim().to_string())
            .unwrap_or(d.property_name),
        units: p.count("units", raw.units.as_ref(), d.units),
        property_class: raw.property_class.unwrap_or(d.property_class),
        asset_type: raw.asset_type.unwrap_or(d.asset_type),
        square_feet: p.decimal("square_feet", raw.square_feet.as_ref(), d.square_feet),
        purchase_price: p.decimal("purchase_price", raw.purchase_price.as_ref(), d.purchase_price),
        closing_costs: p.decimal("closing_costs", raw.closing_costs.as_ref(), d.closing_costs),
        due_diligence_costs: p.decimal(
            "due_diligence_costs",
            raw.due_diligence_costs.as_ref(),
            d.due_diligence_costs,
        ),
        loan_type: raw.loan_type.unwrap_or(d.loan_type),
        ltv: p.decimal("ltv", raw.ltv.as_ref(), d.ltv),
        interest_rate: p.decimal("interest_rate", raw.interest_rate.as_ref(), d.interest_rate),
        amortization_years: p.count("amortization_years", raw.amortization_years.as_ref(), d.amortization_years),
        interest_only_years: p.count(
            "interest_only_years",
            raw.interest_only_years.as_ref(),
            d.interest_only_years,
        ),
        loan_term_years: p.count("loan_term_years", raw.loan_term_years.as_ref(), d.loan_term_years),
        hold_period_years: p.count("hold_period_years", raw.hold_period_years.as_ref(), d.hold_period_years),
        monthly_rent_per_unit: p.decimal(
            "monthly_rent_per_unit",
            raw.monthly_rent_per_unit.as_ref(),
            d.monthly_rent_per_unit,
        ),
        other_income: p.decimal("other_income", raw.other_income.as_ref(), d.other_income),
        vacancy_rate: p.decimal("vacancy_rate", raw.vacancy_rate.as_ref(), d.vacancy_rate),
        operating_expenses,
        rent_growth: p.decimal("rent_growth", raw.rent_growth.as_ref(), d.rent_growth),
        expense_growth: p.decimal("expense_growth", raw.expense_growth.as_ref(), d.expense_growth),
        exit_cap_rate: p.decimal("exit_cap_rate", raw.exit_cap_rate.as_ref(), d.exit_cap_rate),
        appreciation_rate: p.decimal("appreciation_rate", raw.appreciation_rate.as_ref(), d.appreciation_rate),
        disposition_cost_rate: p.decimal(
            "disposition_cost_rate",
            raw.disposition_cost_rate.as_ref(),
            d.disposition_cost_rate,
        ),
        exit_valuation: raw.exit_valuation.unwrap_or(d.exit_valuation),
        acquisition_date: raw.acquisition_date,
    };

    let (normalized, adjustments) = assembled.bounded();
    for adj in adjustments {
        p.warnings.push(format!("{}: {}", adj.field, adj.reason));
    }
    normalized
}

/// Documented default assumptions (empty property name).
pub fn reset_to_defaults() -> AssumptionSet {
    AssumptionSet::default()
}

struct FieldParser<'a> {
    warnings: &'a mut Vec<String>,
}

impl FieldParser<'_> {
    fn decimal(&mut self, field: &str, raw: Option<&NumericInput>, default: Decimal) -> Decimal {
        let Some(input) = raw else {
            return default;
        };
        match input.parse() {
            Some(v) => v,
            None => {
                self.warnings.push(format!(
                    "{field}: could not parse {input:?} as a number; using 0"
                ));
                Decimal::ZERO
            }
        }
    }

    fn count(&mut self, field: &str, raw: Option<&NumericInput>, default: u32) -> u32 {
        let Some(input) = raw else {
            return default;
        };
        let Some(value) = input.parse() else {
            self.warnings.push(format!(
                "{field}: could not parse {input:?} as a number; using 0"
            ));
            return 0;
        };
        if value.is_sign_negative() && !value.is_zero() {
            self.warnings.push(format!("{field}: {value} is negative; using 0"));
            return 0;
        }
        let whole = value.trunc();
        if whole != value {
            self.warnings.push(format!("{field}: {value} truncated to {whole}"));
        }
        // Anything beyond u32 is far outside the domain and gets bounded later
        whole.to_u32().unwrap_or(u32::MAX)
    }
}
