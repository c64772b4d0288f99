use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::amortization::{AmortizationSchedule, AnnualDebtService};
use crate::assumptions::{AssumptionSet, ExitValuation, OperatingExpenses};
use crate::time_value;
use crate::types::{with_metadata, ComputationOutput, Metric, Money};
use crate::UnderwritingResult;

const IRR_GUESS: Decimal = dec!(0.10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One year of the hold-period projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionYear {
    /// 1-based year of the hold period
    pub year: u32,
    /// Calendar end of the year, when an acquisition date is known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    pub gross_potential_revenue: Money,
    pub vacancy_loss: Money,
    pub other_income: Money,
    pub effective_revenue: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub debt_service: Money,
    pub interest: Money,
    pub principal: Money,
    /// Loan balance repaid from equity when the loan matures before exit
    pub balloon_repayment: Money,
    pub levered_cash_flow: Money,
    pub cumulative_cash_flow: Money,
    pub property_value: Money,
    pub loan_balance: Money,
    /// Property value less loan balance
    pub equity: Money,
    pub dscr: Metric,
    pub cash_on_cash: Metric,
}

/// Summary return metrics over the hold period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    pub levered_irr: Metric,
    pub unlevered_irr: Metric,
    /// Total positive distributions / equity invested
    pub equity_multiple: Metric,
    pub average_cash_on_cash: Metric,
    pub equity_invested: Money,
    pub total_distributions: Money,
    pub total_profit: Money,
    pub exit_value: Money,
    pub disposition_costs: Money,
    /// Loan balance retired from sale proceeds
    pub loan_payoff: Money,
    /// Exit value less loan payoff
    pub exit_equity: Money,
    /// Exit value less disposition costs and loan payoff
    pub exit_proceeds: Money,
    pub going_in_cap_rate: Metric,
    pub year_one_debt_yield: Metric,
    pub dscr_by_year: Vec<Metric>,
    pub minimum_dscr: Metric,
    /// Equity cash flows used for the levered IRR, year 0 first
    pub levered_cash_flows: Vec<Money>,
    /// All-cash flows used for the unlevered IRR, year 0 first
    pub unlevered_cash_flows: Vec<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionOutput {
    pub years: Vec<ProjectionYear>,
    pub metrics: ReturnMetrics,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Project hold-period cash flows and derive return metrics.
///
/// Pure: the same assumption set and schedule always give the same
/// projection. Undefined ratios and unsolvable IRRs come back as
/// [`Metric::NotApplicable`] with a warning, never as an error.
pub fn project(
    assumptions: &AssumptionSet,
    schedule: &AmortizationSchedule,
) -> UnderwritingResult<ComputationOutput<ProjectionOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    assumptions.validate()?;
    let output = compute_projection(assumptions, schedule, &mut warnings);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real Estate Hold-Period Cash Flow Projection (Levered / Unlevered DCF)",
        assumptions,
        warnings,
        elapsed,
        output,
    ))
}

/// Projection core shared by the base case and every sensitivity run.
///
/// Expects an assumption set that has passed [`AssumptionSet::validate`].
pub(crate) fn compute_projection(
    a: &AssumptionSet,
    schedule: &AmortizationSchedule,
    warnings: &mut Vec<String>,
) -> ProjectionOutput {
    let hold = a.hold_period_years;
    let equity_invested = a.equity_invested();
    let debt_years = schedule.annual_summaries();
    let maturity_year = debt_years.last().map(|y| y.year).unwrap_or(0);

    let year_one_revenue = effective_revenue(a, Decimal::ONE);
    let expense_base = match &a.operating_expenses {
        OperatingExpenses::Ratio { ratio } => year_one_revenue * ratio,
        OperatingExpenses::Itemized { items } => items.iter().map(|i| i.annual_amount).sum(),
    };

    let mut years = Vec::with_capacity(hold as usize);
    let mut rent_factor = Decimal::ONE;
    let mut expense_factor = Decimal::ONE;
    let mut appreciation_factor = Decimal::ONE;
    let mut cumulative = Decimal::ZERO;

    for year in 1..=hold {
        if year > 1 {
            rent_factor *= Decimal::ONE + a.rent_growth;
            expense_factor *= Decimal::ONE + a.expense_growth;
        }
        appreciation_factor *= Decimal::ONE + a.appreciation_rate;

        let gross_potential_revenue = a.gross_potential_rent() * rent_factor;
        let vacancy_loss = gross_potential_revenue * a.vacancy_rate;
        let other_income = a.other_income * rent_factor;
        let effective_revenue = gross_potential_revenue - vacancy_loss + other_income;
        let operating_expenses = expense_base * expense_factor;
        let noi = effective_revenue - operating_expenses;

        let debt = debt_for_year(&debt_years, year);
        let (debt_service, interest, principal, scheduled_balance) = match debt {
            Some(d) => (d.debt_service, d.interest, d.principal, d.ending_balance),
            None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        };

        // A loan maturing before exit is retired from equity in its final year
        let matures_early = year == maturity_year && year < hold;
        let balloon_repayment = if matures_early { scheduled_balance } else { Decimal::ZERO };
        let loan_balance = scheduled_balance - balloon_repayment;

        if balloon_repayment > Decimal::ZERO {
            warnings.push(format!(
                "Loan matures in year {year}, before the {hold}-year hold; balloon of {} repaid from equity",
                balloon_repayment.round_dp(2)
            ));
        }

        let levered_cash_flow = noi - debt_service - balloon_repayment;
        cumulative += levered_cash_flow;

        let property_value = match a.exit_valuation {
            ExitValuation::DirectCap => (noi / a.exit_cap_rate).max(Decimal::ZERO),
            ExitValuation::Appreciation => a.purchase_price * appreciation_factor,
        };

        years.push(ProjectionYear {
            year,
            period_end: period_end(a.acquisition_date, year),
            gross_potential_revenue,
            vacancy_loss,
            other_income,
            effective_revenue,
            operating_expenses,
            noi,
            debt_service,
            interest,
            principal,
            balloon_repayment,
            levered_cash_flow,
            cumulative_cash_flow: cumulative,
            property_value,
            loan_balance,
            equity: property_value - loan_balance,
            dscr: Metric::ratio(noi, debt_service),
            cash_on_cash: positive_ratio(levered_cash_flow, equity_invested),
        });
    }

    let metrics = compute_metrics(a, &years, warnings);

    debug!(
        hold,
        levered_irr = %metrics.levered_irr,
        unlevered_irr = %metrics.unlevered_irr,
        "projection complete"
    );

    ProjectionOutput { years, metrics }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

fn compute_metrics(a: &AssumptionSet, years: &[ProjectionYear], warnings: &mut Vec<String>) -> ReturnMetrics {
    let equity_invested = a.equity_invested();
    let hold = years.len();

    // validate() guarantees at least one year
    let (exit_value, loan_payoff, first_noi) = match (years.last(), years.first()) {
        (Some(last), Some(first)) => (last.property_value, last.loan_balance, first.noi),
        _ => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    };
    let disposition_costs = exit_value * a.disposition_cost_rate;
    let exit_equity = exit_value - loan_payoff;
    let exit_proceeds = exit_equity - disposition_costs;

    // --- Cash flow streams ---
    let mut levered_cash_flows = Vec::with_capacity(hold + 1);
    let mut unlevered_cash_flows = Vec::with_capacity(hold + 1);
    levered_cash_flows.push(-equity_invested);
    unlevered_cash_flows.push(-a.total_acquisition_cost());
    for (i, y) in years.iter().enumerate() {
        if i + 1 == hold {
            levered_cash_flows.push(y.levered_cash_flow + exit_proceeds);
            unlevered_cash_flows.push(y.noi + exit_value - disposition_costs);
        } else {
            levered_cash_flows.push(y.levered_cash_flow);
            unlevered_cash_flows.push(y.noi);
        }
    }

    let levered_irr = solve_irr("Levered IRR", &levered_cash_flows, warnings);
    let unlevered_irr = solve_irr("Unlevered IRR", &unlevered_cash_flows, warnings);

    // --- Multiples ---
    let total_distributions: Money = levered_cash_flows
        .iter()
        .skip(1)
        .filter(|cf| **cf > Decimal::ZERO)
        .copied()
        .sum();
    let total_profit: Money = levered_cash_flows.iter().copied().sum();
    let equity_multiple = positive_ratio(total_distributions, equity_invested);

    let operating_total: Money = years.iter().map(|y| y.levered_cash_flow).sum();
    let average_cash_on_cash = if hold == 0 {
        Metric::NotApplicable
    } else {
        positive_ratio(operating_total / Decimal::from(hold as u64), equity_invested)
    };

    // --- Coverage ---
    let dscr_by_year: Vec<Metric> = years.iter().map(|y| y.dscr).collect();
    let minimum_dscr: Metric = dscr_by_year.iter().filter_map(|m| m.value()).min().into();
    let going_in_cap_rate = Metric::ratio(first_noi, a.purchase_price);
    let year_one_debt_yield = Metric::ratio(first_noi, a.loan_amount());

    push_metric_warnings(a, going_in_cap_rate, minimum_dscr, exit_proceeds, warnings);

    ReturnMetrics {
        levered_irr,
        unlevered_irr,
        equity_multiple,
        average_cash_on_cash,
        equity_invested,
        total_distributions,
        total_profit,
        exit_value,
        disposition_costs,
        loan_payoff,
        exit_equity,
        exit_proceeds,
        going_in_cap_rate,
        year_one_debt_yield,
        dscr_by_year,
        minimum_dscr,
        levered_cash_flows,
        unlevered_cash_flows,
    }
}

fn solve_irr(label: &str, flows: &[Money], warnings: &mut Vec<String>) -> Metric {
    match time_value::irr(flows, IRR_GUESS) {
        Ok(rate) => Metric::Value(rate),
        Err(e) => {
            warn!(metric = label, error = %e, "IRR unavailable");
            warnings.push(format!("{label} unavailable: {e}"));
            Metric::NotApplicable
        }
    }
}

fn push_metric_warnings(
    a: &AssumptionSet,
    going_in_cap_rate: Metric,
    minimum_dscr: Metric,
    exit_proceeds: Money,
    warnings: &mut Vec<String>,
) {
    if let Metric::Value(dscr) = minimum_dscr {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "Minimum DSCR of {:.2}x is below 1.20x — lender covenant risk",
                dscr
            ));
        }
    }

    if a.ltv > dec!(0.80) {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80% — high leverage",
            a.ltv * dec!(100)
        ));
    }

    if let Metric::Value(cap) = going_in_cap_rate {
        if cap < dec!(0.03) {
            warnings.push(format!(
                "Going-in cap rate {:.2}% is below 3% — unusually low, verify pricing",
                cap * dec!(100)
            ));
        }
        if cap > dec!(0.12) {
            warnings.push(format!(
                "Going-in cap rate {:.2}% exceeds 12% — unusually high, may indicate elevated risk",
                cap * dec!(100)
            ));
        }
    }

    if a.vacancy_rate > dec!(0.15) {
        warnings.push(format!(
            "Vacancy rate {:.1}% exceeds 15% — above typical market norms",
            a.vacancy_rate * dec!(100)
        ));
    }

    if exit_proceeds < Decimal::ZERO {
        warnings.push(format!(
            "Exit proceeds of {} are negative — sale does not retire the loan",
            exit_proceeds.round_dp(2)
        ));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Effective revenue with rents scaled by `rent_factor` (1 = year 1).
fn effective_revenue(a: &AssumptionSet, rent_factor: Decimal) -> Money {
    let gpr = a.gross_potential_rent() * rent_factor;
    gpr - gpr * a.vacancy_rate + a.other_income * rent_factor
}

fn debt_for_year(debt_years: &[AnnualDebtService], year: u32) -> Option<&AnnualDebtService> {
    debt_years.get((year - 1) as usize).filter(|d| d.year == year)
}

/// Ratio against invested equity; undefined unless equity is positive.
fn positive_ratio(numerator: Money, equity: Money) -> Metric {
    if equity <= Decimal::ZERO {
        return Metric::NotApplicable;
    }
    Metric::ratio(numerator, equity)
}

fn period_end(acquisition: Option<NaiveDate>, year: u32) -> Option<NaiveDate> {
    acquisition.and_then(|d| d.checked_add_months(Months::new(12 * year)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
