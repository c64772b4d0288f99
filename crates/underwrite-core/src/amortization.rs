use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::assumptions::{
    AssumptionSet, MAX_AMORTIZATION_YEARS, MAX_INTEREST_ONLY_YEARS, MAX_LOAN_TERM_YEARS, MAX_MONEY,
};
use crate::error::UnderwritingError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::UnderwritingResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Loan structure fed to the amortization engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub loan_amount: Money,
    pub annual_rate: Rate,
    /// Amortization term in years, counted from the first period; the
    /// interest-only window uses up part of it. 0, or an IO window at least
    /// as long, = interest-only until maturity.
    pub amortization_years: u32,
    #[serde(default)]
    pub interest_only_years: u32,
    /// Maturity in years; a term shorter than the amortization term leaves a balloon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_years: Option<u32>,
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: u32,
}

/// Daily compounding is the finest schedule supported.
pub const MAX_PERIODS_PER_YEAR: u32 = 365;

fn default_periods_per_year() -> u32 {
    12
}

/// One compounding period of the debt schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    /// 1-based period index
    pub period: u32,
    /// 1-based loan year the period falls in
    pub year: u32,
    pub beginning_balance: Money,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
    pub interest_only: bool,
}

/// Debt service aggregated over one loan year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualDebtService {
    pub year: u32,
    pub beginning_balance: Money,
    pub debt_service: Money,
    pub interest: Money,
    pub principal: Money,
    pub ending_balance: Money,
}

/// A level-payment debt schedule.
///
/// Periods are generated lazily by [`AmortizationSchedule::iter`]; the
/// schedule itself stores only the loan terms, so it can be iterated any
/// number of times and shared freely.
#[derive(Debug, Clone, PartialEq)]
pub struct AmortizationSchedule {
    terms: LoanTerms,
    periodic_rate: Rate,
    io_periods: u32,
    /// Periods left to amortize once the IO window closes (0 = IO to maturity)
    amortizing_periods: u32,
    total_periods: u32,
    level_payment: Money,
}

/// Output of a standalone schedule build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub level_payment: Money,
    pub periods: Vec<AmortizationPeriod>,
    pub annual: Vec<AnnualDebtService>,
    pub total_payments: Money,
    pub total_interest: Money,
    pub total_principal: Money,
    /// Balance outstanding after the last period (0 when fully amortizing)
    pub balloon: Money,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build a level-payment schedule that runs to full amortization.
pub fn build_schedule(
    loan_amount: Money,
    annual_rate: Rate,
    amortization_years: u32,
    interest_only_years: u32,
    periods_per_year: u32,
) -> UnderwritingResult<AmortizationSchedule> {
    AmortizationSchedule::new(LoanTerms {
        loan_amount,
        annual_rate,
        amortization_years,
        interest_only_years,
        term_years: None,
        periods_per_year,
    })
}

impl AmortizationSchedule {
    /// Build a schedule, rejecting terms outside the representable domain.
    pub fn new(terms: LoanTerms) -> UnderwritingResult<Self> {
        validate_terms(&terms)?;

        let ppy = terms.periods_per_year;
        let periodic_rate = terms.annual_rate / Decimal::from(ppy);
        let io_periods = terms.interest_only_years * ppy;
        let amortization_periods = terms.amortization_years * ppy;
        let term_periods = terms.term_years.map(|t| t * ppy);

        let (amortizing_periods, full_life) = if io_periods >= amortization_periods {
            // Interest-only to maturity: without a term the loan lives through the longer window
            (0, term_periods.unwrap_or(io_periods.max(amortization_periods)))
        } else {
            (amortization_periods - io_periods, amortization_periods)
        };
        let total_periods = if terms.loan_amount.is_zero() {
            0
        } else {
            term_periods.map_or(full_life, |t| t.min(full_life))
        };

        let level_payment = level_payment(terms.loan_amount, periodic_rate, amortizing_periods);

        debug!(
            loan = %terms.loan_amount,
            rate = %terms.annual_rate,
            total_periods,
            io_periods,
            "amortization schedule built"
        );

        Ok(AmortizationSchedule {
            terms,
            periodic_rate,
            io_periods,
            amortizing_periods,
            total_periods,
            level_payment,
        })
    }

    /// Monthly schedule for the loan implied by an assumption set, truncated
    /// at the loan term.
    pub fn for_assumptions(assumptions: &AssumptionSet) -> UnderwritingResult<Self> {
        AmortizationSchedule::new(LoanTerms {
            loan_amount: assumptions.loan_amount(),
            annual_rate: assumptions.interest_rate,
            amortization_years: assumptions.amortization_years,
            interest_only_years: assumptions.interest_only_years,
            term_years: Some(assumptions.loan_term_years),
            periods_per_year: 12,
        })
    }

    pub fn terms(&self) -> &LoanTerms {
        &self.terms
    }

    /// Scheduled payment once amortization begins.
    pub fn level_payment(&self) -> Money {
        self.level_payment
    }

    pub fn periods_per_year(&self) -> u32 {
        self.terms.periods_per_year
    }

    pub fn len(&self) -> usize {
        self.total_periods as usize
    }

    pub fn is_empty(&self) -> bool {
        self.total_periods == 0
    }

    /// Number of whole or partial loan years the schedule spans.
    pub fn years(&self) -> u32 {
        self.total_periods.div_ceil(self.terms.periods_per_year)
    }

    pub fn iter(&self) -> ScheduleIter<'_> {
        ScheduleIter {
            schedule: self,
            next_period: 1,
            balance: self.terms.loan_amount,
        }
    }

    pub fn periods(&self) -> Vec<AmortizationPeriod> {
        self.iter().collect()
    }

    /// Outstanding balance after `period` payments (the loan amount at 0).
    pub fn balance_after(&self, period: u32) -> Money {
        if period == 0 {
            return self.terms.loan_amount;
        }
        self.iter()
            .take_while(|p| p.period <= period)
            .last()
            .map(|p| p.ending_balance)
            .unwrap_or(self.terms.loan_amount)
    }

    /// Balance left when the schedule ends.
    pub fn balloon(&self) -> Money {
        self.iter()
            .last()
            .map(|p| p.ending_balance)
            .unwrap_or(Decimal::ZERO)
    }

    /// Per-year aggregation in a single pass over the schedule.
    pub fn annual_summaries(&self) -> Vec<AnnualDebtService> {
        let mut years: Vec<AnnualDebtService> = Vec::with_capacity(self.years() as usize);
        for p in self.iter() {
            match years.last_mut() {
                Some(current) if current.year == p.year => {
                    current.debt_service += p.payment;
                    current.interest += p.interest;
                    current.principal += p.principal;
                    current.ending_balance = p.ending_balance;
                }
                _ => years.push(AnnualDebtService {
                    year: p.year,
                    beginning_balance: p.beginning_balance,
                    debt_service: p.payment,
                    interest: p.interest,
                    principal: p.principal,
                    ending_balance: p.ending_balance,
                }),
            }
        }
        years
    }

    /// Aggregate for one loan year; `None` once the schedule has ended.
    pub fn annual_summary(&self, year: u32) -> Option<AnnualDebtService> {
        self.annual_summaries().into_iter().find(|y| y.year == year)
    }
}

fn invalid(field: &str, reason: String) -> UnderwritingResult<()> {
    Err(UnderwritingError::InvalidInput {
        field: field.into(),
        reason,
    })
}

fn validate_terms(terms: &LoanTerms) -> UnderwritingResult<()> {
    if terms.periods_per_year == 0 || terms.periods_per_year > MAX_PERIODS_PER_YEAR {
        return invalid(
            "periods_per_year",
            format!("Periods per year must be between 1 and {MAX_PERIODS_PER_YEAR}"),
        );
    }
    if terms.loan_amount < Decimal::ZERO || terms.loan_amount > MAX_MONEY {
        return invalid("loan_amount", format!("Loan amount must be between 0 and {MAX_MONEY}"));
    }
    if terms.annual_rate < Decimal::ZERO || terms.annual_rate > Decimal::ONE {
        return invalid("annual_rate", "Interest rate must be between 0 and 1".into());
    }
    if terms.amortization_years > MAX_AMORTIZATION_YEARS {
        return invalid(
            "amortization_years",
            format!("Amortization cannot exceed {MAX_AMORTIZATION_YEARS} years"),
        );
    }
    if terms.interest_only_years > MAX_INTEREST_ONLY_YEARS {
        return invalid(
            "interest_only_years",
            format!("Interest-only period cannot exceed {MAX_INTEREST_ONLY_YEARS} years"),
        );
    }
    if terms.term_years.is_some_and(|t| t > MAX_LOAN_TERM_YEARS) {
        return invalid(
            "term_years",
            format!("Loan term cannot exceed {MAX_LOAN_TERM_YEARS} years"),
        );
    }
    Ok(())
}

/// `L * r / (1 - (1+r)^-n)`, or `L / n` when the rate is zero.
///
/// Works through the discount factor `(1+r)^-n`, which shrinks toward zero
/// instead of overflowing for long terms or high rates.
fn level_payment(loan_amount: Money, periodic_rate: Rate, periods: u32) -> Money {
    if periods == 0 || loan_amount.is_zero() {
        return Decimal::ZERO;
    }
    let straight_line = loan_amount / Decimal::from(periods);
    if periodic_rate.is_zero() {
        return straight_line;
    }

    let v = Decimal::ONE / (Decimal::ONE + periodic_rate);
    let mut vn = Decimal::ONE;
    for _ in 0..periods {
        vn *= v;
    }

    let denominator = Decimal::ONE - vn;
    if denominator.is_zero() {
        // Rate too small to register at 28 digits
        return straight_line;
    }
    loan_amount * periodic_rate / denominator
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Lazy walk over a schedule's periods.
#[derive(Debug, Clone)]
pub struct ScheduleIter<'a> {
    schedule: &'a AmortizationSchedule,
    next_period: u32,
    balance: Money,
}

impl Iterator for ScheduleIter<'_> {
    type Item = AmortizationPeriod;

    fn next(&mut self) -> Option<AmortizationPeriod> {
        let s = self.schedule;
        if self.next_period > s.total_periods {
            return None;
        }

        let period = self.next_period;
        let beginning = self.balance;
        let interest = beginning * s.periodic_rate;
        let interest_only = period <= s.io_periods || s.amortizing_periods == 0;

        let (payment, principal) = if interest_only {
            (interest, Decimal::ZERO)
        } else {
            let last_amortizing = period == s.io_periods.saturating_add(s.amortizing_periods);
            let scheduled = s.level_payment - interest;
            if last_amortizing || scheduled > beginning {
                // Retire the exact residual so the loan ends at zero
                (interest + beginning, beginning)
            } else {
                (s.level_payment, scheduled)
            }
        };

        let ending = beginning - principal;
        self.balance = ending;
        self.next_period += 1;

        Some(AmortizationPeriod {
            period,
            year: (period - 1) / s.terms.periods_per_year + 1,
            beginning_balance: beginning,
            payment,
            interest,
            principal,
            ending_balance: ending,
            interest_only,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.schedule.total_periods as usize + 1).saturating_sub(self.next_period as usize);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ScheduleIter<'_> {}

impl<'a> IntoIterator for &'a AmortizationSchedule {
    type Item = AmortizationPeriod;
    type IntoIter = ScheduleIter<'a>;

    fn into_iter(self) -> ScheduleIter<'a> {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build and materialise a debt schedule with annual roll-ups and totals.
pub fn amortize(terms: &LoanTerms) -> UnderwritingResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let schedule = AmortizationSchedule::new(terms.clone())?;
    let periods = schedule.periods();
    let annual = schedule.annual_summaries();

    let total_payments: Money = periods.iter().map(|p| p.payment).sum();
    let total_interest: Money = periods.iter().map(|p| p.interest).sum();
    let total_principal: Money = periods.iter().map(|p| p.principal).sum();
    let balloon = periods.last().map(|p| p.ending_balance).unwrap_or(Decimal::ZERO);

    if terms.loan_amount.is_zero() {
        warnings.push("Loan amount is zero; schedule is empty".into());
    }
    if balloon > Decimal::ZERO {
        warnings.push(format!(
            "Loan matures with a balloon of {} outstanding",
            balloon.round_dp(2)
        ));
    }

    let output = AmortizationOutput {
        level_payment: schedule.level_payment(),
        periods,
        annual,
        total_payments,
        total_interest,
        total_principal,
        balloon,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-Payment Amortization Schedule",
        terms,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn total_principal(s: &AmortizationSchedule) -> Money {
        s.iter().map(|p| p.principal).sum()
    }

    fn assert_close(actual: Money, expected: Money) {
        assert!(
            (actual - expected).abs() < dec!(0.000001),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_monthly_payment_sanity() {
        // $750k at 6.5% over 30 years, ~$4,740/mo
        let s = build_schedule(dec!(750000), dec!(0.065), 30, 0, 12).unwrap();
        let pmt = s.level_payment();
        assert!(pmt > dec!(4700) && pmt < dec!(4800), "payment {pmt}");
        assert_eq!(s.len(), 360);
    }

    #[test]
    fn test_fully_amortizes_to_zero() {
        let s = build_schedule(dec!(12600000), dec!(0.07), 30, 0, 12).unwrap();
        let last = s.iter().last().unwrap();
        assert_eq!(last.ending_balance, Decimal::ZERO);
        assert_close(total_principal(&s), dec!(12600000));
    }

    #[test]
    fn test_balances_chain() {
        let s = build_schedule(dec!(1000000), dec!(0.05), 10, 2, 12).unwrap();
        let periods = s.periods();
        for w in periods.windows(2) {
            assert_eq!(w[0].ending_balance, w[1].beginning_balance);
        }
    }

    #[test]
    fn test_interest_only_window() {
        let s = build_schedule(dec!(1200000), dec!(0.06), 30, 3, 12).unwrap();
        // IO years count against the 30-year amortization term
        assert_eq!(s.len(), 360);
        for p in s.iter().take(36) {
            assert!(p.interest_only);
            assert_eq!(p.principal, Decimal::ZERO);
            assert_eq!(p.payment, dec!(6000));
            assert_eq!(p.ending_balance, dec!(1200000));
        }
        let first_amortizing = s.iter().nth(36).unwrap();
        assert!(!first_amortizing.interest_only);
        assert!(first_amortizing.principal > Decimal::ZERO);
        assert_close(total_principal(&s), dec!(1200000));
        assert_eq!(s.balloon(), Decimal::ZERO);
    }

    #[test]
    fn test_payment_after_io_uses_remaining_periods() {
        let with_io = build_schedule(dec!(1200000), dec!(0.06), 30, 3, 12).unwrap();
        let remaining = build_schedule(dec!(1200000), dec!(0.06), 27, 0, 12).unwrap();
        assert_eq!(with_io.level_payment(), remaining.level_payment());
        // 324 months at 0.5%: ~7,487.82
        let pmt = with_io.level_payment();
        assert!(pmt > dec!(7487) && pmt < dec!(7489), "payment {pmt}");
        assert_eq!(with_io.iter().nth(36).unwrap().payment, pmt);
    }

    #[test]
    fn test_io_covering_amortization_is_interest_only_to_maturity() {
        let s = AmortizationSchedule::new(LoanTerms {
            loan_amount: dec!(2000000),
            annual_rate: dec!(0.06),
            amortization_years: 5,
            interest_only_years: 5,
            term_years: Some(7),
            periods_per_year: 12,
        })
        .unwrap();
        assert_eq!(s.len(), 84);
        assert!(s.iter().all(|p| p.interest_only && p.principal.is_zero()));
        assert_eq!(s.balloon(), dec!(2000000));
    }

    #[test]
    fn test_zero_rate_straight_line() {
        let s = build_schedule(dec!(360000), Decimal::ZERO, 30, 0, 12).unwrap();
        assert_eq!(s.level_payment(), dec!(1000));
        assert!(s.iter().all(|p| p.interest.is_zero()));
        assert_eq!(s.balloon(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_loan_is_empty() {
        let s = build_schedule(Decimal::ZERO, dec!(0.07), 30, 0, 12).unwrap();
        assert!(s.is_empty());
        assert_eq!(s.iter().count(), 0);
        assert!(s.annual_summaries().is_empty());
        assert_eq!(s.balloon(), Decimal::ZERO);
    }

    #[test]
    fn test_term_shorter_than_amortization_leaves_balloon() {
        let s = AmortizationSchedule::new(LoanTerms {
            loan_amount: dec!(10000000),
            annual_rate: dec!(0.06),
            amortization_years: 30,
            interest_only_years: 0,
            term_years: Some(10),
            periods_per_year: 12,
        })
        .unwrap();
        assert_eq!(s.len(), 120);
        let balloon = s.balloon();
        assert!(balloon > dec!(8000000) && balloon < dec!(8500000), "balloon {balloon}");
        assert_eq!(s.balance_after(120), balloon);
    }

    #[test]
    fn test_interest_only_to_maturity() {
        let s = AmortizationSchedule::new(LoanTerms {
            loan_amount: dec!(5000000),
            annual_rate: dec!(0.08),
            amortization_years: 0,
            interest_only_years: 0,
            term_years: Some(3),
            periods_per_year: 12,
        })
        .unwrap();
        assert_eq!(s.len(), 36);
        assert_eq!(s.balloon(), dec!(5000000));
    }

    #[test]
    fn test_restartable_iteration() {
        let s = build_schedule(dec!(500000), dec!(0.045), 15, 0, 12).unwrap();
        let first: Vec<_> = s.iter().collect();
        let second: Vec<_> = (&s).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(s.iter().len(), 180);
    }

    #[test]
    fn test_annual_summary_sums_periods() {
        let s = build_schedule(dec!(1000000), dec!(0.06), 30, 0, 12).unwrap();
        let y1 = s.annual_summary(1).unwrap();
        assert_close(y1.debt_service, s.level_payment() * dec!(12));
        assert_eq!(y1.ending_balance, s.balance_after(12));
        assert_eq!(s.annual_summaries().len(), 30);
        assert!(s.annual_summary(31).is_none());
    }

    #[test]
    fn test_quarterly_periods() {
        let s = build_schedule(dec!(100000), dec!(0.08), 5, 0, 4).unwrap();
        assert_eq!(s.len(), 20);
        assert_eq!(s.iter().last().unwrap().year, 5);
        assert_close(total_principal(&s), dec!(100000));
    }

    #[test]
    fn test_zero_periods_per_year_rejected() {
        assert!(build_schedule(dec!(100000), dec!(0.05), 30, 0, 0).is_err());
    }

    #[test]
    fn test_out_of_domain_terms_rejected() {
        let base = LoanTerms {
            loan_amount: dec!(1000000),
            annual_rate: dec!(0.06),
            amortization_years: 30,
            interest_only_years: 0,
            term_years: None,
            periods_per_year: 12,
        };
        let cases = [
            ("loan_amount", LoanTerms { loan_amount: Decimal::MAX, ..base.clone() }),
            ("annual_rate", LoanTerms { annual_rate: dec!(1.5), ..base.clone() }),
            ("amortization_years", LoanTerms { amortization_years: 400_000_000, ..base.clone() }),
            ("interest_only_years", LoanTerms { interest_only_years: 31, ..base.clone() }),
            ("term_years", LoanTerms { term_years: Some(u32::MAX), ..base.clone() }),
            ("periods_per_year", LoanTerms { periods_per_year: 366, ..base.clone() }),
        ];
        for (expected, terms) in cases {
            match amortize(&terms).unwrap_err() {
                UnderwritingError::InvalidInput { field, .. } => assert_eq!(field, expected),
                other => panic!("Expected InvalidInput for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_largest_loan_amortizes_without_overflow() {
        let out = amortize(&LoanTerms {
            loan_amount: MAX_MONEY,
            annual_rate: Decimal::ONE,
            amortization_years: MAX_AMORTIZATION_YEARS,
            interest_only_years: 0,
            term_years: None,
            periods_per_year: 12,
        })
        .unwrap();
        assert_eq!(out.result.periods.len(), 600);
        assert_close(out.result.total_principal, MAX_MONEY);
    }

    #[test]
    fn test_exact_size_hint_tracks_iteration() {
        let s = build_schedule(dec!(100000), dec!(0.05), 2, 0, 12).unwrap();
        let mut it = s.iter();
        assert_eq!(it.len(), 24);
        it.nth(9);
        assert_eq!(it.len(), 14);
        it.by_ref().for_each(drop);
        assert_eq!(it.len(), 0);
    }

    #[test]
    fn test_amortize_output_totals() {
        let terms = LoanTerms {
            loan_amount: dec!(200000),
            annual_rate: dec!(0.05),
            amortization_years: 15,
            interest_only_years: 0,
            term_years: None,
            periods_per_year: 12,
        };
        let out = amortize(&terms).unwrap();
        let r = &out.result;
        assert_close(r.total_principal, dec!(200000));
        assert_close(r.total_payments, r.total_interest + r.total_principal);
        assert_eq!(r.balloon, Decimal::ZERO);
        assert!(out.warnings.is_empty());
    }
}
