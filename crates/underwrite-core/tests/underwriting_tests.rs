use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use underwrite_core::amortization::{self, AmortizationSchedule, LoanTerms};
use underwrite_core::analysis::{underwrite, UnderwritingRequest};
use underwrite_core::assumptions::{self, AssumptionSet, NumericInput, RawAssumptions};
use underwrite_core::projection;
use underwrite_core::session::UnderwritingSession;
use underwrite_core::Metric;

fn modal_scenario() -> RawAssumptions {
    // The "Complete Underwriting Workflow" inputs, typed as a user would
    RawAssumptions {
        property_name: Some("Riverside Commons".into()),
        units: Some("150".into()),
        purchase_price: Some("$18,000,000".into()),
        ltv: Some("70%".into()),
        interest_rate: Some("7%".into()),
        amortization_years: Some("30".into()),
        hold_period_years: Some("10".into()),
        ..Default::default()
    }
}

// ===========================================================================
// Amortization
// ===========================================================================

#[test]
fn test_principal_sums_to_loan_across_structures() {
    let cases = [
        (dec!(12600000), dec!(0.07), 30, 0),
        (dec!(5000000), dec!(0.055), 25, 2),
        (dec!(750000), Decimal::ZERO, 15, 0),
        (dec!(250000000), dec!(0.11), 10, 5),
    ];
    for (loan, rate, amort, io) in cases {
        let s = amortization::build_schedule(loan, rate, amort, io, 12).unwrap();
        let principal: Decimal = s.iter().map(|p| p.principal).sum();
        assert!(
            (principal - loan).abs() < dec!(0.0001),
            "loan {loan} at {rate}: principal {principal}"
        );
        assert_eq!(s.iter().last().unwrap().ending_balance, Decimal::ZERO);
    }
}

#[test]
fn test_amortize_envelope() {
    let out = amortization::amortize(&LoanTerms {
        loan_amount: dec!(12600000),
        annual_rate: dec!(0.07),
        amortization_years: 30,
        interest_only_years: 0,
        term_years: Some(10),
        periods_per_year: 12,
    })
    .unwrap();
    assert_eq!(out.result.periods.len(), 120);
    assert_eq!(out.result.annual.len(), 10);
    assert!(out.result.balloon > Decimal::ZERO);
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}

#[test]
fn test_interest_only_years_count_toward_amortization() {
    let mut a = AssumptionSet::default();
    a.interest_only_years = 2;
    a.loan_term_years = 30;
    let schedule = AmortizationSchedule::for_assumptions(&a).unwrap();
    assert_eq!(schedule.len(), 360);
    assert_eq!(schedule.balloon(), Decimal::ZERO);

    let io_year = schedule.annual_summary(2).unwrap();
    let amortizing_year = schedule.annual_summary(3).unwrap();
    assert_eq!(io_year.principal, Decimal::ZERO);
    assert!(amortizing_year.debt_service > io_year.debt_service);

    let plain = amortization::build_schedule(a.loan_amount(), a.interest_rate, 28, 0, 12).unwrap();
    assert_eq!(schedule.level_payment(), plain.level_payment());
}

#[test]
fn test_amortize_rejects_unrepresentable_loan() {
    let result = amortization::amortize(&LoanTerms {
        loan_amount: Decimal::MAX,
        annual_rate: dec!(0.12),
        amortization_years: 30,
        interest_only_years: 0,
        term_years: None,
        periods_per_year: 12,
    });
    assert!(result.is_err());
}

// ===========================================================================
// Projection
// ===========================================================================

#[test]
fn test_modal_scenario_results() {
    let a = assumptions::normalize(&modal_scenario());
    let schedule = AmortizationSchedule::for_assumptions(&a).unwrap();
    let out = projection::project(&a, &schedule).unwrap();
    let m = &out.result.metrics;

    let irr = m.levered_irr.value().expect("levered IRR should be finite");
    assert!(irr > Decimal::ZERO && irr < Decimal::ONE, "levered IRR {irr}");
    assert!(m.equity_multiple.value().unwrap() > Decimal::ONE);
    assert!(out.result.years.iter().all(|y| y.noi > Decimal::ZERO));
}

#[test]
fn test_projection_is_deterministic() {
    let a = assumptions::normalize(&modal_scenario());
    let schedule = AmortizationSchedule::for_assumptions(&a).unwrap();
    let first = projection::project(&a, &schedule).unwrap().result;
    let second = projection::project(&a, &schedule).unwrap().result;
    assert_eq!(first, second);
}

#[test]
fn test_leverage_amplification_with_cheap_debt() {
    let mut a = AssumptionSet::default();
    a.interest_rate = dec!(0.045);
    a.exit_cap_rate = dec!(0.06);
    let schedule = AmortizationSchedule::for_assumptions(&a).unwrap();
    let m = projection::project(&a, &schedule).unwrap().result.metrics;
    assert!(m.levered_irr.value().unwrap() > m.unlevered_irr.value().unwrap());
}

#[test]
fn test_equity_build_over_hold() {
    let a = AssumptionSet::default();
    let schedule = AmortizationSchedule::for_assumptions(&a).unwrap();
    let years = projection::project(&a, &schedule).unwrap().result.years;
    for w in years.windows(2) {
        assert!(w[1].loan_balance < w[0].loan_balance);
        assert!(w[1].equity > w[0].equity);
    }
}

// ===========================================================================
// Edge inputs
// ===========================================================================

#[test]
fn test_zero_units_full_result_set() {
    let raw = RawAssumptions {
        units: Some(NumericInput::Number(Decimal::ZERO)),
        ..Default::default()
    };
    let out = underwrite(&raw.into()).unwrap();
    assert_eq!(out.result.derived.price_per_unit, Metric::NotApplicable);
    assert_eq!(out.result.projection.len(), 10);
    assert_eq!(format!("{}", out.result.derived.price_per_unit), "--");
}

#[test]
fn test_extreme_price_full_result_set() {
    let raw = RawAssumptions {
        purchase_price: Some("999999999999".into()),
        ..Default::default()
    };
    let out = underwrite(&raw.into()).unwrap();
    let m = &out.result.metrics;
    assert_eq!(m.levered_cash_flows.len(), 11);
    assert_eq!(m.dscr_by_year.len(), 10);
    assert!(m.going_in_cap_rate.is_available());
    let json = serde_json::to_value(m).unwrap();
    assert!(json["levered_irr"].is_null());
}

#[test]
fn test_garbage_everywhere_still_underwrites() {
    let raw: RawAssumptions = serde_json::from_value(serde_json::json!({
        "units": "n/a",
        "purchase_price": "TBD",
        "ltv": "",
        "interest_rate": "seven",
        "hold_period_years": "ten",
        "vacancy_rate": "-5%"
    }))
    .unwrap();
    let out = underwrite(&raw.into()).unwrap();
    assert!(out.warnings.len() >= 6);
    assert_eq!(out.result.projection.len(), 1);
}

// ===========================================================================
// Sensitivity
// ===========================================================================

#[cfg(feature = "sensitivity")]
mod sensitivity {
    use super::*;
    use pretty_assertions::assert_eq;
    use underwrite_core::assumptions::AssumptionKey;
    use underwrite_core::sensitivity::{run_sensitivity, standard_perturbations, Perturbation};

    #[test]
    fn test_tornado_places_larger_effect_first() {
        let base = AssumptionSet::default();
        let perturbations = vec![
            Perturbation::absolute(AssumptionKey::DispositionCostRate, dec!(0.001)),
            Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.005)),
        ];
        let out = run_sensitivity(&base, &perturbations).unwrap();
        let keys: Vec<_> = out.result.tornado.iter().map(|b| b.key.clone()).collect();
        assert_eq!(keys, vec![AssumptionKey::ExitCapRate, AssumptionKey::DispositionCostRate]);
    }

    #[test]
    fn test_underwrite_carries_sensitivity() {
        let out = underwrite(&UnderwritingRequest::from(modal_scenario())).unwrap();
        let s = out.result.sensitivity.expect("sensitivity included by default");
        assert_eq!(s.base_case, out.result.metrics.levered_irr);
        assert_eq!(s.tornado.len(), standard_perturbations().len());
    }
}

// ===========================================================================
// Session
// ===========================================================================

#[test]
fn test_session_reset_invariant() {
    let mut s = UnderwritingSession::new();
    for (field, text) in [
        ("property_name", "Harbor View"),
        ("units", "212"),
        ("purchase_price", "31,000,000"),
        ("exit_cap_rate", "5.75%"),
        ("asset_type", "Mid-Rise"),
    ] {
        s.set_field(field, text).unwrap();
    }
    s.recalculate().unwrap();
    s.reset();
    assert_eq!(s.assumptions(), assumptions::reset_to_defaults());
    assert_eq!(s.assumptions().property_name, "");
}
