use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use crate::amortization::AmortizationSchedule;
use crate::assumptions::{normalize_with_warnings, AssumptionKey, AssumptionSet, RawAssumptions};
use crate::error::UnderwritingError;
use crate::projection::{project, ReturnMetrics};
use crate::types::{with_metadata, ComputationOutput, Metric};
use crate::UnderwritingResult;

/// Axis length cap for two-way grids.
const MAX_AXIS_POINTS: usize = 101;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerturbationMode {
    /// Delta is added to the value (0.005 on a cap rate = 50bp)
    #[default]
    Absolute,
    /// Delta is a fraction of the value (0.05 = 5%)
    Relative,
}

/// A single-variable change, evaluated in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    pub key: AssumptionKey,
    /// Magnitude; its sign is ignored
    pub delta: Decimal,
    #[serde(default)]
    pub mode: PerturbationMode,
}

impl Perturbation {
    pub fn absolute(key: AssumptionKey, delta: Decimal) -> Self {
        Perturbation { key, delta, mode: PerturbationMode::Absolute }
    }

    pub fn relative(key: AssumptionKey, delta: Decimal) -> Self {
        Perturbation { key, delta, mode: PerturbationMode::Relative }
    }

    /// Perturbed value of `base` in the given direction.
    pub fn apply(&self, base: Decimal, direction: Direction) -> UnderwritingResult<Decimal> {
        let step = match direction {
            Direction::Up => self.delta.abs(),
            Direction::Down => -self.delta.abs(),
        };
        let value = match self.mode {
            PerturbationMode::Absolute => base.checked_add(step),
            PerturbationMode::Relative => (Decimal::ONE + step).checked_mul(base),
        };
        value.ok_or_else(|| UnderwritingError::InvalidInput {
            field: format!("perturbation:{}", self.key),
            reason: format!("Delta {} overflows the assumption value", self.delta),
        })
    }

    fn describe(&self, direction: Direction) -> String {
        let sign = match direction {
            Direction::Up => "+",
            Direction::Down => "-",
        };
        match self.mode {
            PerturbationMode::Absolute => format!("{} {sign}{}", self.key.label(), self.delta.abs().normalize()),
            PerturbationMode::Relative => format!(
                "{} {sign}{}%",
                self.key.label(),
                (self.delta.abs() * dec!(100)).normalize()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Return metric a sensitivity run measures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    #[default]
    LeveredIrr,
    UnleveredIrr,
    EquityMultiple,
}

impl TargetMetric {
    pub fn extract(&self, metrics: &ReturnMetrics) -> Metric {
        match self {
            TargetMetric::LeveredIrr => metrics.levered_irr,
            TargetMetric::UnleveredIrr => metrics.unlevered_irr,
            TargetMetric::EquityMultiple => metrics.equity_multiple,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetMetric::LeveredIrr => "Levered IRR",
            TargetMetric::UnleveredIrr => "Unlevered IRR",
            TargetMetric::EquityMultiple => "Equity Multiple",
        }
    }
}

/// One single-variable re-run against the unchanged base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityScenario {
    pub label: String,
    pub key: AssumptionKey,
    pub direction: Direction,
    /// Assumption value actually used, after bounding
    pub assumption_value: Decimal,
    pub metric: Metric,
    /// Change from the base case
    pub delta: Metric,
}

/// One tornado bar: the worse and better outcome of a perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoBar {
    pub key: AssumptionKey,
    pub label: String,
    pub downside: Metric,
    pub upside: Metric,
    /// upside - downside
    pub spread: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub key: AssumptionKey,
    pub value: Decimal,
}

/// All favourable (Upside) or unfavourable (Downside) changes applied together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedScenario {
    pub label: String,
    pub overrides: Vec<AppliedOverride>,
    pub metric: Metric,
    pub delta: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub target_metric: TargetMetric,
    pub base_case: Metric,
    /// Ranked by absolute change, unavailable results last
    pub scenarios: Vec<SensitivityScenario>,
    /// Ranked by spread, widest first
    pub tornado: Vec<TornadoBar>,
    pub upside: CombinedScenario,
    pub downside: CombinedScenario,
}

/// Serialized request for a tornado run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityRequest {
    pub assumptions: RawAssumptions,
    /// Standard set when omitted
    pub perturbations: Option<Vec<Perturbation>>,
    pub target_metric: TargetMetric,
}

/// One axis of a two-way grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub key: AssumptionKey,
    pub values: Vec<Decimal>,
}

impl GridAxis {
    /// Values from `min` to `max` inclusive in `step` increments.
    pub fn sweep(key: AssumptionKey, min: Decimal, max: Decimal, step: Decimal) -> UnderwritingResult<Self> {
        if step <= Decimal::ZERO {
            return Err(UnderwritingError::InvalidInput {
                field: format!("axis:{key}"),
                reason: "Step must be positive".into(),
            });
        }
        if min > max {
            return Err(UnderwritingError::InvalidInput {
                field: format!("axis:{key}"),
                reason: "Min must be <= max".into(),
            });
        }

        let mut values = Vec::new();
        let mut current = min;
        while current <= max && values.len() < MAX_AXIS_POINTS {
            values.push(current);
            current += step;
        }
        if let Some(&last) = values.last() {
            if last < max && values.len() < MAX_AXIS_POINTS {
                values.push(max);
            }
        }

        Ok(GridAxis { key, values })
    }
}

/// Serialized request for a two-way grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRequest {
    #[serde(default)]
    pub assumptions: RawAssumptions,
    pub axis_1: GridAxis,
    pub axis_2: GridAxis,
    #[serde(default)]
    pub target_metric: TargetMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub target_metric: TargetMetric,
    pub axis_1: GridAxis,
    pub axis_2: GridAxis,
    /// matrix[i][j] = metric at axis_1.values[i], axis_2.values[j]
    pub matrix: Vec<Vec<Metric>>,
    pub base_case: Metric,
    /// Cell closest to the base assumptions (row, col)
    pub base_case_position: (usize, usize),
}

// ---------------------------------------------------------------------------
// Perturbation sets
// ---------------------------------------------------------------------------

/// Exit cap ±50bp, rent growth ±1pt, interest rate ±1pt, price ±5%,
/// vacancy ±2pt, expense growth ±1pt, LTV ±5pt.
pub fn standard_perturbations() -> Vec<Perturbation> {
    vec![
        Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.005)),
        Perturbation::absolute(AssumptionKey::RentGrowth, dec!(0.01)),
        Perturbation::absolute(AssumptionKey::InterestRate, dec!(0.01)),
        Perturbation::relative(AssumptionKey::PurchasePrice, dec!(0.05)),
        Perturbation::absolute(AssumptionKey::VacancyRate, dec!(0.02)),
        Perturbation::absolute(AssumptionKey::ExpenseGrowth, dec!(0.01)),
        Perturbation::absolute(AssumptionKey::Ltv, dec!(0.05)),
    ]
}

// ---------------------------------------------------------------------------
// Tornado analysis
// ---------------------------------------------------------------------------

/// Tornado analysis on levered IRR.
pub fn run_sensitivity(
    base: &AssumptionSet,
    perturbations: &[Perturbation],
) -> UnderwritingResult<ComputationOutput<SensitivityOutput>> {
    run_sensitivity_for(base, perturbations, TargetMetric::LeveredIrr)
}

/// Re-run the projection under each perturbation, one variable at a time,
/// then once with every favourable and once with every unfavourable change.
pub fn run_sensitivity_for(
    base: &AssumptionSet,
    perturbations: &[Perturbation],
    target: TargetMetric,
) -> UnderwritingResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    base.validate()?;
    if let Some(p) = perturbations.iter().find(|p| p.delta.is_zero()) {
        return Err(UnderwritingError::InvalidInput {
            field: format!("perturbation:{}", p.key),
            reason: "Delta must be non-zero".into(),
        });
    }

    let base_case = evaluate(base, target)?;

    let mut scenarios = Vec::with_capacity(perturbations.len() * 2);
    let mut tornado = Vec::with_capacity(perturbations.len());
    let mut upside_overrides = Vec::new();
    let mut downside_overrides = Vec::new();

    for p in perturbations {
        let base_value = match base.value_of(&p.key) {
            Ok(v) => v,
            Err(e) => {
                warnings.push(format!("Skipped {}: {e}", p.key));
                continue;
            }
        };

        let up = run_scenario(base, p, base_value, Direction::Up, base_case, target, &mut warnings)?;
        let down = run_scenario(base, p, base_value, Direction::Down, base_case, target, &mut warnings)?;

        if let (Some(u), Some(d)) = (up.metric.value(), down.metric.value()) {
            match u.cmp(&d) {
                Ordering::Greater => {
                    upside_overrides.push(override_of(&up));
                    downside_overrides.push(override_of(&down));
                }
                Ordering::Less => {
                    upside_overrides.push(override_of(&down));
                    downside_overrides.push(override_of(&up));
                }
                Ordering::Equal => {}
            }
        } else {
            warnings.push(format!(
                "{} unavailable for at least one direction of {}",
                target.label(),
                p.key
            ));
        }

        tornado.push(tornado_bar(p, &up, &down));
        scenarios.push(up);
        scenarios.push(down);
    }

    scenarios.sort_by(|a, b| by_magnitude_desc(a.delta, b.delta));
    tornado.sort_by(|a, b| by_magnitude_desc(a.spread, b.spread));

    let upside = combined("Upside", base, upside_overrides, base_case, target, &mut warnings)?;
    let downside = combined("Downside", base, downside_overrides, base_case, target, &mut warnings)?;

    debug!(
        scenarios = scenarios.len(),
        base_case = %base_case,
        "sensitivity complete"
    );

    let output = SensitivityOutput {
        target_metric: target,
        base_case,
        scenarios,
        tornado,
        upside,
        downside,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "One-at-a-Time Sensitivity (Tornado) with Combined Upside / Downside",
        &serde_json::json!({
            "target_metric": target,
            "perturbations": perturbations,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Serialized entry point: normalize, then run the requested or standard set.
pub fn run_sensitivity_request(
    request: &SensitivityRequest,
) -> UnderwritingResult<ComputationOutput<SensitivityOutput>> {
    let mut coercions = Vec::new();
    let base = normalize_with_warnings(&request.assumptions, &mut coercions);
    let perturbations = request.perturbations.clone().unwrap_or_else(standard_perturbations);
    let mut out = run_sensitivity_for(&base, &perturbations, request.target_metric)?;
    coercions.append(&mut out.warnings);
    out.warnings = coercions;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Two-way grid
// ---------------------------------------------------------------------------

/// Evaluate `target` over the cross product of two assumption axes.
pub fn sensitivity_grid(
    base: &AssumptionSet,
    axis_1: &GridAxis,
    axis_2: &GridAxis,
    target: TargetMetric,
) -> UnderwritingResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    base.validate()?;
    for axis in [axis_1, axis_2] {
        if axis.values.is_empty() || axis.values.len() > MAX_AXIS_POINTS {
            return Err(UnderwritingError::InvalidInput {
                field: format!("axis:{}", axis.key),
                reason: format!("An axis needs 1 to {MAX_AXIS_POINTS} values"),
            });
        }
    }
    let base_1 = base.value_of(&axis_1.key)?;
    let base_2 = base.value_of(&axis_2.key)?;

    let mut matrix = Vec::with_capacity(axis_1.values.len());
    for v1 in &axis_1.values {
        let row_base = base.with_override_noting(&axis_1.key, *v1, &mut warnings)?;
        let mut row = Vec::with_capacity(axis_2.values.len());
        for v2 in &axis_2.values {
            let cell = row_base
                .with_override_noting(&axis_2.key, *v2, &mut warnings)
                .and_then(|case| evaluate(&case, target));
            match cell {
                Ok(m) => row.push(m),
                Err(e) => {
                    warnings.push(format!("Evaluation failed at ({v1}, {v2}): {e}"));
                    row.push(Metric::NotApplicable);
                }
            }
        }
        matrix.push(row);
    }
    dedup_in_order(&mut warnings);

    let output = SensitivityGrid {
        target_metric: target,
        axis_1: axis_1.clone(),
        axis_2: axis_2.clone(),
        matrix,
        base_case: evaluate(base, target)?,
        base_case_position: (closest_index(&axis_1.values, base_1), closest_index(&axis_2.values, base_2)),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Grid",
        &serde_json::json!({
            "axis_1": axis_1.key,
            "axis_2": axis_2.key,
            "target_metric": target,
        }),
        warnings,
        elapsed,
        output,
    ))
}

pub fn sensitivity_grid_request(request: &GridRequest) -> UnderwritingResult<ComputationOutput<SensitivityGrid>> {
    let mut coercions = Vec::new();
    let base = normalize_with_warnings(&request.assumptions, &mut coercions);
    let mut out = sensitivity_grid(&base, &request.axis_1, &request.axis_2, request.target_metric)?;
    coercions.append(&mut out.warnings);
    out.warnings = coercions;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Schedule, project and read the target metric: the same path as the base case.
fn evaluate(case: &AssumptionSet, target: TargetMetric) -> UnderwritingResult<Metric> {
    let schedule = AmortizationSchedule::for_assumptions(case)?;
    let projection = project(case, &schedule)?;
    Ok(target.extract(&projection.result.metrics))
}

fn run_scenario(
    base: &AssumptionSet,
    p: &Perturbation,
    base_value: Decimal,
    direction: Direction,
    base_case: Metric,
    target: TargetMetric,
    warnings: &mut Vec<String>,
) -> UnderwritingResult<SensitivityScenario> {
    let case = base.with_override_noting(&p.key, p.apply(base_value, direction)?, warnings)?;
    let metric = evaluate(&case, target)?;
    Ok(SensitivityScenario {
        label: p.describe(direction),
        key: p.key.clone(),
        direction,
        assumption_value: case.value_of(&p.key)?,
        metric,
        delta: metric.delta_from(&base_case),
    })
}

fn tornado_bar(p: &Perturbation, up: &SensitivityScenario, down: &SensitivityScenario) -> TornadoBar {
    let (downside, upside) = match (up.metric.value(), down.metric.value()) {
        (Some(u), Some(d)) => (Metric::Value(u.min(d)), Metric::Value(u.max(d))),
        _ => (down.metric, up.metric),
    };
    TornadoBar {
        key: p.key.clone(),
        label: p.key.label(),
        downside,
        upside,
        spread: upside.delta_from(&downside),
    }
}

fn override_of(s: &SensitivityScenario) -> AppliedOverride {
    AppliedOverride { key: s.key.clone(), value: s.assumption_value }
}

fn combined(
    label: &str,
    base: &AssumptionSet,
    overrides: Vec<AppliedOverride>,
    base_case: Metric,
    target: TargetMetric,
    warnings: &mut Vec<String>,
) -> UnderwritingResult<CombinedScenario> {
    let mut case = base.clone();
    for o in &overrides {
        case = case.with_override_noting(&o.key, o.value, warnings)?;
    }
    let metric = evaluate(&case, target)?;
    Ok(CombinedScenario {
        label: label.to_string(),
        overrides,
        metric,
        delta: metric.delta_from(&base_case),
    })
}

/// Larger absolute value first; unavailable values sink to the end.
fn by_magnitude_desc(a: Metric, b: Metric) -> Ordering {
    match (a.value(), b.value()) {
        (Some(x), Some(y)) => y.abs().cmp(&x.abs()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The same axis value re-bounds once per row; keep the first report.
fn dedup_in_order(warnings: &mut Vec<String>) {
    let mut seen = HashSet::new();
    warnings.retain(|w| seen.insert(w.clone()));
}

fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::{ExpenseItem, OperatingExpenses};
    use rust_decimal_macros::dec;

    fn itemized_deal() -> AssumptionSet {
        let mut a = AssumptionSet::default();
        a.operating_expenses = OperatingExpenses::Itemized {
            items: vec![
                ExpenseItem { name: "Taxes".into(), annual_amount: dec!(420000) },
                ExpenseItem { name: "Payroll".into(), annual_amount: dec!(350000) },
                ExpenseItem { name: "Marketing".into(), annual_amount: dec!(30000) },
            ],
        };
        a
    }

    #[test]
    fn test_apply_absolute_and_relative() {
        let abs = Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.005));
        assert_eq!(abs.apply(dec!(0.065), Direction::Up).unwrap(), dec!(0.070));
        assert_eq!(abs.apply(dec!(0.065), Direction::Down).unwrap(), dec!(0.060));

        let rel = Perturbation::relative(AssumptionKey::PurchasePrice, dec!(-0.05));
        assert_eq!(rel.apply(dec!(18000000), Direction::Up).unwrap(), dec!(18900000));
        assert_eq!(rel.apply(dec!(18000000), Direction::Down).unwrap(), dec!(17100000));
    }

    #[test]
    fn test_overflowing_delta_rejected() {
        let p = Perturbation::relative(AssumptionKey::PurchasePrice, Decimal::MAX);
        assert!(p.apply(dec!(18000000), Direction::Up).is_err());
    }

    #[test]
    fn test_base_case_matches_projection() {
        let base = AssumptionSet::default();
        let out = run_sensitivity(&base, &standard_perturbations()).unwrap();
        let schedule = AmortizationSchedule::for_assumptions(&base).unwrap();
        let direct = project(&base, &schedule).unwrap();
        assert_eq!(out.result.base_case, direct.result.metrics.levered_irr);
    }

    #[test]
    fn test_two_scenarios_per_perturbation() {
        let out = run_sensitivity(&AssumptionSet::default(), &standard_perturbations()).unwrap();
        assert_eq!(out.result.scenarios.len(), 14);
        assert_eq!(out.result.tornado.len(), 7);
    }

    #[test]
    fn test_scenarios_ranked_by_absolute_delta() {
        let out = run_sensitivity(&AssumptionSet::default(), &standard_perturbations()).unwrap();
        let deltas: Vec<Decimal> = out
            .result
            .scenarios
            .iter()
            .filter_map(|s| s.delta.value())
            .map(|d| d.abs())
            .collect();
        for w in deltas.windows(2) {
            assert!(w[0] >= w[1], "{} before {}", w[0], w[1]);
        }
    }

    #[test]
    fn test_exit_cap_outranks_marketing() {
        let base = itemized_deal();
        let perturbations = vec![
            Perturbation::relative(AssumptionKey::ExpenseItem("Marketing".into()), dec!(0.01)),
            Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.005)),
        ];
        let out = run_sensitivity(&base, &perturbations).unwrap();
        assert_eq!(out.result.tornado[0].key, AssumptionKey::ExitCapRate);
        assert_eq!(out.result.scenarios[0].key, AssumptionKey::ExitCapRate);
    }

    #[test]
    fn test_higher_exit_cap_lowers_irr() {
        let perturbations = vec![Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.005))];
        let out = run_sensitivity(&AssumptionSet::default(), &perturbations).unwrap();
        let up = out
            .result
            .scenarios
            .iter()
            .find(|s| s.direction == Direction::Up)
            .unwrap();
        assert!(up.delta.value().unwrap() < Decimal::ZERO);
        assert_eq!(up.assumption_value, dec!(0.070));
    }

    #[test]
    fn test_scenarios_are_not_compounded() {
        let base = AssumptionSet::default();
        let perturbations = standard_perturbations();
        let out = run_sensitivity(&base, &perturbations).unwrap();
        for s in &out.result.scenarios {
            let p = perturbations.iter().find(|p| p.key == s.key).unwrap();
            let expected = p.apply(base.value_of(&s.key).unwrap(), s.direction).unwrap();
            assert_eq!(s.assumption_value, expected);
        }
    }

    #[test]
    fn test_combined_upside_and_downside() {
        let out = run_sensitivity(&AssumptionSet::default(), &standard_perturbations()).unwrap();
        let r = &out.result;
        let base = r.base_case.value().unwrap();
        assert_eq!(r.upside.label, "Upside");
        assert!(r.upside.metric.value().unwrap() > base);
        assert!(r.downside.metric.value().unwrap() < base);
        assert_eq!(r.upside.overrides.len(), 7);
    }

    #[test]
    fn test_tornado_bars_ordered_and_consistent() {
        let out = run_sensitivity(&AssumptionSet::default(), &standard_perturbations()).unwrap();
        for bar in &out.result.tornado {
            let (lo, hi) = (bar.downside.value().unwrap(), bar.upside.value().unwrap());
            assert!(lo <= hi);
            assert_eq!(bar.spread, Metric::Value(hi - lo));
        }
        let spreads: Vec<Decimal> = out.result.tornado.iter().filter_map(|b| b.spread.value()).collect();
        for w in spreads.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn test_inapplicable_key_skipped_with_warning() {
        let perturbations = vec![
            Perturbation::absolute(AssumptionKey::ExpenseItem("Marketing".into()), dec!(1000)),
            Perturbation::absolute(AssumptionKey::VacancyRate, dec!(0.02)),
        ];
        let out = run_sensitivity(&AssumptionSet::default(), &perturbations).unwrap();
        assert_eq!(out.result.tornado.len(), 1);
        assert!(out.warnings.iter().any(|w| w.contains("Skipped")));
    }

    #[test]
    fn test_zero_delta_rejected() {
        let perturbations = vec![Perturbation::absolute(AssumptionKey::Ltv, Decimal::ZERO)];
        assert!(run_sensitivity(&AssumptionSet::default(), &perturbations).is_err());
    }

    #[test]
    fn test_equity_multiple_target() {
        let out = run_sensitivity_for(
            &AssumptionSet::default(),
            &standard_perturbations(),
            TargetMetric::EquityMultiple,
        )
        .unwrap();
        assert!(out.result.base_case.value().unwrap() > Decimal::ONE);
        assert_eq!(out.result.target_metric, TargetMetric::EquityMultiple);
    }

    #[test]
    fn test_degenerate_deal_still_reports() {
        let mut base = AssumptionSet::default();
        base.purchase_price = dec!(999999999999);
        let out = run_sensitivity(&base, &standard_perturbations()).unwrap();
        assert_eq!(out.result.base_case, Metric::NotApplicable);
        assert_eq!(out.result.scenarios.len(), 14);
    }

    #[test]
    fn test_sweep_values() {
        let axis = GridAxis::sweep(AssumptionKey::ExitCapRate, dec!(0.055), dec!(0.075), dec!(0.005)).unwrap();
        assert_eq!(axis.values, vec![dec!(0.055), dec!(0.060), dec!(0.065), dec!(0.070), dec!(0.075)]);
        assert!(GridAxis::sweep(AssumptionKey::ExitCapRate, dec!(0.07), dec!(0.05), dec!(0.01)).is_err());
        assert!(GridAxis::sweep(AssumptionKey::ExitCapRate, dec!(0.05), dec!(0.07), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_grid_shape_and_base_cell() {
        let base = AssumptionSet::default();
        let caps = GridAxis::sweep(AssumptionKey::ExitCapRate, dec!(0.055), dec!(0.075), dec!(0.005)).unwrap();
        let prices = GridAxis {
            key: AssumptionKey::PurchasePrice,
            values: vec![dec!(17000000), dec!(18000000), dec!(19000000)],
        };
        let out = sensitivity_grid(&base, &caps, &prices, TargetMetric::LeveredIrr).unwrap();
        let g = &out.result;
        assert_eq!(g.matrix.len(), 5);
        assert!(g.matrix.iter().all(|row| row.len() == 3));
        assert_eq!(g.base_case_position, (2, 1));
        assert_eq!(g.matrix[2][1], g.base_case);
        // Cheaper entry, lower exit cap is the best corner
        let best = g.matrix[0][0].value().unwrap();
        let worst = g.matrix[4][2].value().unwrap();
        assert!(best > worst);
    }

    #[test]
    fn test_rebounded_scenario_is_reported() {
        // 6.5% exit cap moved down 10 points cannot stay a direct-cap exit
        let perturbations = vec![Perturbation::absolute(AssumptionKey::ExitCapRate, dec!(0.10))];
        let out = run_sensitivity(&AssumptionSet::default(), &perturbations).unwrap();
        let down = out
            .result
            .scenarios
            .iter()
            .find(|s| s.direction == Direction::Down)
            .unwrap();
        assert_eq!(down.assumption_value, Decimal::ZERO);
        assert!(out.warnings.iter().any(|w| w.contains("valuing by appreciation")));
    }

    #[test]
    fn test_grid_reports_each_clamped_value_once() {
        let caps = GridAxis::sweep(AssumptionKey::ExitCapRate, dec!(0.06), dec!(0.07), dec!(0.005)).unwrap();
        let ltvs = GridAxis {
            key: AssumptionKey::Ltv,
            values: vec![dec!(0.70), dec!(1.20)],
        };
        let out = sensitivity_grid(&AssumptionSet::default(), &caps, &ltvs, TargetMetric::LeveredIrr).unwrap();
        let clamped = out.warnings.iter().filter(|w| w.contains("outside [0, 1]")).count();
        assert_eq!(clamped, 1);
    }

    #[test]
    fn test_request_defaults_to_standard_set() {
        let request: SensitivityRequest = serde_json::from_str("{}").unwrap();
        let out = run_sensitivity_request(&request).unwrap();
        assert_eq!(out.result.tornado.len(), 7);
    }
}
