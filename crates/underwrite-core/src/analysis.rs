use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::amortization::{AmortizationSchedule, AnnualDebtService};
use crate::assumptions::{normalize_with_warnings, AssumptionSet, DerivedMetrics, RawAssumptions};
use crate::projection::{project, ProjectionOutput, ProjectionYear, ReturnMetrics};
use crate::types::{with_metadata, ComputationOutput};
use crate::UnderwritingResult;

#[cfg(feature = "sensitivity")]
use crate::sensitivity::{run_sensitivity_for, standard_perturbations, Perturbation, SensitivityOutput, TargetMetric};

/// Everything the underwriting modal submits in one go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderwritingRequest {
    #[serde(default)]
    pub assumptions: RawAssumptions,
    /// Standard perturbation set when omitted
    #[cfg(feature = "sensitivity")]
    #[serde(default)]
    pub perturbations: Option<Vec<Perturbation>>,
    #[cfg(feature = "sensitivity")]
    #[serde(default)]
    pub sensitivity_metric: TargetMetric,
    #[serde(default = "default_true")]
    pub include_sensitivity: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UnderwritingRequest {
    fn default() -> Self {
        UnderwritingRequest {
            assumptions: RawAssumptions::default(),
            #[cfg(feature = "sensitivity")]
            perturbations: None,
            #[cfg(feature = "sensitivity")]
            sensitivity_metric: TargetMetric::default(),
            include_sensitivity: true,
        }
    }
}

impl From<RawAssumptions> for UnderwritingRequest {
    fn from(assumptions: RawAssumptions) -> Self {
        UnderwritingRequest {
            assumptions,
            ..Default::default()
        }
    }
}

/// Results, projections and sensitivity for one set of assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingReport {
    pub assumptions: AssumptionSet,
    pub derived: DerivedMetrics,
    /// Debt service rolled up by loan year
    pub debt_schedule: Vec<AnnualDebtService>,
    pub projection: Vec<ProjectionYear>,
    pub metrics: ReturnMetrics,
    #[cfg(feature = "sensitivity")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<SensitivityOutput>,
}

/// Normalize, schedule, project and (optionally) stress one deal.
///
/// Input coercions, projection warnings and sensitivity warnings are all
/// collected into the returned envelope.
pub fn underwrite(request: &UnderwritingRequest) -> UnderwritingResult<ComputationOutput<UnderwritingReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let assumptions = normalize_with_warnings(&request.assumptions, &mut warnings);
    let schedule = AmortizationSchedule::for_assumptions(&assumptions)?;
    let projected = project(&assumptions, &schedule)?;
    warnings.extend(projected.warnings);
    let ProjectionOutput { years, metrics } = projected.result;

    #[cfg(feature = "sensitivity")]
    let sensitivity = if request.include_sensitivity {
        let perturbations = request
            .perturbations
            .clone()
            .unwrap_or_else(standard_perturbations);
        let out = run_sensitivity_for(&assumptions, &perturbations, request.sensitivity_metric)?;
        warnings.extend(out.warnings);
        Some(out.result)
    } else {
        None
    };

    debug!(
        property = %assumptions.property_name,
        warnings = warnings.len(),
        "underwriting complete"
    );

    let report = UnderwritingReport {
        derived: assumptions.derived(),
        debt_schedule: schedule.annual_summaries(),
        projection: years,
        metrics,
        #[cfg(feature = "sensitivity")]
        sensitivity,
        assumptions,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Real Estate Underwriting (Normalize, Amortize, Project, Stress)",
        &request.assumptions,
        warnings,
        elapsed,
        report,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::NumericInput;
    use crate::types::Metric;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_request_full_report() {
        let out = underwrite(&UnderwritingRequest::default()).unwrap();
        let r = &out.result;
        assert_eq!(r.projection.len(), 10);
        assert_eq!(r.debt_schedule.len(), 10);
        assert_eq!(r.derived.loan_amount, dec!(12600000));
        assert!(r.metrics.levered_irr.is_available());
        #[cfg(feature = "sensitivity")]
        assert!(r.sensitivity.is_some());
    }

    #[test]
    fn test_sensitivity_can_be_skipped() {
        let request = UnderwritingRequest {
            include_sensitivity: false,
            ..Default::default()
        };
        let out = underwrite(&request).unwrap();
        #[cfg(feature = "sensitivity")]
        assert!(out.result.sensitivity.is_none());
        assert!(out.result.metrics.equity_multiple.is_available());
    }

    #[test]
    fn test_coercion_warnings_surface() {
        let raw = RawAssumptions {
            units: Some("one hundred".into()),
            ..Default::default()
        };
        let out = underwrite(&raw.into()).unwrap();
        assert!(out.warnings.iter().any(|w| w.starts_with("units")));
        assert_eq!(out.result.derived.price_per_unit, Metric::NotApplicable);
    }

    #[test]
    fn test_high_leverage_warned() {
        let raw = RawAssumptions {
            ltv: Some(NumericInput::Number(dec!(0.85))),
            ..Default::default()
        };
        let out = underwrite(&raw.into()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("LTV")));
        assert!(out.result.derived.equity_invested > Decimal::ZERO);
    }

    #[test]
    fn test_request_from_json() {
        let request: UnderwritingRequest = serde_json::from_value(serde_json::json!({
            "assumptions": { "purchase_price": "$20,000,000", "units": 160 },
            "include_sensitivity": false
        }))
        .unwrap();
        let out = underwrite(&request).unwrap();
        assert_eq!(out.result.assumptions.purchase_price, dec!(20000000));
        assert_eq!(out.result.assumptions.units, 160);
    }
}
