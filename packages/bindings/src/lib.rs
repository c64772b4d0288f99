use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Serialize;

use underwrite_core::amortization::{self, AmortizationSchedule, LoanTerms};
use underwrite_core::analysis::{self, UnderwritingRequest};
use underwrite_core::assumptions::{self, AssumptionSet, DerivedMetrics, RawAssumptions};
use underwrite_core::projection;
use underwrite_core::sensitivity::{self, GridRequest, SensitivityRequest};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[derive(Serialize)]
struct NormalizedAssumptions {
    assumptions: AssumptionSet,
    derived: DerivedMetrics,
    warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Underwriting
// ---------------------------------------------------------------------------

/// Results, projections and sensitivity for the modal in one call.
#[napi]
pub fn underwrite(input_json: String) -> NapiResult<String> {
    let request: UnderwritingRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = analysis::underwrite(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn normalize_assumptions(input_json: String) -> NapiResult<String> {
    let raw: RawAssumptions = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut warnings = Vec::new();
    let normalized = assumptions::normalize_with_warnings(&raw, &mut warnings);
    let output = NormalizedAssumptions {
        derived: normalized.derived(),
        assumptions: normalized,
        warnings,
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn default_assumptions() -> NapiResult<String> {
    serde_json::to_string(&assumptions::reset_to_defaults()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Debt & projection
// ---------------------------------------------------------------------------

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let terms: LoanTerms = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = amortization::amortize(&terms).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn project_cash_flows(input_json: String) -> NapiResult<String> {
    let raw: RawAssumptions = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let mut warnings = Vec::new();
    let normalized = assumptions::normalize_with_warnings(&raw, &mut warnings);
    let schedule = AmortizationSchedule::for_assumptions(&normalized).map_err(to_napi_error)?;
    let mut output = projection::project(&normalized, &schedule).map_err(to_napi_error)?;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Sensitivity
// ---------------------------------------------------------------------------

#[napi]
pub fn run_sensitivity(input_json: String) -> NapiResult<String> {
    let request: SensitivityRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sensitivity::run_sensitivity_request(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn sensitivity_grid(input_json: String) -> NapiResult<String> {
    let request: GridRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sensitivity::sensitivity_grid_request(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
