use clap::Args;
use serde_json::Value;

use underwrite_core::amortization::AmortizationSchedule;
use underwrite_core::analysis::{self, UnderwritingRequest};
use underwrite_core::assumptions::{normalize_with_warnings, reset_to_defaults};
use underwrite_core::projection;

use super::stress::{parse_perturbation, MetricArg};
use crate::input::AssumptionArgs;

/// Arguments for a full underwriting run
#[derive(Args)]
pub struct UnderwriteArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    /// Skip the sensitivity analysis
    #[arg(long)]
    pub no_sensitivity: bool,

    /// Metric the sensitivity analysis measures
    #[arg(long, value_enum, default_value = "levered-irr")]
    pub metric: MetricArg,

    /// Perturbation as key:delta or key:delta% (repeatable; standard set when omitted)
    #[arg(long = "perturb", allow_hyphen_values = true)]
    pub perturbations: Vec<String>,
}

/// Arguments for the cash-flow projection
#[derive(Args)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,
}

/// Arguments for printing defaults
#[derive(Args)]
pub struct DefaultsArgs {
    /// Include loan amount, equity and other derived figures
    #[arg(long)]
    pub derived: bool,
}

pub fn run_underwrite(args: UnderwriteArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = args.assumptions.resolve()?;
    let perturbations = if args.perturbations.is_empty() {
        None
    } else {
        Some(
            args.perturbations
                .iter()
                .map(|s| parse_perturbation(s))
                .collect::<Result<Vec<_>, _>>()?,
        )
    };

    let request = UnderwritingRequest {
        assumptions: raw,
        perturbations,
        sensitivity_metric: args.metric.into(),
        include_sensitivity: !args.no_sensitivity,
    };
    let result = analysis::underwrite(&request)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_project(args: ProjectArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = args.assumptions.resolve()?;
    let mut warnings = Vec::new();
    let assumptions = normalize_with_warnings(&raw, &mut warnings);
    let schedule = AmortizationSchedule::for_assumptions(&assumptions)?;

    let mut result = projection::project(&assumptions, &schedule)?;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    Ok(serde_json::to_value(result)?)
}

pub fn run_defaults(args: DefaultsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let defaults = reset_to_defaults();
    if args.derived {
        Ok(serde_json::json!({
            "result": {
                "assumptions": defaults,
                "derived": defaults.derived(),
            }
        }))
    } else {
        Ok(serde_json::json!({ "result": defaults }))
    }
}
