use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use underwrite_core::assumptions::{normalize_with_warnings, AssumptionKey};
use underwrite_core::sensitivity::{
    self, standard_perturbations, GridAxis, Perturbation, TargetMetric,
};

use crate::input::AssumptionArgs;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    LeveredIrr,
    UnleveredIrr,
    EquityMultiple,
}

impl From<MetricArg> for TargetMetric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::LeveredIrr => TargetMetric::LeveredIrr,
            MetricArg::UnleveredIrr => TargetMetric::UnleveredIrr,
            MetricArg::EquityMultiple => TargetMetric::EquityMultiple,
        }
    }
}

/// Arguments for tornado analysis
#[derive(Args)]
pub struct SensitivityArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    /// Perturbation as key:delta or key:delta% (repeatable; standard set when omitted),
    /// e.g. "exit_cap_rate:0.005" or "purchase_price:5%"
    #[arg(long = "perturb", allow_hyphen_values = true)]
    pub perturbations: Vec<String>,

    /// Metric to measure
    #[arg(long, value_enum, default_value = "levered-irr")]
    pub metric: MetricArg,
}

/// Arguments for a two-way grid
#[derive(Args)]
pub struct GridArgs {
    #[command(flatten)]
    pub assumptions: AssumptionArgs,

    /// Row axis in format key:min:max:step (e.g. "exit_cap_rate:0.055:0.075:0.005")
    #[arg(long)]
    pub axis1: String,

    /// Column axis in format key:min:max:step
    #[arg(long)]
    pub axis2: String,

    /// Metric to measure
    #[arg(long, value_enum, default_value = "levered-irr")]
    pub metric: MetricArg,
}

/// `key:delta` is an absolute change, `key:delta%` a relative one.
pub fn parse_perturbation(text: &str) -> Result<Perturbation, Box<dyn std::error::Error>> {
    let (key, delta) = text
        .rsplit_once(':')
        .ok_or_else(|| format!("Perturbation must be key:delta, got '{}'", text))?;
    let key: AssumptionKey = key.parse()?;
    let delta = delta.trim();

    if let Some(pct) = delta.strip_suffix('%') {
        let fraction = pct.trim().parse::<Decimal>()? / dec!(100);
        Ok(Perturbation::relative(key, fraction))
    } else {
        Ok(Perturbation::absolute(key, delta.parse()?))
    }
}

fn parse_axis(text: &str) -> Result<GridAxis, Box<dyn std::error::Error>> {
    // Keys may contain ':' (expense_item:Name), so split from the right
    let parts: Vec<&str> = text.rsplitn(4, ':').collect();
    if parts.len() != 4 {
        return Err(format!("Grid axis must be key:min:max:step, got '{}'", text).into());
    }
    let key: AssumptionKey = parts[3].parse()?;
    Ok(GridAxis::sweep(
        key,
        parts[2].trim().parse()?,
        parts[1].trim().parse()?,
        parts[0].trim().parse()?,
    )?)
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = args.assumptions.resolve()?;
    let mut warnings = Vec::new();
    let base = normalize_with_warnings(&raw, &mut warnings);

    let perturbations = if args.perturbations.is_empty() {
        standard_perturbations()
    } else {
        args.perturbations
            .iter()
            .map(|s| parse_perturbation(s))
            .collect::<Result<Vec<_>, _>>()?
    };

    let mut result = sensitivity::run_sensitivity_for(&base, &perturbations, args.metric.into())?;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    Ok(serde_json::to_value(result)?)
}

pub fn run_grid(args: GridArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let axis_1 = parse_axis(&args.axis1)?;
    let axis_2 = parse_axis(&args.axis2)?;

    let raw = args.assumptions.resolve()?;
    let mut warnings = Vec::new();
    let base = normalize_with_warnings(&raw, &mut warnings);

    let mut result = sensitivity::sensitivity_grid(&base, &axis_1, &axis_2, args.metric.into())?;
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    Ok(serde_json::to_value(result)?)
}
