use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g., 1.85x equity multiple)
pub type Multiple = Decimal;

/// A derived figure that may be undefined for the given inputs.
///
/// Serialises as a decimal string or `null`; displays as `--` when
/// unavailable so a consumer never has to render NaN or Infinity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Value(Decimal),
    #[default]
    NotApplicable,
}

impl Metric {
    /// `numerator / denominator`, or `NotApplicable` for a zero denominator.
    pub fn ratio(numerator: Decimal, denominator: Decimal) -> Metric {
        if denominator.is_zero() {
            return Metric::NotApplicable;
        }
        numerator
            .checked_div(denominator)
            .map(Metric::Value)
            .unwrap_or(Metric::NotApplicable)
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::NotApplicable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Value(_))
    }

    pub fn unwrap_or(&self, fallback: Decimal) -> Decimal {
        self.value().unwrap_or(fallback)
    }

    /// Difference from another metric; unavailable if either side is.
    pub fn delta_from(&self, base: &Metric) -> Metric {
        match (self, base) {
            (Metric::Value(a), Metric::Value(b)) => Metric::Value(*a - *b),
            _ => Metric::NotApplicable,
        }
    }
}

impl From<Option<Decimal>> for Metric {
    fn from(v: Option<Decimal>) -> Self {
        v.map(Metric::Value).unwrap_or(Metric::NotApplicable)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{}", v.round_dp(6).normalize()),
            Metric::NotApplicable => write!(f, "--"),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
