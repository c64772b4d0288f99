use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::error::UnderwritingError;
use crate::types::{Money, Rate};
use crate::UnderwritingResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const RATE_TOLERANCE: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;
const RATE_FLOOR: Decimal = dec!(-0.99);
const RATE_CEILING: Decimal = dec!(10);

/// Candidate rates scanned for a sign change when Newton-Raphson fails.
const BRACKET_GRID: [Decimal; 14] = [
    dec!(-0.99),
    dec!(-0.9),
    dec!(-0.75),
    dec!(-0.5),
    dec!(-0.25),
    dec!(-0.1),
    dec!(0),
    dec!(0.1),
    dec!(0.25),
    dec!(0.5),
    dec!(1),
    dec!(2),
    dec!(5),
    dec!(10),
];

/// Net Present Value of a series of annual cash flows (index 0 undiscounted).
pub fn npv(rate: Rate, cash_flows: &[Money]) -> UnderwritingResult<Money> {
    if rate <= dec!(-1) {
        return Err(UnderwritingError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    npv_and_derivative(cash_flows, rate)
        .map(|(value, _)| value)
        .ok_or_else(|| UnderwritingError::FinancialImpossibility(format!(
            "NPV at rate {rate} exceeds the representable range"
        )))
}

/// Internal Rate of Return.
///
/// Newton-Raphson from `guess`, falling back to bisection over a bracket
/// scanned between -99% and 1000%. Both loops are hard-capped, so the call
/// always terminates; a stream without a sign change or without a root in
/// the bracket is reported as an error rather than a wrong number.
pub fn irr(cash_flows: &[Money], guess: Rate) -> UnderwritingResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(UnderwritingError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let has_outflow = cash_flows.iter().any(|cf| cf.is_sign_negative() && !cf.is_zero());
    let has_inflow = cash_flows.iter().any(|cf| cf.is_sign_positive() && !cf.is_zero());
    if !has_outflow || !has_inflow {
        return Err(UnderwritingError::FinancialImpossibility(
            "Cash flows never change sign; IRR is undefined".into(),
        ));
    }

    if let Some(rate) = newton_raphson(cash_flows, guess) {
        return Ok(rate);
    }

    debug!(flows = cash_flows.len(), "IRR Newton-Raphson failed, trying bisection");
    bisection(cash_flows)
}

fn newton_raphson(cash_flows: &[Money], guess: Rate) -> Option<Rate> {
    let mut rate = guess.clamp(RATE_FLOOR, RATE_CEILING);

    for _ in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_and_derivative(cash_flows, rate)?;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }
        if dnpv.is_zero() {
            return None;
        }

        let step = npv_val.checked_div(dnpv)?;
        let next = (rate - step).clamp(RATE_FLOOR, RATE_CEILING);

        if (next - rate).abs() < RATE_TOLERANCE {
            // Pinned against a guard rail is not a root
            if next == RATE_FLOOR || next == RATE_CEILING {
                return None;
            }
            return Some(next);
        }
        rate = next;
    }

    None
}

fn bisection(cash_flows: &[Money]) -> UnderwritingResult<Rate> {
    let evaluated: Vec<(Rate, Decimal)> = BRACKET_GRID
        .iter()
        .filter_map(|r| npv_and_derivative(cash_flows, *r).map(|(v, _)| (*r, v)))
        .collect();

    let bracket = evaluated
        .windows(2)
        .find(|w| w[0].1.is_zero() || w[0].1.is_sign_negative() != w[1].1.is_sign_negative());

    let Some(pair) = bracket else {
        return Err(UnderwritingError::ConvergenceFailure {
            function: "IRR".into(),
            iterations: MAX_IRR_ITERATIONS,
            last_delta: evaluated.last().map(|(_, v)| *v).unwrap_or(Decimal::MAX),
        });
    };

    let (mut lo, mut f_lo) = pair[0];
    let (mut hi, _) = pair[1];
    if f_lo.is_zero() {
        return Ok(lo);
    }

    let mut last_delta = f_lo;
    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let Some((f_mid, _)) = npv_and_derivative(cash_flows, mid) else {
            break;
        };
        last_delta = f_mid;

        if f_mid.abs() < CONVERGENCE_THRESHOLD || (hi - lo) < RATE_TOLERANCE {
            return Ok(mid);
        }

        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(UnderwritingError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS + MAX_BISECTION_ITERATIONS,
        last_delta,
    })
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
///
/// Every operation is checked; `None` means the value left Decimal range.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }

    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        npv = npv.checked_add(cf.checked_mul(discount)?)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let term = Decimal::from(t as i64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_div(one_plus_r)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_div(one_plus_r)?;
    }

    Some((npv, dnpv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_irr_simple_case() {
        let irr = irr(&[dec!(-100), dec!(110)], dec!(0.10)).unwrap();
        assert!((irr - dec!(0.10)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_irr_even_cash_flows() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // ~9.7%
        assert!((result - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_negative_return() {
        // Lose half the money over two years => about -29.3%
        let cfs = vec![dec!(-1000), dec!(0), dec!(500)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        assert!((result - dec!(-0.2929)).abs() < dec!(0.001), "got {result}");
    }

    #[test]
    fn test_irr_bad_guess_still_converges() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(300), dec!(300), dec!(300), dec!(300)];
        let result = irr(&cfs, dec!(9.5)).unwrap();
        assert!(result > dec!(0.14) && result < dec!(0.17), "got {result}");
    }

    #[test]
    fn test_irr_no_sign_change() {
        let cfs = vec![dec!(-1000), dec!(-10), dec!(-10)];
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(UnderwritingError::FinancialImpossibility(_))
        ));
    }

    #[test]
    fn test_irr_insufficient_flows() {
        assert!(irr(&[dec!(-100)], dec!(0.10)).is_err());
    }

    #[test]
    fn test_irr_huge_values_terminate() {
        let cfs = vec![
            dec!(-999999999999),
            dec!(-50000000000),
            dec!(-50000000000),
            dec!(1),
        ];
        // Root lies below -99%; must return an error, not hang or panic
        assert!(irr(&cfs, dec!(0.10)).is_err());
    }
}
