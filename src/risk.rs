//! Mean-Lp risk over sampled episode costs: `risk_p = (mean(c_i^p))^(1/p)`.
//!
//! The naive form overflows for large `p` or large costs, so `risk` is
//! computed rescaled by the sample maximum: every ratio is <= 1, so the power
//! can only underflow, never blow up. Supported range: any finite
//! non-negative costs and any finite `p >= 1`.

use serde::{Deserialize, Serialize};

use crate::error::RlError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskSummary {
    pub average_cost: f64,
    /// Mean-Lp statistic; equals `average_cost` when p = 1.
    pub risk: f64,
}

/// Aggregate sampled episode costs into `(average_cost, risk_p)`.
pub fn evaluate(costs: &[f64], p: f64) -> Result<RiskSummary, RlError> {
    if !(p >= 1.0) || !p.is_finite() {
        return Err(RlError::Configuration(format!(
            "risk order p must be >= 1 and finite, got {p}"
        )));
    }
    if costs.is_empty() {
        return Err(RlError::Configuration(
            "cannot evaluate risk on an empty cost sample".into(),
        ));
    }
    let n = costs.len() as f64;
    let mut sum = 0.0;
    let mut max = 0.0f64;
    for &c in costs {
        if !c.is_finite() || c < 0.0 {
            return Err(RlError::Computation(format!(
                "episode cost must be finite and non-negative, got {c}"
            )));
        }
        sum += c;
        max = max.max(c);
    }
    let average_cost = sum / n;

    let risk = if max == 0.0 {
        0.0
    } else {
        let mean_ratio_p = costs.iter().map(|&c| (c / max).powf(p)).sum::<f64>() / n;
        max * mean_ratio_p.powf(1.0 / p)
    };
    if !risk.is_finite() {
        return Err(RlError::Computation(format!(
            "mean-L{p} risk turned non-finite for sample max {max}"
        )));
    }
    Ok(RiskSummary { average_cost, risk })
}

/// Guarded `cost^p` for the learner's pseudo-rewards; surfaces overflow as an
/// error instead of a silent infinity.
pub fn cost_power(cost: f64, p: f64) -> Result<f64, RlError> {
    let v = cost.powf(p);
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RlError::Computation(format!(
            "cost^p overflowed (cost = {cost}, p = {p})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_sample_has_risk_equal_to_mean_for_every_p() {
        let costs = vec![4.0; 1000];
        for p in [1.0, 2.0, 4.0, 8.0, 32.0] {
            let s = evaluate(&costs, p).unwrap();
            assert!((s.average_cost - 4.0).abs() < 1e-12);
            assert!((s.risk - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn risk_is_nondecreasing_in_p() {
        let costs = vec![1.0, 1.0, 2.0, 3.0, 10.0, 4.0, 1.0];
        let mut last = 0.0;
        for p in [1.0, 2.0, 4.0, 8.0] {
            let s = evaluate(&costs, p).unwrap();
            assert!(s.risk >= last - 1e-12, "risk decreased at p = {p}");
            last = s.risk;
        }
    }

    #[test]
    fn p_one_degenerates_to_the_mean() {
        let costs = vec![2.0, 4.0, 6.0];
        let s = evaluate(&costs, 1.0).unwrap();
        assert!((s.risk - s.average_cost).abs() < 1e-12);
        assert!((s.average_cost - 4.0).abs() < 1e-12);
    }

    #[test]
    fn large_p_and_large_costs_stay_finite() {
        // 1000^500 overflows f64; the rescaled form must not.
        let costs = vec![1000.0, 900.0, 10.0];
        let s = evaluate(&costs, 500.0).unwrap();
        assert!(s.risk.is_finite());
        assert!(s.risk <= 1000.0 + 1e-9);
        assert!(s.risk >= 900.0);
    }

    #[test]
    fn p_below_one_is_a_configuration_error() {
        assert!(matches!(
            evaluate(&[1.0, 2.0], 0.5),
            Err(RlError::Configuration(_))
        ));
        assert!(matches!(
            evaluate(&[1.0, 2.0], f64::NAN),
            Err(RlError::Configuration(_))
        ));
    }

    #[test]
    fn empty_or_negative_samples_are_rejected() {
        assert!(matches!(evaluate(&[], 2.0), Err(RlError::Configuration(_))));
        assert!(matches!(
            evaluate(&[1.0, -0.5], 2.0),
            Err(RlError::Computation(_))
        ));
    }

    #[test]
    fn cost_power_surfaces_overflow() {
        assert!(cost_power(10.0, 3.0).is_ok());
        assert!(matches!(
            cost_power(1000.0, 500.0),
            Err(RlError::Computation(_))
        ));
    }
}
