//! Truncation threshold for the treatment density.

use serde::{Deserialize, Serialize};

use crate::config::defaults::SAMPLE_ADAPTIVE_CONSTANT;
use crate::error::{Result, TmleError};

/// How the user-supplied lower bound is turned into the effective threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Use `ps_lowerbound` unchanged.
    Fixed,
    /// `max(ps_lowerbound, 5 / (sqrt(n) ln(n / 5)))`, for `n > 5`.
    #[default]
    SampleAdaptive,
}

/// Effective threshold for `n` observations. Must land in (0, 1).
pub fn resolve_threshold(ps_lowerbound: f64, rule: ThresholdRule, n: usize) -> Result<f64> {
    let threshold = match rule {
        ThresholdRule::Fixed => ps_lowerbound,
        ThresholdRule::SampleAdaptive if n > 5 => {
            let n = n as f64;
            let c = SAMPLE_ADAPTIVE_CONSTANT;
            ps_lowerbound.max(c / (n.sqrt() * (n / c).ln()))
        }
        ThresholdRule::SampleAdaptive => ps_lowerbound,
    };
    if threshold.is_finite() && threshold > 0.0 && threshold < 1.0 {
        Ok(threshold)
    } else {
        Err(TmleError::config(format!(
            "truncation threshold {threshold} is outside (0, 1)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_passes_through() {
        assert_eq!(resolve_threshold(1e-8, ThresholdRule::Fixed, 10_000).unwrap(), 1e-8);
    }

    #[test]
    fn adaptive_floor_shrinks_with_n() {
        let small = resolve_threshold(1e-8, ThresholdRule::SampleAdaptive, 100).unwrap();
        let large = resolve_threshold(1e-8, ThresholdRule::SampleAdaptive, 100_000).unwrap();
        assert!(small > large);
        let n = 1000.0_f64;
        let want = 5.0 / (n.sqrt() * (n / 5.0).ln());
        assert!((resolve_threshold(1e-8, ThresholdRule::SampleAdaptive, 1000).unwrap() - want).abs() < 1e-15);
    }

    #[test]
    fn user_bound_wins_when_larger() {
        assert_eq!(resolve_threshold(0.2, ThresholdRule::SampleAdaptive, 100_000).unwrap(), 0.2);
        assert_eq!(resolve_threshold(0.01, ThresholdRule::SampleAdaptive, 3).unwrap(), 0.01);
    }

    #[test]
    fn out_of_range_is_rejected() {
        for bad in [0.0, -0.1, 1.0, f64::NAN] {
            assert!(matches!(
                resolve_threshold(bad, ThresholdRule::Fixed, 100),
                Err(TmleError::Configuration(_))
            ));
        }
        // 5 / (sqrt(6) ln(1.2)) > 1
        assert!(resolve_threshold(1e-8, ThresholdRule::SampleAdaptive, 6).is_err());
    }
}
