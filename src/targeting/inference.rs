//! Asymptotic inference from an influence curve.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{Result, TmleError};
use crate::numeric::{mean, variance};

/// Normal quantile for a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Alternative hypothesis for the p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tail {
    #[default]
    Both,
    Left,
    Right,
}

impl FromStr for Tail {
    type Err = TmleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "both" => Ok(Self::Both),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(TmleError::config(format!(
                "invalid tail '{other}', expected one of: both, left, right"
            ))),
        }
    }
}

impl fmt::Display for Tail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Both => "both",
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// `sqrt(var(ic) / n)` with the unbiased variance.
pub fn standard_error(influence_curve: &[f64]) -> f64 {
    (variance(influence_curve) / influence_curve.len() as f64).sqrt()
}

/// P-value of `estimate / se` under a standard normal null.
///
/// A zero or non-finite standard error has no p-value; it is a `Numerical`
/// error rather than NaN.
pub fn pvalue(estimate: f64, se: f64, tail: Tail) -> Result<f64> {
    if !(se.is_finite() && se > 0.0) {
        return Err(TmleError::numerical(format!(
            "standard error must be positive and finite, got {se}"
        )));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| TmleError::numerical(e.to_string()))?;
    let lower = normal.cdf(estimate / se);
    let upper = 1.0 - lower;
    Ok(match tail {
        Tail::Both => (2.0 * lower.min(upper)).min(1.0),
        Tail::Left => lower,
        Tail::Right => upper,
    })
}

/// Same as [`pvalue`] but with the tail given by name.
pub fn pvalue_str(estimate: f64, se: f64, tail: &str) -> Result<f64> {
    pvalue(estimate, se, tail.parse()?)
}

/// 95% normal-approximation interval.
pub fn confidence_interval(estimate: f64, se: f64) -> (f64, f64) {
    (estimate - Z_95 * se, estimate + Z_95 * se)
}

/// Summary of one estimate and its influence curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub pvalue: f64,
    pub confint: (f64, f64),
    pub estimate: f64,
    pub stderror: f64,
    pub initial_estimate: f64,
    pub mean_influence_curve: f64,
}

/// Build the report for `(influence_curve, estimate, initial_estimate)`.
pub fn query_report(
    influence_curve: &[f64],
    estimate: f64,
    initial_estimate: f64,
    tail: Tail,
) -> Result<QueryReport> {
    if influence_curve.len() < 2 {
        return Err(TmleError::numerical(
            "at least two observations are needed for a standard error",
        ));
    }
    let stderror = standard_error(influence_curve);
    Ok(QueryReport {
        pvalue: pvalue(estimate, stderror, tail)?,
        confint: confidence_interval(estimate, stderror),
        estimate,
        stderror,
        initial_estimate,
        mean_influence_curve: mean(influence_curve),
    })
}
