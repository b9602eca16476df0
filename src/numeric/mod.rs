//! Numeric utilities: logit/expit transforms, truncation and elementwise
//! division over realized or deferred values.

pub mod graph;

pub use graph::{Array, Node, Values};

use crate::error::{Result, TmleError};

/// `log(p / (1 - p))`. Finite for `p` strictly inside (0, 1).
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// `1 / (1 + exp(-x))`.
pub fn expit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One-sided truncation from below: values under `threshold` are lifted to
/// it, everything else passes through unchanged. NaN is left as is so the
/// division downstream can reject it.
pub fn plateau(likelihood: &Values, threshold: f64) -> Values {
    likelihood.map("plateau", move |x| if x < threshold { threshold } else { x })
}

/// Pairwise `x / y`.
///
/// Divisors come out of [`plateau`], so a zero or non-finite one means the
/// density model produced something unusable.
pub fn elemwise_divide(x: &Values, y: &Values) -> Result<Values> {
    x.try_zip_with(y, "elemwise_divide", |num, den| {
        if den == 0.0 || !den.is_finite() {
            Err(TmleError::numerical(format!(
                "invalid divisor {den} in elementwise division"
            )))
        } else {
            Ok(num / den)
        }
    })
}

impl Values {
    pub fn logit(&self) -> Self {
        self.map("logit", logit)
    }

    pub fn expit(&self) -> Self {
        self.map("expit", expit)
    }
}

/// Arithmetic mean. Empty input yields NaN.
pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Unbiased sample variance (n - 1 denominator).
pub fn variance(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expit_inverts_logit() {
        for &p in &[1e-6, 0.01, 0.25, 0.5, 0.73, 0.999_999] {
            let back = expit(logit(p));
            assert!((back - p).abs() < 1e-12, "p={p}, got {back}");
        }
    }

    #[test]
    fn logit_of_half_is_zero() {
        assert_eq!(logit(0.5), 0.0);
        assert_eq!(expit(0.0), 0.5);
    }

    #[test]
    fn plateau_lifts_only_small_values() {
        let t = 0.05;
        let x = Values::from(vec![0.0, 0.01, 0.05, 0.2, 1.0]);
        let out = plateau(&x, t).to_vec().unwrap();
        assert_eq!(out, vec![0.05, 0.05, 0.05, 0.2, 1.0]);
        assert!(out.iter().all(|&v| v >= t));
    }

    #[test]
    fn plateau_works_on_lazy_values() {
        let x = Values::lazy("density", || Ok(Array::from(vec![1e-12, 0.5])));
        let out = plateau(&x, 1e-8);
        assert!(out.is_lazy());
        assert_eq!(out.to_vec().unwrap(), vec![1e-8, 0.5]);
    }

    #[test]
    fn divide_rejects_zero_divisor() {
        let x = Values::from(vec![1.0, 1.0]);
        let y = Values::from(vec![0.5, 0.0]);
        assert!(matches!(elemwise_divide(&x, &y), Err(TmleError::Numerical(_))));
    }

    #[test]
    fn divide_is_pairwise() {
        let x = Values::from(vec![1.0, -1.0, 0.0]);
        let y = Values::from(vec![0.5, 0.25, 0.1]);
        assert_eq!(elemwise_divide(&x, &y).unwrap().to_vec().unwrap(), vec![2.0, -4.0, 0.0]);
    }

    #[test]
    fn variance_uses_corrected_denominator() {
        let v = variance(&[1.0, 2.0, 3.0, 4.0]);
        assert!((v - 5.0 / 3.0).abs() < 1e-12);
        assert!(variance(&[1.0]).is_nan());
    }
}
