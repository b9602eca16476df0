//! Generalized linear models fit by iteratively reweighted least squares.
//!
//! The loss is a strategy object passed per fit call. The fluctuation
//! submodel relies on this: it fits with [`QuasiBernoulli`], which accepts any
//! target in [0, 1], while ordinary logistic outcome models keep the strict
//! 0/1 validation of [`Bernoulli`]. Nothing global is relaxed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::linalg::solve_spd;
use crate::config::defaults;
use crate::data::Matrix;
use crate::error::{Result, TmleError};
use crate::numeric::{expit, logit};

/// Probabilities are kept this far from 0 and 1 inside deviance and
/// variance computations.
const MU_EPS: f64 = 1e-12;

/// Maximum step-halvings per IRLS iteration.
const MAX_HALVINGS: usize = 30;

/// Name of the column prepended by learners that fit an intercept.
pub const INTERCEPT: &str = "(Intercept)";

// ============================================================================
// Links and losses
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    Identity,
    Logit,
}

impl Link {
    pub fn inverse(self, eta: f64) -> f64 {
        match self {
            Self::Identity => eta,
            Self::Logit => expit(eta),
        }
    }

    pub fn apply(self, mu: f64) -> f64 {
        match self {
            Self::Identity => mu,
            Self::Logit => logit(mu),
        }
    }

    /// d mu / d eta
    pub fn mu_eta(self, eta: f64) -> f64 {
        match self {
            Self::Identity => 1.0,
            Self::Logit => {
                let mu = expit(eta);
                mu * (1.0 - mu)
            }
        }
    }
}

/// Loss-function strategy for one GLM fit.
pub trait Loss: fmt::Debug {
    fn name(&self) -> &'static str;
    fn link(&self) -> Link;
    /// Reject targets this loss cannot take.
    fn validate(&self, y: &[f64]) -> Result<()>;
    fn variance(&self, mu: f64) -> f64;
    /// Unit deviance contribution of one observation.
    fn deviance_residual(&self, y: f64, mu: f64) -> f64;
}

/// Squared error with identity link.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

/// Binomial deviance with logit link; labels must be exactly 0 or 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bernoulli;

/// Binomial deviance with logit link for any target in [0, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct QuasiBernoulli;

impl Loss for Gaussian {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn link(&self) -> Link {
        Link::Identity
    }

    fn validate(&self, y: &[f64]) -> Result<()> {
        match y.iter().find(|v| !v.is_finite()) {
            Some(v) => Err(TmleError::config(format!("non-finite target {v}"))),
            None => Ok(()),
        }
    }

    fn variance(&self, _mu: f64) -> f64 {
        1.0
    }

    fn deviance_residual(&self, y: f64, mu: f64) -> f64 {
        (y - mu).powi(2)
    }
}

fn binomial_deviance(y: f64, mu: f64) -> f64 {
    let mu = mu.clamp(MU_EPS, 1.0 - MU_EPS);
    // 0 * log(0) = 0
    let a = if y > 0.0 { y * mu.ln() } else { 0.0 };
    let b = if y < 1.0 { (1.0 - y) * (-mu).ln_1p() } else { 0.0 };
    -2.0 * (a + b)
}

fn binomial_variance(mu: f64) -> f64 {
    let mu = mu.clamp(MU_EPS, 1.0 - MU_EPS);
    mu * (1.0 - mu)
}

impl Loss for Bernoulli {
    fn name(&self) -> &'static str {
        "bernoulli"
    }

    fn link(&self) -> Link {
        Link::Logit
    }

    fn validate(&self, y: &[f64]) -> Result<()> {
        match y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            Some(v) => Err(TmleError::config(format!(
                "bernoulli loss requires 0/1 labels, found {v}"
            ))),
            None => Ok(()),
        }
    }

    fn variance(&self, mu: f64) -> f64 {
        binomial_variance(mu)
    }

    fn deviance_residual(&self, y: f64, mu: f64) -> f64 {
        binomial_deviance(y, mu)
    }
}

impl Loss for QuasiBernoulli {
    fn name(&self) -> &'static str {
        "quasi-bernoulli"
    }

    fn link(&self) -> Link {
        Link::Logit
    }

    fn validate(&self, y: &[f64]) -> Result<()> {
        match y.iter().find(|&&v| !(0.0..=1.0).contains(&v)) {
            Some(v) => Err(TmleError::config(format!(
                "quasi-bernoulli loss requires targets in [0, 1], found {v}"
            ))),
            None => Ok(()),
        }
    }

    fn variance(&self, mu: f64) -> f64 {
        binomial_variance(mu)
    }

    fn deviance_residual(&self, y: f64, mu: f64) -> f64 {
        binomial_deviance(y, mu)
    }
}

// ============================================================================
// Settings / fit result
// ============================================================================

/// IRLS tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlmSettings {
    pub max_iterations: usize,
    /// Relative deviance change that counts as converged.
    pub tolerance: f64,
    /// Ridge penalty on every coefficient except the intercept.
    pub l2: f64,
}

impl Default for GlmSettings {
    fn default() -> Self {
        Self {
            max_iterations: defaults::GLM_MAX_ITERATIONS,
            tolerance: defaults::GLM_TOLERANCE,
            l2: 0.0,
        }
    }
}

/// Coefficients of a fitted GLM, keyed by design-matrix column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedGlm {
    pub names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub link: Link,
    pub deviance: f64,
    pub iterations: usize,
}

impl FittedGlm {
    /// `X beta + offset`, matching columns by name.
    pub fn linear_predictor(&self, x: &Matrix, offset: Option<&[f64]>) -> Result<Vec<f64>> {
        let mut eta = match offset {
            Some(o) => {
                TmleError::check_len(x.nrows(), o.len())?;
                o.to_vec()
            }
            None => vec![0.0; x.nrows()],
        };
        for (name, &beta) in self.names.iter().zip(&self.coefficients) {
            if name == INTERCEPT {
                eta.iter_mut().for_each(|e| *e += beta);
                continue;
            }
            let j = x
                .names()
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| TmleError::MissingColumn(name.clone()))?;
            for (e, v) in eta.iter_mut().zip(x.column(j)) {
                *e += beta * v;
            }
        }
        Ok(eta)
    }

    /// Inverse link of the linear predictor.
    pub fn predict_mean(&self, x: &Matrix, offset: Option<&[f64]>) -> Result<Vec<f64>> {
        let link = self.link;
        Ok(self
            .linear_predictor(x, offset)?
            .into_iter()
            .map(|e| link.inverse(e))
            .collect())
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| self.coefficients[j])
    }
}

// ============================================================================
// IRLS
// ============================================================================

/// Fit `g(E[y]) = X beta + offset` under `loss`.
///
/// `x` is used as given: callers that want an intercept add an
/// [`INTERCEPT`] column of ones.
pub fn fit(
    x: &Matrix,
    y: &[f64],
    offset: Option<&[f64]>,
    weights: Option<&[f64]>,
    loss: &dyn Loss,
    settings: &GlmSettings,
) -> Result<FittedGlm> {
    let n = x.nrows();
    let p = x.ncols();
    TmleError::check_len(n, y.len())?;
    if n == 0 {
        return Err(TmleError::config("cannot fit a model on zero observations"));
    }
    if p == 0 {
        return Err(TmleError::config("design matrix has no columns"));
    }
    loss.validate(y)?;

    let offset = match offset {
        Some(o) => {
            TmleError::check_len(n, o.len())?;
            if let Some(v) = o.iter().find(|v| !v.is_finite()) {
                return Err(TmleError::numerical(format!("non-finite offset {v}")));
            }
            o.to_vec()
        }
        None => vec![0.0; n],
    };
    let weights = match weights {
        Some(w) => {
            TmleError::check_len(n, w.len())?;
            if let Some(v) = w.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(TmleError::numerical(format!("invalid prior weight {v}")));
            }
            w.to_vec()
        }
        None => vec![1.0; n],
    };

    let link = loss.link();
    let penalized: Vec<bool> = x.names().iter().map(|n| n != INTERCEPT).collect();
    let objective = |beta: &[f64]| -> f64 {
        let mut dev = 0.0;
        for i in 0..n {
            let eta = offset[i] + (0..p).map(|j| x.get(i, j) * beta[j]).sum::<f64>();
            dev += weights[i] * loss.deviance_residual(y[i], link.inverse(eta));
        }
        let ridge: f64 = beta
            .iter()
            .zip(&penalized)
            .filter(|(_, &pen)| pen)
            .map(|(b, _)| b * b)
            .sum();
        dev + settings.l2 * ridge
    };

    let mut beta = vec![0.0; p];
    let mut dev = objective(&beta);

    for iteration in 1..=settings.max_iterations {
        // Working weights and response at the current beta.
        let mut xtwx = vec![0.0; p * p];
        let mut xtwz = vec![0.0; p];
        for i in 0..n {
            let eta = offset[i] + (0..p).map(|j| x.get(i, j) * beta[j]).sum::<f64>();
            let mu = link.inverse(eta);
            let d = link.mu_eta(eta);
            let (w, z) = if d < 1e-12 {
                (0.0, eta - offset[i])
            } else {
                (weights[i] * d * d / loss.variance(mu), eta - offset[i] + (y[i] - mu) / d)
            };
            if w == 0.0 {
                continue;
            }
            for a in 0..p {
                let xa = x.get(i, a);
                xtwz[a] += w * xa * z;
                for b in 0..=a {
                    xtwx[a * p + b] += w * xa * x.get(i, b);
                }
            }
        }
        for a in 0..p {
            for b in 0..a {
                xtwx[b * p + a] = xtwx[a * p + b];
            }
            if penalized[a] {
                xtwx[a * p + a] += settings.l2;
            }
        }

        let mut candidate = solve_spd(&xtwx, &xtwz)?;
        let mut candidate_dev = objective(&candidate);
        let mut halvings = 0;
        // Accept float noise around a flat optimum; anything worse is halved.
        let slack = settings.tolerance * (dev.abs() + 0.1);
        while !(candidate_dev.is_finite() && candidate_dev - dev <= slack) {
            if halvings == MAX_HALVINGS {
                return Err(TmleError::numerical(format!(
                    "{} fit failed to decrease deviance at iteration {iteration}",
                    loss.name()
                )));
            }
            for (c, b) in candidate.iter_mut().zip(&beta) {
                *c = 0.5 * (*c + b);
            }
            candidate_dev = objective(&candidate);
            halvings += 1;
        }

        let change = (dev - candidate_dev).abs() / (candidate_dev.abs() + 0.1);
        beta = candidate;
        dev = candidate_dev;
        if change < settings.tolerance {
            return Ok(FittedGlm {
                names: x.names().to_vec(),
                coefficients: beta,
                link,
                deviance: dev,
                iterations: iteration,
            });
        }
    }

    Err(TmleError::Convergence {
        iterations: settings.max_iterations,
        deviance: dev,
    })
}

/// Prepend an intercept column of ones.
pub fn with_intercept(x: &Matrix) -> Result<Matrix> {
    let ones = Matrix::from_columns(x.nrows(), vec![(INTERCEPT.to_string(), vec![1.0; x.nrows()])])?;
    ones.hstack(x)
}
