//! One-parameter fluctuation submodel.
//!
//! `g(E[Y]) = epsilon * H + offset`, with the offset taken from the initial
//! outcome model and held fixed. For binary outcomes the fit uses the
//! quasi-Bernoulli loss so that label validation is relaxed for this fit
//! only; continuous outcomes use squared error on the identity link.
//!
//! With weighted fluctuation the regressor is the signed indicator and the
//! inverse truncated density moves into the prior weights.

use serde::Serialize;
use tracing::debug;

use super::covariate::CleverCovariate;
use crate::data::Matrix;
use crate::error::{Result, TmleError};
use crate::learners::glm::{self, FittedGlm, Gaussian, GlmSettings, Loss, QuasiBernoulli};
use crate::learners::Link;
use crate::numeric::Values;

const COVARIATE: &str = "covariate";

/// Fitted fluctuation submodel.
#[derive(Debug, Clone, Serialize)]
pub struct Fluctuation {
    glm: FittedGlm,
    weighted: bool,
}

impl Fluctuation {
    /// Fit epsilon on the observed data.
    pub fn fit(
        covariate: &CleverCovariate,
        offset: &Values,
        y: &[f64],
        link: Link,
        weighted: bool,
        settings: &GlmSettings,
    ) -> Result<Self> {
        let regressor = Self::regressor(covariate, weighted)?;
        check_not_degenerate(&regressor)?;
        let weights = if weighted {
            Some(
                covariate
                    .truncated_density
                    .realize()?
                    .iter()
                    .map(|g| 1.0 / g)
                    .collect::<Vec<f64>>(),
            )
        } else {
            None
        };
        let offset = offset.realize()?;
        TmleError::check_len(y.len(), regressor.len())?;

        let loss: &dyn Loss = match link {
            Link::Logit => &QuasiBernoulli,
            Link::Identity => &Gaussian,
        };
        let x = Matrix::from_columns(y.len(), vec![(COVARIATE.to_string(), regressor)])?;
        // The submodel has no intercept and nothing to penalize.
        let settings = GlmSettings { l2: 0.0, ..*settings };
        let glm = glm::fit(&x, y, Some(&offset[..]), weights.as_deref(), loss, &settings)?;
        debug!(
            epsilon = glm.coefficients[0],
            iterations = glm.iterations,
            loss = loss.name(),
            weighted,
            "Fluctuation fitted"
        );
        Ok(Self { glm, weighted })
    }

    /// Fitted mean `g^-1(epsilon * H + offset)` for any covariate/offset pair.
    pub fn predict_mean(&self, covariate: &CleverCovariate, offset: &Values) -> Result<Vec<f64>> {
        let regressor = Self::regressor(covariate, self.weighted)?;
        let offset = offset.realize()?;
        let x = Matrix::from_columns(regressor.len(), vec![(COVARIATE.to_string(), regressor)])?;
        self.glm.predict_mean(&x, Some(&offset[..]))
    }

    pub fn epsilon(&self) -> f64 {
        self.glm.coefficients[0]
    }

    pub const fn is_weighted(&self) -> bool {
        self.weighted
    }

    pub const fn link(&self) -> Link {
        self.glm.link
    }

    pub const fn iterations(&self) -> usize {
        self.glm.iterations
    }

    fn regressor(covariate: &CleverCovariate, weighted: bool) -> Result<Vec<f64>> {
        if weighted {
            covariate.indicator.to_vec()
        } else {
            covariate.covariate.to_vec()
        }
    }
}

fn check_not_degenerate(regressor: &[f64]) -> Result<()> {
    let Some(&first) = regressor.first() else {
        return Err(TmleError::DegenerateCovariate("no observations".into()));
    };
    if regressor.iter().all(|&h| h == 0.0) {
        return Err(TmleError::DegenerateCovariate(
            "covariate is zero for every observation".into(),
        ));
    }
    if regressor.iter().all(|&h| h == first) {
        return Err(TmleError::DegenerateCovariate(format!(
            "covariate is constant ({first}) across observations"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::expit;

    fn covariate(indicator: Vec<f64>, density: Vec<f64>) -> CleverCovariate {
        let covariate: Vec<f64> = indicator.iter().zip(&density).map(|(i, g)| i / g).collect();
        CleverCovariate {
            indicator: indicator.into(),
            density: density.clone().into(),
            truncated_density: density.into(),
            covariate: covariate.into(),
        }
    }

    #[test]
    fn zero_epsilon_when_offset_already_fits() {
        let h = covariate(vec![1.0, -1.0, 1.0, -1.0], vec![0.5, 0.5, 0.4, 0.6]);
        let offset = vec![0.2, -0.1, 0.4, 0.0];
        let y: Vec<f64> = offset.iter().map(|&o| expit(o)).collect();
        let fluct = Fluctuation::fit(&h, &offset.clone().into(), &y, Link::Logit, false, &GlmSettings::default())
            .unwrap();
        assert!(fluct.epsilon().abs() < 1e-8);
        let pred = fluct.predict_mean(&h, &offset.into()).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-8);
        }
    }

    #[test]
    fn score_equation_holds_after_fit() {
        let h = covariate(vec![1.0, -1.0, 1.0, -1.0, 1.0], vec![0.5, 0.5, 0.3, 0.7, 0.6]);
        let offset = vec![0.0; 5];
        let y = vec![1.0, 0.0, 1.0, 1.0, 0.0];
        let fluct = Fluctuation::fit(&h, &offset.clone().into(), &y, Link::Logit, false, &GlmSettings::default())
            .unwrap();
        let mu = fluct.predict_mean(&h, &offset.into()).unwrap();
        let hv = h.covariate.to_vec().unwrap();
        let score: f64 = hv.iter().zip(&y).zip(&mu).map(|((h, y), m)| h * (y - m)).sum();
        assert!(score.abs() < 1e-6, "score {score}");
    }

    #[test]
    fn weighted_fit_solves_same_score() {
        let h = covariate(vec![1.0, -1.0, 1.0, -1.0, 1.0], vec![0.5, 0.5, 0.3, 0.7, 0.6]);
        let offset = vec![0.1; 5];
        let y = vec![1.2, 0.3, 2.0, 1.5, 0.7];
        let fluct = Fluctuation::fit(&h, &offset.clone().into(), &y, Link::Identity, true, &GlmSettings::default())
            .unwrap();
        assert!(fluct.is_weighted());
        let mu = fluct.predict_mean(&h, &offset.into()).unwrap();
        let hv = h.covariate.to_vec().unwrap();
        let score: f64 = hv.iter().zip(&y).zip(&mu).map(|((h, y), m)| h * (y - m)).sum();
        assert!(score.abs() < 1e-8, "score {score}");
    }

    #[test]
    fn all_zero_covariate_is_degenerate() {
        let h = covariate(vec![0.0; 3], vec![0.5; 3]);
        let err = Fluctuation::fit(&h, &vec![0.0; 3].into(), &[0.0, 1.0, 0.0], Link::Logit, false, &GlmSettings::default())
            .unwrap_err();
        assert!(matches!(err, TmleError::DegenerateCovariate(_)));
    }

    #[test]
    fn constant_covariate_is_degenerate() {
        let h = covariate(vec![1.0; 3], vec![0.5; 3]);
        let err = Fluctuation::fit(&h, &vec![0.0; 3].into(), &[0.0, 1.0, 0.0], Link::Logit, false, &GlmSettings::default())
            .unwrap_err();
        assert!(matches!(err, TmleError::DegenerateCovariate(_)));
    }
}
