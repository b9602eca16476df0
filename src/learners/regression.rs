//! Linear and logistic regression with an intercept.

use std::rc::Rc;

use super::glm::{self, Bernoulli, FittedGlm, Gaussian, GlmSettings};
use super::{Classifier, FittedClassifier, FittedRegressor, Regressor};
use crate::data::Matrix;
use crate::error::Result;

/// Ordinary least squares (optionally ridge-penalized).
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    pub settings: GlmSettings,
}

/// Logistic regression with strict 0/1 labels (optionally ridge-penalized).
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    pub settings: GlmSettings,
}

impl LinearRegression {
    pub fn new(settings: GlmSettings) -> Self {
        Self { settings }
    }
}

impl LogisticRegression {
    pub fn new(settings: GlmSettings) -> Self {
        Self { settings }
    }

    /// Fit and return the raw GLM (used by the density models).
    pub fn fit_glm(&self, x: &Matrix, y: &[f64]) -> Result<FittedGlm> {
        glm::fit(&glm::with_intercept(x)?, y, None, None, &Bernoulli, &self.settings)
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> String {
        "linear_regression".to_string()
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedRegressor>> {
        let fitted = glm::fit(&glm::with_intercept(x)?, y, None, None, &Gaussian, &self.settings)?;
        Ok(Rc::new(fitted))
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> String {
        "logistic_regression".to_string()
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedClassifier>> {
        Ok(Rc::new(self.fit_glm(x, y)?))
    }
}

impl FittedRegressor for FittedGlm {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.predict_mean(x, None)
    }
}

impl FittedClassifier for FittedGlm {
    fn predict_target_class_prob(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.predict_mean(x, None)
    }
}
