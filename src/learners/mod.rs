//! Reference nuisance learners.
//!
//! The estimation core only sees the traits below. The implementations are
//! intentionally small: linear and logistic GLMs, a stratified mean, a
//! column-selecting wrapper for deliberately restricted models, and two
//! treatment density models.
//!
//! ## Traits
//! - [`Regressor`] / [`FittedRegressor`]: continuous outcome, `E[Y | X]`
//! - [`Classifier`] / [`FittedClassifier`]: binary outcome, `P(Y = target | X)`
//! - [`DensityLearner`] / [`DensityModel`]: joint treatment likelihood `g(T | W)`

pub mod density;
pub mod glm;
pub mod linalg;
pub mod regression;
pub mod simple;

use std::fmt;
use std::rc::Rc;

use crate::data::{Dataset, Matrix};
use crate::error::Result;

pub use density::{FactorizedDensity, MarginalFrequency};
pub use glm::{Bernoulli, FittedGlm, Gaussian, GlmSettings, Link, Loss, QuasiBernoulli};
pub use regression::{LinearRegression, LogisticRegression};
pub use simple::{GroupMean, Selecting};

pub trait Regressor: fmt::Debug {
    fn name(&self) -> String;
    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedRegressor>>;
}

pub trait FittedRegressor: fmt::Debug {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>>;
}

pub trait Classifier: fmt::Debug {
    fn name(&self) -> String;
    /// `y` holds 1.0 for the target class and 0.0 otherwise.
    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedClassifier>>;
}

pub trait FittedClassifier: fmt::Debug {
    fn predict_target_class_prob(&self, x: &Matrix) -> Result<Vec<f64>>;
}

pub trait DensityLearner: fmt::Debug {
    fn name(&self) -> String;
    /// Fit `g(T | W)`; `t` holds only categorical treatment columns.
    fn fit(&self, w: &Dataset, t: &Dataset) -> Result<Rc<dyn DensityModel>>;
}

pub trait DensityModel: fmt::Debug {
    /// Likelihood of each row's treatment pattern given its confounders.
    fn density(&self, w: &Dataset, t: &Dataset) -> Result<Vec<f64>>;
}
