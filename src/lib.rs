//! TMLE-RS: targeted and one-step estimation of causal effects
//!
//! Semiparametric estimators of treatment-effect parameters that stay
//! consistent when either nuisance model is correct, with inference from
//! the efficient influence curve.
//!
//! ## Architecture
//!
//! - **Targeting**: indicator table, clever covariate, fluctuation,
//!   counterfactual aggregation and inference
//! - **Nuisance**: outcome and treatment-density fits with a fit cache
//! - **Learners**: GLMs (IRLS), stratified means and density models
//! - **Data**: named columns, factors and one-hot encoding
//! - **Numeric**: logit/expit, truncation and a lazy array graph

pub mod config;
pub mod data;
pub mod error;
pub mod estimand;
pub mod learners;
pub mod nuisance;
pub mod numeric;
pub mod simulation;
pub mod targeting;

// Re-export configuration
pub use config::{ConfigError, TmleConfig};

pub use error::{Result, TmleError};

// Re-export the estimation surface
pub use data::{Column, Dataset, Factor};
pub use estimand::{Estimand, EstimandKind, Query};
pub use nuisance::{AdjustmentMethod, NuisanceFitter};
pub use targeting::{
    naive_plugin_estimate, ose, query_report, tmle, EstimationOptions, Fluctuation,
    OneStepEstimate, QueryReport, Tail, TargetedEstimate, ThresholdRule,
};
