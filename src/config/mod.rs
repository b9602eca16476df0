//! Estimation Configuration Module
//!
//! TOML configuration for estimator options, nuisance learners and the
//! simulation runner.
//!
//! ## Loading Order
//!
//! 1. `TMLE_CONFIG` environment variable (path to TOML file)
//! 2. `tmle.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! let config = TmleConfig::load();
//! let options = config.estimation_options();
//! let mut fitter = config.nuisance_fitter(&estimand.treatments());
//! ```

mod tmle_config;
pub mod defaults;
pub mod validation;

pub use tmle_config::*;
