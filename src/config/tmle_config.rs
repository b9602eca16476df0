//! Estimation configuration as TOML.
//!
//! Every section implements `Default`, so a partial file only overrides the
//! keys it names.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::learners::{GlmSettings, LinearRegression, LogisticRegression, MarginalFrequency, Selecting};
use crate::learners::FactorizedDensity;
use crate::nuisance::{AdjustmentMethod, NuisanceFitter};
use crate::simulation::Scenario;
use crate::targeting::{EstimationOptions, Tail, ThresholdRule};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "TMLE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tmle.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `TmleConfig::load()` which searches:
/// 1. `$TMLE_CONFIG` env var
/// 2. `./tmle.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmleConfig {
    #[serde(default)]
    pub estimation: EstimationConfig,

    /// IRLS settings of the fluctuation submodel
    #[serde(default)]
    pub fluctuation: FluctuationConfig,

    /// Nuisance learners
    #[serde(default)]
    pub learners: LearnersConfig,

    /// Synthetic data for the command-line runner
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl TmleConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TMLE_CONFIG` environment variable
    /// 2. `./tmle.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        for w in super::validation::validate_ranges(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Collect every violation rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let lb = self.estimation.ps_lowerbound;
        if !lb.is_finite() || !(0.0..1.0).contains(&lb) {
            errors.push(format!("estimation.ps_lowerbound = {lb} must be in [0, 1)"));
        }
        if lb == 0.0 && self.estimation.threshold_rule == ThresholdRule::Fixed {
            errors.push("estimation.ps_lowerbound = 0 with threshold_rule = \"fixed\" never truncates".to_string());
        }

        let tol = self.fluctuation.tolerance;
        if !tol.is_finite() || tol <= 0.0 {
            errors.push(format!("fluctuation.tolerance = {tol} must be > 0"));
        }
        if self.fluctuation.max_iterations == 0 {
            errors.push("fluctuation.max_iterations must be > 0".to_string());
        }

        let l2 = self.learners.l2;
        if !l2.is_finite() || l2 < 0.0 {
            errors.push(format!("learners.l2 = {l2} must be finite and >= 0"));
        }

        if self.simulation.n < 2 {
            errors.push(format!("simulation.n = {} must be at least 2", self.simulation.n));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Per-call estimator options.
    pub fn estimation_options(&self) -> EstimationOptions {
        EstimationOptions {
            adjustment: AdjustmentMethod::Backdoor,
            ps_lowerbound: self.estimation.ps_lowerbound,
            threshold_rule: self.estimation.threshold_rule,
            weighted_fluctuation: self.estimation.weighted_fluctuation,
            verbosity: self.estimation.verbosity,
            force: false,
            fluctuation: GlmSettings {
                max_iterations: self.fluctuation.max_iterations,
                tolerance: self.fluctuation.tolerance,
                l2: 0.0,
            },
        }
    }

    /// Settings shared by the nuisance GLMs.
    pub fn learner_settings(&self) -> GlmSettings {
        GlmSettings {
            max_iterations: self.fluctuation.max_iterations,
            tolerance: self.fluctuation.tolerance,
            l2: self.learners.l2,
        }
    }

    /// Nuisance fitter for the configured learners.
    ///
    /// `treatments` is only read by [`OutcomeLearner::TreatmentOnly`].
    pub fn nuisance_fitter(&self, treatments: &[String]) -> NuisanceFitter {
        let settings = self.learner_settings();
        match (self.learners.outcome, self.learners.propensity) {
            (OutcomeLearner::Glm, PropensityLearner::Logistic) => NuisanceFitter::new(
                LinearRegression::new(settings),
                LogisticRegression::new(settings),
                FactorizedDensity::new(settings),
            ),
            (OutcomeLearner::Glm, PropensityLearner::Marginal) => NuisanceFitter::new(
                LinearRegression::new(settings),
                LogisticRegression::new(settings),
                MarginalFrequency,
            ),
            (OutcomeLearner::TreatmentOnly, PropensityLearner::Logistic) => NuisanceFitter::new(
                Selecting::new(treatments.to_vec(), LinearRegression::new(settings)),
                Selecting::new(treatments.to_vec(), LogisticRegression::new(settings)),
                FactorizedDensity::new(settings),
            ),
            (OutcomeLearner::TreatmentOnly, PropensityLearner::Marginal) => NuisanceFitter::new(
                Selecting::new(treatments.to_vec(), LinearRegression::new(settings)),
                Selecting::new(treatments.to_vec(), LogisticRegression::new(settings)),
                MarginalFrequency,
            ),
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Estimation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationConfig {
    /// Lower bound on the treatment density before the threshold rule.
    #[serde(default = "default_ps_lowerbound")]
    pub ps_lowerbound: f64,

    #[serde(default)]
    pub threshold_rule: ThresholdRule,

    /// Fit the fluctuation on the indicator with inverse-density weights.
    #[serde(default)]
    pub weighted_fluctuation: bool,

    /// Alternative used for reported p-values.
    #[serde(default)]
    pub tail: Tail,

    #[serde(default = "default_verbosity")]
    pub verbosity: u8,
}

fn default_ps_lowerbound() -> f64 { defaults::PS_LOWERBOUND }
fn default_verbosity() -> u8 { defaults::VERBOSITY }

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            ps_lowerbound: default_ps_lowerbound(),
            threshold_rule: ThresholdRule::default(),
            weighted_fluctuation: false,
            tail: Tail::default(),
            verbosity: default_verbosity(),
        }
    }
}

// ============================================================================
// Fluctuation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluctuationConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Relative deviance change treated as converged.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_iterations() -> usize { defaults::GLM_MAX_ITERATIONS }
fn default_tolerance() -> f64 { defaults::GLM_TOLERANCE }

impl Default for FluctuationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

// ============================================================================
// Learners
// ============================================================================

/// Outcome regression family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLearner {
    /// Linear or logistic regression on every outcome input.
    #[default]
    Glm,
    /// Same GLM restricted to the treatment columns (ignores confounding).
    TreatmentOnly,
}

/// Treatment density family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropensityLearner {
    /// Chain-rule logistic factorization.
    #[default]
    Logistic,
    /// Empirical pattern frequency, ignoring confounders.
    Marginal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnersConfig {
    #[serde(default)]
    pub outcome: OutcomeLearner,

    #[serde(default)]
    pub propensity: PropensityLearner,

    /// Ridge penalty on non-intercept coefficients.
    #[serde(default)]
    pub l2: f64,
}

impl Default for LearnersConfig {
    fn default() -> Self {
        Self {
            outcome: OutcomeLearner::default(),
            propensity: PropensityLearner::default(),
            l2: 0.0,
        }
    }
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_n")]
    pub n: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub scenario: Scenario,
}

fn default_n() -> usize { defaults::SIMULATION_N }
fn default_seed() -> u64 { defaults::SIMULATION_SEED }

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n: default_n(),
            seed: default_seed(),
            scenario: Scenario::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
