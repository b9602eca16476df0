//! Nuisance model fitting with a fit cache.
//!
//! Plays the role of the structural causal model: for an estimand it fits
//! the outcome regression `Q(Y | W, C, T)` and the treatment density
//! `g(T | W)`, keyed by equation and data fingerprint so repeated
//! estimands over the same data reuse earlier fits.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::data::{Column, Dataset, Encoder, OneHotEncoder};
use crate::error::{Result, TmleError};
use crate::estimand::Estimand;
use crate::learners::{
    Classifier, DensityLearner, DensityModel, FactorizedDensity, LinearRegression,
    LogisticRegression, Regressor,
};
use crate::targeting::OutcomeModel;

/// How the conditioning set of each nuisance model is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdjustmentMethod {
    /// Condition on the estimand's confounders.
    #[default]
    Backdoor,
}

impl AdjustmentMethod {
    pub fn adjustment_set(self, estimand: &Estimand) -> Vec<String> {
        match self {
            Self::Backdoor => estimand.confounders.clone(),
        }
    }
}

/// Outcome column converted to numeric targets.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeTarget {
    /// Raw values, or 1.0 for the target class of a binary outcome.
    pub values: Vec<f64>,
    /// Level set of a binary outcome; the second level is the target class.
    pub levels: Option<[String; 2]>,
}

/// Read `outcome` as a continuous or binary target.
pub fn outcome_target(dataset: &Dataset, outcome: &str) -> Result<OutcomeTarget> {
    match dataset.get(outcome)? {
        Column::Float(values) => Ok(OutcomeTarget {
            values: values.clone(),
            levels: None,
        }),
        Column::Factor(factor) => match factor.levels() {
            [control, target] => Ok(OutcomeTarget {
                values: factor.codes().iter().map(|&c| f64::from(c)).collect(),
                levels: Some([control.clone(), target.clone()]),
            }),
            levels => Err(TmleError::config(format!(
                "binary outcome '{outcome}' must have exactly two classes, found {}",
                levels.len()
            ))),
        },
    }
}

/// Everything the targeting step needs from the nuisance fits.
#[derive(Debug, Clone)]
pub struct NuisanceFits {
    pub outcome: OutcomeModel,
    pub density: Rc<dyn DensityModel>,
    /// Fitted on the observed outcome inputs; reused for counterfactual tables.
    pub encoder: OneHotEncoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Outcome,
    Treatment,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EquationKey {
    role: Role,
    target: Vec<String>,
    parents: Vec<String>,
    fingerprint: u64,
}

impl EquationKey {
    fn new(role: Role, target: Vec<String>, parents: Vec<String>, dataset: &Dataset) -> Result<Self> {
        let columns: Vec<&String> = target.iter().chain(&parents).collect();
        let fingerprint = dataset.fingerprint(&columns)?;
        Ok(Self {
            role,
            target,
            parents,
            fingerprint,
        })
    }
}

/// Fits and caches the outcome and treatment equations of estimands.
pub struct NuisanceFitter {
    regressor: Box<dyn Regressor>,
    classifier: Box<dyn Classifier>,
    density: Box<dyn DensityLearner>,
    outcome_cache: HashMap<EquationKey, (OutcomeModel, OneHotEncoder)>,
    density_cache: HashMap<EquationKey, Rc<dyn DensityModel>>,
    fits_performed: usize,
}

impl Default for NuisanceFitter {
    fn default() -> Self {
        Self::new(
            LinearRegression::default(),
            LogisticRegression::default(),
            FactorizedDensity::default(),
        )
    }
}

impl fmt::Debug for NuisanceFitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NuisanceFitter")
            .field("regressor", &self.regressor.name())
            .field("classifier", &self.classifier.name())
            .field("density", &self.density.name())
            .field("cached_fits", &self.cached_fits())
            .finish()
    }
}

impl NuisanceFitter {
    pub fn new(
        regressor: impl Regressor + 'static,
        classifier: impl Classifier + 'static,
        density: impl DensityLearner + 'static,
    ) -> Self {
        Self {
            regressor: Box::new(regressor),
            classifier: Box::new(classifier),
            density: Box::new(density),
            outcome_cache: HashMap::new(),
            density_cache: HashMap::new(),
            fits_performed: 0,
        }
    }

    /// Number of cached equations.
    pub fn cached_fits(&self) -> usize {
        self.outcome_cache.len() + self.density_cache.len()
    }

    /// Number of learner fits actually run (cache hits excluded).
    pub const fn fits_performed(&self) -> usize {
        self.fits_performed
    }

    pub fn clear_cache(&mut self) {
        self.outcome_cache.clear();
        self.density_cache.clear();
    }

    /// Fit (or fetch) both nuisance models of `estimand`.
    ///
    /// `force` refits even when a cached fit exists for the same data.
    pub fn fit(
        &mut self,
        estimand: &Estimand,
        dataset: &Dataset,
        adjustment: AdjustmentMethod,
        verbosity: u8,
        force: bool,
    ) -> Result<NuisanceFits> {
        let (outcome, encoder) = self.fit_outcome(estimand, dataset, verbosity, force)?;
        let density = self.fit_density(estimand, dataset, adjustment, verbosity, force)?;
        Ok(NuisanceFits {
            outcome,
            density,
            encoder,
        })
    }

    /// Cached outcome model of `estimand` on `dataset`, if any.
    pub fn outcome_model(&self, estimand: &Estimand, dataset: &Dataset) -> Result<Option<OutcomeModel>> {
        let key = Self::outcome_key(estimand, dataset)?;
        Ok(self.outcome_cache.get(&key).map(|(model, _)| model.clone()))
    }

    fn outcome_key(estimand: &Estimand, dataset: &Dataset) -> Result<EquationKey> {
        EquationKey::new(
            Role::Outcome,
            vec![estimand.outcome.clone()],
            estimand.outcome_parents(),
            dataset,
        )
    }

    fn fit_outcome(
        &mut self,
        estimand: &Estimand,
        dataset: &Dataset,
        verbosity: u8,
        force: bool,
    ) -> Result<(OutcomeModel, OneHotEncoder)> {
        let key = Self::outcome_key(estimand, dataset)?;
        if !force {
            if let Some(cached) = self.outcome_cache.get(&key) {
                debug!(outcome = %estimand.outcome, "Reusing cached outcome model");
                return Ok(cached.clone());
            }
        }

        let inputs = dataset.select(&key.parents)?;
        let mut encoder = OneHotEncoder::default();
        encoder.fit(&inputs)?;
        let x = encoder.transform(&inputs)?;
        let target = outcome_target(dataset, &estimand.outcome)?;

        let model = match target.levels {
            None => OutcomeModel::Continuous(self.regressor.fit(&x, &target.values)?),
            Some(levels) => OutcomeModel::Binary {
                model: self.classifier.fit(&x, &target.values)?,
                levels,
            },
        };
        self.fits_performed += 1;
        if verbosity >= 1 {
            let learner = if model.is_binary() {
                self.classifier.name()
            } else {
                self.regressor.name()
            };
            info!(
                outcome = %estimand.outcome,
                parents = ?key.parents,
                learner = %learner,
                "Fitted outcome model"
            );
        }
        self.outcome_cache.insert(key, (model.clone(), encoder.clone()));
        Ok((model, encoder))
    }

    fn fit_density(
        &mut self,
        estimand: &Estimand,
        dataset: &Dataset,
        adjustment: AdjustmentMethod,
        verbosity: u8,
        force: bool,
    ) -> Result<Rc<dyn DensityModel>> {
        let key = EquationKey::new(
            Role::Treatment,
            estimand.treatments(),
            adjustment.adjustment_set(estimand),
            dataset,
        )?;
        if !force {
            if let Some(cached) = self.density_cache.get(&key) {
                debug!(treatments = ?key.target, "Reusing cached treatment density");
                return Ok(Rc::clone(cached));
            }
        }

        let w = dataset.select(&key.parents)?;
        let t = dataset.select(&key.target)?;
        let model = self.density.fit(&w, &t)?;
        self.fits_performed += 1;
        if verbosity >= 1 {
            info!(
                treatments = ?key.target,
                confounders = ?key.parents,
                learner = %self.density.name(),
                "Fitted treatment density"
            );
        }
        self.density_cache.insert(key, Rc::clone(&model));
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Factor;
    use crate::estimand::Query;

    fn dataset() -> Dataset {
        Dataset::new()
            .with_column("W", Column::Float(vec![0.1, -0.4, 0.3, 1.2, -0.8, 0.5, -1.1, 0.9]))
            .unwrap()
            .with_column(
                "T",
                Column::Factor(Factor::from_values(&["0", "1", "1", "0", "0", "1", "1", "0"])),
            )
            .unwrap()
            .with_column("Y", Column::Float(vec![1.0, 2.5, 2.0, 1.4, 0.2, 3.1, 1.9, 1.6]))
            .unwrap()
    }

    fn ate() -> Estimand {
        Estimand::ate("Y", Query::new().with("T", [1, 0]), vec!["W".into()]).unwrap()
    }

    #[test]
    fn continuous_and_binary_targets() {
        let ds = dataset()
            .with_column("B", Column::Factor(Factor::from_values(&["no", "yes", "no", "no", "yes", "yes", "no", "no"])))
            .unwrap();
        let y = outcome_target(&ds, "Y").unwrap();
        assert!(y.levels.is_none());
        let b = outcome_target(&ds, "B").unwrap();
        assert_eq!(b.levels, Some(["no".to_string(), "yes".to_string()]));
        assert_eq!(b.values, vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn three_outcome_classes_is_configuration_error() {
        let ds = dataset()
            .with_column("C", Column::Factor(Factor::from_values(&["a", "b", "c", "a", "b", "c", "a", "b"])))
            .unwrap();
        assert!(matches!(outcome_target(&ds, "C"), Err(TmleError::Configuration(_))));
    }

    #[test]
    fn second_fit_hits_the_cache() {
        let mut fitter = NuisanceFitter::default();
        let ds = dataset();
        fitter.fit(&ate(), &ds, AdjustmentMethod::Backdoor, 0, false).unwrap();
        assert_eq!(fitter.fits_performed(), 2);
        assert_eq!(fitter.cached_fits(), 2);
        fitter.fit(&ate(), &ds, AdjustmentMethod::Backdoor, 0, false).unwrap();
        assert_eq!(fitter.fits_performed(), 2);
        assert!(fitter.outcome_model(&ate(), &ds).unwrap().is_some());
    }

    #[test]
    fn force_refits() {
        let mut fitter = NuisanceFitter::default();
        let ds = dataset();
        fitter.fit(&ate(), &ds, AdjustmentMethod::Backdoor, 0, false).unwrap();
        fitter.fit(&ate(), &ds, AdjustmentMethod::Backdoor, 0, true).unwrap();
        assert_eq!(fitter.fits_performed(), 4);
        assert_eq!(fitter.cached_fits(), 2);
    }

    #[test]
    fn changed_data_misses_the_cache() {
        let mut fitter = NuisanceFitter::default();
        fitter.fit(&ate(), &dataset(), AdjustmentMethod::Backdoor, 0, false).unwrap();
        let shifted = dataset()
            .with_column("Y", Column::Float(vec![1.1, 2.5, 2.0, 1.4, 0.2, 3.1, 1.9, 1.6]))
            .unwrap();
        fitter.fit(&ate(), &shifted, AdjustmentMethod::Backdoor, 0, false).unwrap();
        // Only the outcome equation sees the change.
        assert_eq!(fitter.fits_performed(), 3);
        assert_eq!(fitter.cached_fits(), 3);
    }
}
