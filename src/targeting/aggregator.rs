//! Counterfactual aggregation and the efficient influence curve.
//!
//! For every signed treatment combination of the contrast, each row's
//! treatments are forced to that combination and both the initial and the
//! fluctuated outcome means are evaluated. The signed sums give the
//! per-row plug-in contrasts; their means are the estimates.

use std::rc::Rc;

use tracing::debug;

use super::covariate::{clever_covariate, CleverCovariate};
use super::fluctuation::Fluctuation;
use super::indicator::IndicatorTable;
use super::offset::OutcomeModel;
use crate::data::{Column, Dataset, Encoder};
use crate::error::{Result, TmleError};
use crate::learners::DensityModel;
use crate::numeric::mean;

/// Fitted pieces and observed data shared by every counterfactual pass.
pub struct CounterfactualInputs<'a> {
    pub outcome: &'a OutcomeModel,
    pub density: &'a Rc<dyn DensityModel>,
    pub encoder: &'a dyn Encoder,
    /// Confounders `W`, the density's conditioning set.
    pub confounders: &'a Dataset,
    /// Every non-treatment input of the outcome model (`W` plus extra covariates).
    pub outcome_inputs: &'a Dataset,
    /// Observed treatments, used for their factor level sets.
    pub treatments: &'a Dataset,
    pub indicators: &'a IndicatorTable,
    pub threshold: f64,
}

/// Per-row signed sums over all combinations.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    /// Signed sum of the initial outcome model's expected values.
    pub initial: Vec<f64>,
    /// Signed sum of the fluctuated means; equal to `initial` without a fluctuation.
    pub targeted: Vec<f64>,
}

/// Influence curve and the estimates derived from the aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationReport {
    pub influence_curve: Vec<f64>,
    pub estimate: f64,
    pub initial_estimate: f64,
}

impl CounterfactualInputs<'_> {
    /// Treatment table with every row set to `combination` (query order).
    pub fn counterfactual_treatments(&self, combination: &[String]) -> Result<Dataset> {
        let mut table = Dataset::new();
        for (variable, level) in self.indicators.variables().iter().zip(combination) {
            let observed = self.treatments.factor(variable)?;
            let forced = observed.constant_like(variable, level)?;
            table = table.with_column(variable.clone(), Column::Factor(forced))?;
        }
        Ok(table)
    }

    /// Signed sums of initial and (when given) fluctuated predictions.
    pub fn aggregate(&self, fluctuation: Option<&Fluctuation>) -> Result<Aggregates> {
        let n = self.treatments.nrows();
        let mut initial = vec![0.0; n];
        let mut targeted = vec![0.0; n];

        for (combination, sign) in self.indicators.iter() {
            let t_cf = self.counterfactual_treatments(combination)?;
            let x_cf = self.encoder.transform(&self.outcome_inputs.merge(&t_cf)?)?;

            let expected = self.outcome.expected_value(&x_cf)?;
            TmleError::check_len(n, expected.len())?;
            for (acc, q) in initial.iter_mut().zip(&expected) {
                *acc += sign * q;
            }

            let fluctuated = match fluctuation {
                Some(fluctuation) => {
                    let covariate = clever_covariate(
                        self.density,
                        self.confounders,
                        &t_cf,
                        self.indicators,
                        self.threshold,
                    )?;
                    let offset = self.outcome.offset(&x_cf)?;
                    fluctuation.predict_mean(&covariate, &offset)?
                }
                None => expected,
            };
            TmleError::check_len(n, fluctuated.len())?;
            for (acc, q) in targeted.iter_mut().zip(&fluctuated) {
                *acc += sign * q;
            }
            debug!(combination = ?combination, sign, "Counterfactual pass done");
        }

        Ok(Aggregates { initial, targeted })
    }

    /// Aggregate and compute `H·(y − Q_obs) + targeted − estimate`.
    ///
    /// `observed_prediction` is the fluctuated mean at the observed
    /// treatments, or the initial expected value when `fluctuation` is `None`.
    pub fn estimation_report(
        &self,
        fluctuation: Option<&Fluctuation>,
        observed_covariate: &CleverCovariate,
        observed_prediction: &[f64],
        y: &[f64],
    ) -> Result<EstimationReport> {
        let aggregates = self.aggregate(fluctuation)?;
        let covariate = observed_covariate.covariate.realize()?;
        let n = aggregates.targeted.len();
        TmleError::check_len(n, covariate.len())?;
        TmleError::check_len(n, observed_prediction.len())?;
        TmleError::check_len(n, y.len())?;

        let estimate = mean(&aggregates.targeted);
        let initial_estimate = mean(&aggregates.initial);
        let influence_curve = (0..n)
            .map(|i| covariate[i] * (y[i] - observed_prediction[i]) + aggregates.targeted[i] - estimate)
            .collect();

        Ok(EstimationReport {
            influence_curve,
            estimate,
            initial_estimate,
        })
    }
}
