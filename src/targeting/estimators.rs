//! Top-level estimators: targeted, one-step and naive plug-in.
//!
//! All three share one pipeline:
//!
//! ```text
//! VALIDATE -> FIT_NUISANCE -> DETERMINE_THRESHOLD -> [FIT_FLUCTUATION] -> COMPUTE_ESTIMATE
//! ```
//!
//! Only [`tmle`] fits the fluctuation. [`ose`] adds the mean of the initial
//! influence curve to the plug-in estimate, and [`naive_plugin_estimate`]
//! stops at the signed plug-in aggregate.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::aggregator::CounterfactualInputs;
use super::covariate::{clever_covariate, CleverCovariate};
use super::fluctuation::Fluctuation;
use super::indicator::{indicator_fns, IndicatorTable};
use super::inference::{query_report, QueryReport, Tail};
use super::offset::OutcomeModel;
use super::threshold::{resolve_threshold, ThresholdRule};
use crate::config::defaults;
use crate::data::{Dataset, Encoder, Matrix};
use crate::error::Result;
use crate::estimand::Estimand;
use crate::learners::GlmSettings;
use crate::nuisance::{outcome_target, AdjustmentMethod, NuisanceFits, NuisanceFitter};
use crate::numeric::mean;

/// Per-call options.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    pub adjustment: AdjustmentMethod,
    /// Lower bound on the treatment density before the threshold rule.
    pub ps_lowerbound: f64,
    pub threshold_rule: ThresholdRule,
    /// Regress on the indicator with `1 / g` as prior weights.
    pub weighted_fluctuation: bool,
    pub verbosity: u8,
    /// Refit nuisance models even if cached.
    pub force: bool,
    pub fluctuation: GlmSettings,
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self {
            adjustment: AdjustmentMethod::Backdoor,
            ps_lowerbound: defaults::PS_LOWERBOUND,
            threshold_rule: ThresholdRule::SampleAdaptive,
            weighted_fluctuation: false,
            verbosity: defaults::VERBOSITY,
            force: false,
            fluctuation: GlmSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetedEstimate {
    pub estimate: f64,
    pub influence_curve: Vec<f64>,
    pub initial_estimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneStepEstimate {
    pub estimate: f64,
    pub influence_curve: Vec<f64>,
    pub initial_estimate: f64,
}

impl TargetedEstimate {
    pub fn report(&self, tail: Tail) -> Result<QueryReport> {
        query_report(&self.influence_curve, self.estimate, self.initial_estimate, tail)
    }
}

impl OneStepEstimate {
    pub fn report(&self, tail: Tail) -> Result<QueryReport> {
        query_report(&self.influence_curve, self.estimate, self.initial_estimate, tail)
    }
}

/// Observed-data state after nuisance fitting.
struct Prepared {
    fits: NuisanceFits,
    w: Dataset,
    outcome_inputs: Dataset,
    t: Dataset,
    x: Matrix,
    y: Vec<f64>,
    indicators: IndicatorTable,
    threshold: f64,
}

impl Prepared {
    fn new(
        fitter: &mut NuisanceFitter,
        estimand: &Estimand,
        dataset: &Dataset,
        options: &EstimationOptions,
    ) -> Result<Self> {
        // Fail before any fitting if the contrast cannot be evaluated.
        estimand.validate()?;
        estimand.query.check_levels_present(dataset)?;
        let indicators = indicator_fns(&estimand.query)?;

        let fits = fitter.fit(
            estimand,
            dataset,
            options.adjustment,
            options.verbosity,
            options.force,
        )?;

        let threshold = resolve_threshold(options.ps_lowerbound, options.threshold_rule, dataset.nrows())?;
        debug!(threshold, rule = ?options.threshold_rule, "Resolved truncation threshold");

        let non_treatment: Vec<String> = estimand
            .confounders
            .iter()
            .chain(&estimand.covariates)
            .cloned()
            .collect();
        let w = dataset.select(&options.adjustment.adjustment_set(estimand))?;
        let outcome_inputs = dataset.select(&non_treatment)?;
        let t = dataset.select(&estimand.treatments())?;
        let x = fits.encoder.transform(&outcome_inputs.merge(&t)?)?;
        let y = outcome_target(dataset, &estimand.outcome)?.values;

        Ok(Self {
            fits,
            w,
            outcome_inputs,
            t,
            x,
            y,
            indicators,
            threshold,
        })
    }

    fn inputs(&self) -> CounterfactualInputs<'_> {
        CounterfactualInputs {
            outcome: &self.fits.outcome,
            density: &self.fits.density,
            encoder: &self.fits.encoder,
            confounders: &self.w,
            outcome_inputs: &self.outcome_inputs,
            treatments: &self.t,
            indicators: &self.indicators,
            threshold: self.threshold,
        }
    }

    fn observed_covariate(&self) -> Result<CleverCovariate> {
        let covariate = clever_covariate(
            &self.fits.density,
            &self.w,
            &self.t,
            &self.indicators,
            self.threshold,
        )?;
        let truncated = covariate.truncated_fraction(self.threshold)?;
        if truncated > defaults::TRUNCATION_WARN_FRACTION {
            warn!(
                fraction = truncated,
                threshold = self.threshold,
                "Treatment density truncated for a large share of observations"
            );
        }
        Ok(covariate)
    }
}

/// Targeted maximum likelihood estimate and the fitted fluctuation.
pub fn tmle(
    fitter: &mut NuisanceFitter,
    estimand: &Estimand,
    dataset: &Dataset,
    options: &EstimationOptions,
) -> Result<(TargetedEstimate, Fluctuation)> {
    let prepared = Prepared::new(fitter, estimand, dataset, options)?;
    let covariate = prepared.observed_covariate()?;

    let offset = prepared.fits.outcome.offset(&prepared.x)?;
    let fluctuation = Fluctuation::fit(
        &covariate,
        &offset,
        &prepared.y,
        prepared.fits.outcome.link(),
        options.weighted_fluctuation,
        &options.fluctuation,
    )?;
    let observed = fluctuation.predict_mean(&covariate, &offset)?;

    let report = prepared
        .inputs()
        .estimation_report(Some(&fluctuation), &covariate, &observed, &prepared.y)?;
    if options.verbosity >= 1 {
        info!(
            estimand = %estimand,
            estimate = report.estimate,
            initial = report.initial_estimate,
            epsilon = fluctuation.epsilon(),
            "TMLE done"
        );
    }
    Ok((
        TargetedEstimate {
            estimate: report.estimate,
            influence_curve: report.influence_curve,
            initial_estimate: report.initial_estimate,
        },
        fluctuation,
    ))
}

/// One-step estimate: plug-in plus the mean of its influence curve.
pub fn ose(
    fitter: &mut NuisanceFitter,
    estimand: &Estimand,
    dataset: &Dataset,
    options: &EstimationOptions,
) -> Result<(OneStepEstimate, OutcomeModel)> {
    let prepared = Prepared::new(fitter, estimand, dataset, options)?;
    let covariate = prepared.observed_covariate()?;

    let observed = prepared.fits.outcome.expected_value(&prepared.x)?;
    let report = prepared
        .inputs()
        .estimation_report(None, &covariate, &observed, &prepared.y)?;
    let estimate = report.initial_estimate + mean(&report.influence_curve);
    if options.verbosity >= 1 {
        info!(
            estimand = %estimand,
            estimate,
            initial = report.initial_estimate,
            "OSE done"
        );
    }
    Ok((
        OneStepEstimate {
            estimate,
            influence_curve: report.influence_curve,
            initial_estimate: report.initial_estimate,
        },
        prepared.fits.outcome,
    ))
}

/// Signed plug-in contrast of the initial outcome model; no targeting.
pub fn naive_plugin_estimate(
    fitter: &mut NuisanceFitter,
    estimand: &Estimand,
    dataset: &Dataset,
    options: &EstimationOptions,
) -> Result<f64> {
    let prepared = Prepared::new(fitter, estimand, dataset, options)?;
    let aggregates = prepared.inputs().aggregate(None)?;
    let estimate = mean(&aggregates.initial);
    if options.verbosity >= 1 {
        info!(estimand = %estimand, estimate, "Naive plug-in done");
    }
    Ok(estimate)
}
