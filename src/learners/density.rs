//! Joint treatment density models `g(T | W)`.

use std::collections::HashMap;
use std::rc::Rc;

use super::glm::{FittedGlm, GlmSettings};
use super::regression::LogisticRegression;
use super::{DensityLearner, DensityModel};
use crate::data::{Dataset, Encoder, Factor, Matrix, OneHotEncoder};
use crate::error::{Result, TmleError};

fn treatment_factors(t: &Dataset) -> Result<Vec<(&str, &Factor)>> {
    if t.ncols() == 0 {
        return Err(TmleError::config("density model needs at least one treatment column"));
    }
    t.columns()
        .map(|(name, column)| {
            column
                .as_factor()
                .map(|f| (name, f))
                .ok_or_else(|| TmleError::config(format!("treatment '{name}' must be categorical")))
        })
        .collect()
}

// ============================================================================
// FactorizedDensity
// ============================================================================

/// Chain-rule factorization `g(t1..tk | W) = prod_i g(ti | W, t1..t(i-1))`.
///
/// Two-level treatments get a logistic regression; treatments with more
/// levels get one-vs-rest logistic regressions normalized to sum to one.
#[derive(Debug, Clone, Default)]
pub struct FactorizedDensity {
    pub settings: GlmSettings,
}

impl FactorizedDensity {
    pub fn new(settings: GlmSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Clone)]
enum ConditionalFit {
    /// Single-level treatment: probability one.
    Degenerate,
    /// P(level[1] | parents)
    Binary(FittedGlm),
    /// One model per level, normalized at prediction time.
    OneVsRest(Vec<FittedGlm>),
}

#[derive(Debug, Clone)]
struct ConditionalFactor {
    variable: String,
    parents: Vec<String>,
    fit: ConditionalFit,
}

#[derive(Debug, Clone)]
pub struct FittedFactorizedDensity {
    w_encoder: OneHotEncoder,
    t_encoder: OneHotEncoder,
    factors: Vec<ConditionalFactor>,
}

impl DensityLearner for FactorizedDensity {
    fn name(&self) -> String {
        "factorized_logistic_density".to_string()
    }

    fn fit(&self, w: &Dataset, t: &Dataset) -> Result<Rc<dyn DensityModel>> {
        TmleError::check_len(t.nrows(), w.nrows())?;
        let treatments = treatment_factors(t)?;

        let mut w_encoder = OneHotEncoder::default();
        w_encoder.fit(w)?;
        let mut t_encoder = OneHotEncoder::default();
        t_encoder.fit(t)?;
        let xw = w_encoder.transform(w)?;
        let xt = t_encoder.transform(t)?;
        let x = xw.hstack(&xt)?;

        let learner = LogisticRegression::new(self.settings);
        let mut parents: Vec<String> = xw.names().to_vec();
        let mut factors = Vec::with_capacity(treatments.len());

        for (name, factor) in treatments {
            let design = x.select(&parents)?;
            let indicator = |level: u32| -> Vec<f64> {
                factor
                    .codes()
                    .iter()
                    .map(|&c| if c == level { 1.0 } else { 0.0 })
                    .collect()
            };
            let fit = match factor.levels().len() {
                0 | 1 => ConditionalFit::Degenerate,
                2 => ConditionalFit::Binary(learner.fit_glm(&design, &indicator(1))?),
                k => ConditionalFit::OneVsRest(
                    (0..k as u32)
                        .map(|level| learner.fit_glm(&design, &indicator(level)))
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            factors.push(ConditionalFactor {
                variable: name.to_string(),
                parents: parents.clone(),
                fit,
            });
            parents.extend(xt.names_with_prefix(&format!("{name}__")));
        }

        Ok(Rc::new(FittedFactorizedDensity {
            w_encoder,
            t_encoder,
            factors,
        }))
    }
}

impl DensityModel for FittedFactorizedDensity {
    fn density(&self, w: &Dataset, t: &Dataset) -> Result<Vec<f64>> {
        TmleError::check_len(t.nrows(), w.nrows())?;
        let x = self.w_encoder.transform(w)?.hstack(&self.t_encoder.transform(t)?)?;
        let mut likelihood = vec![1.0; t.nrows()];

        for factor in &self.factors {
            let codes = t.factor(&factor.variable)?.codes();
            let design: Matrix = x.select(&factor.parents)?;
            match &factor.fit {
                ConditionalFit::Degenerate => {}
                ConditionalFit::Binary(glm) => {
                    let p1 = glm.predict_mean(&design, None)?;
                    for ((l, p), &c) in likelihood.iter_mut().zip(p1).zip(codes) {
                        *l *= if c == 1 { p } else { 1.0 - p };
                    }
                }
                ConditionalFit::OneVsRest(models) => {
                    let scores = models
                        .iter()
                        .map(|m| m.predict_mean(&design, None))
                        .collect::<Result<Vec<_>>>()?;
                    for (i, (l, &c)) in likelihood.iter_mut().zip(codes).enumerate() {
                        let total: f64 = scores.iter().map(|s| s[i]).sum();
                        *l *= scores[c as usize][i] / total;
                    }
                }
            }
        }
        Ok(likelihood)
    }
}

// ============================================================================
// MarginalFrequency
// ============================================================================

/// Empirical frequency of each joint treatment pattern, ignoring `W`.
///
/// Appropriate when treatment assignment is randomized. Patterns never seen
/// during fitting get density zero (and are plateaued downstream).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarginalFrequency;

#[derive(Debug, Clone)]
pub struct FittedMarginalFrequency {
    schema: Vec<(String, Vec<String>)>,
    counts: HashMap<Vec<u32>, usize>,
    total: usize,
}

impl FittedMarginalFrequency {
    fn pattern_keys(&self, t: &Dataset) -> Result<Vec<Vec<u32>>> {
        let mut columns = Vec::with_capacity(self.schema.len());
        for (name, levels) in &self.schema {
            let f = t.factor(name)?;
            if f.levels() != levels.as_slice() {
                return Err(TmleError::interface(format!(
                    "treatment '{name}' has a level set the density model was not fitted on"
                )));
            }
            columns.push(f.codes());
        }
        Ok((0..t.nrows())
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect())
    }
}

impl DensityLearner for MarginalFrequency {
    fn name(&self) -> String {
        "marginal_frequency".to_string()
    }

    fn fit(&self, w: &Dataset, t: &Dataset) -> Result<Rc<dyn DensityModel>> {
        TmleError::check_len(t.nrows(), w.nrows())?;
        let schema = treatment_factors(t)?
            .into_iter()
            .map(|(name, f)| (name.to_string(), f.levels().to_vec()))
            .collect();
        let mut model = FittedMarginalFrequency {
            schema,
            counts: HashMap::new(),
            total: t.nrows(),
        };
        for key in model.pattern_keys(t)? {
            *model.counts.entry(key).or_insert(0) += 1;
        }
        Ok(Rc::new(model))
    }
}

impl DensityModel for FittedMarginalFrequency {
    fn density(&self, w: &Dataset, t: &Dataset) -> Result<Vec<f64>> {
        TmleError::check_len(t.nrows(), w.nrows())?;
        let total = self.total.max(1) as f64;
        Ok(self
            .pattern_keys(t)?
            .iter()
            .map(|k| self.counts.get(k).map_or(0.0, |&c| c as f64 / total))
            .collect())
    }
}
