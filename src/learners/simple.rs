//! Stratified means and column-restricted wrappers.
//!
//! These exist mostly to express deliberately misspecified outcome models,
//! e.g. an outcome regression that ignores the confounders.

use std::collections::HashMap;
use std::rc::Rc;

use super::{Classifier, FittedClassifier, FittedRegressor, Regressor};
use crate::data::Matrix;
use crate::error::{Result, TmleError};
use crate::numeric::mean;

/// Columns of `x` named `p` or dummy-encoded from `p` (`"{p}__level"`).
fn select_matching(x: &Matrix, patterns: &[String]) -> Result<Matrix> {
    let names: Vec<String> = x
        .names()
        .iter()
        .filter(|n| {
            patterns
                .iter()
                .any(|p| *n == p || n.starts_with(&format!("{p}__")))
        })
        .cloned()
        .collect();
    if names.is_empty() && !patterns.is_empty() {
        return Err(TmleError::MissingColumn(patterns.join(", ")));
    }
    x.select(&names)
}

// ============================================================================
// GroupMean
// ============================================================================

/// Mean outcome within each stratum of the named columns.
///
/// Strata not seen during fitting fall back to the overall mean.
#[derive(Debug, Clone, Default)]
pub struct GroupMean {
    pub columns: Vec<String>,
}

impl GroupMean {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn fit_means(&self, x: &Matrix, y: &[f64]) -> Result<FittedGroupMean> {
        TmleError::check_len(x.nrows(), y.len())?;
        if y.is_empty() {
            return Err(TmleError::config("cannot fit a group mean on zero observations"));
        }
        let strata = select_matching(x, &self.columns)?;
        let mut sums: HashMap<Vec<u64>, (f64, usize)> = HashMap::new();
        for (i, &v) in y.iter().enumerate() {
            let entry = sums.entry(stratum_key(&strata, i)).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
        Ok(FittedGroupMean {
            columns: self.columns.clone(),
            means: sums
                .into_iter()
                .map(|(k, (s, c))| (k, s / c as f64))
                .collect(),
            overall: mean(y),
        })
    }
}

fn stratum_key(strata: &Matrix, row: usize) -> Vec<u64> {
    strata.columns().map(|c| c[row].to_bits()).collect()
}

#[derive(Debug, Clone)]
pub struct FittedGroupMean {
    columns: Vec<String>,
    means: HashMap<Vec<u64>, f64>,
    overall: f64,
}

impl FittedGroupMean {
    fn predict_means(&self, x: &Matrix) -> Result<Vec<f64>> {
        let strata = select_matching(x, &self.columns)?;
        Ok((0..x.nrows())
            .map(|i| {
                self.means
                    .get(&stratum_key(&strata, i))
                    .copied()
                    .unwrap_or(self.overall)
            })
            .collect())
    }
}

impl Regressor for GroupMean {
    fn name(&self) -> String {
        format!("group_mean({})", self.columns.join(","))
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedRegressor>> {
        Ok(Rc::new(self.fit_means(x, y)?))
    }
}

impl Classifier for GroupMean {
    fn name(&self) -> String {
        format!("group_mean({})", self.columns.join(","))
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedClassifier>> {
        Ok(Rc::new(self.fit_means(x, y)?))
    }
}

impl FittedRegressor for FittedGroupMean {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.predict_means(x)
    }
}

impl FittedClassifier for FittedGroupMean {
    fn predict_target_class_prob(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.predict_means(x)
    }
}

// ============================================================================
// Selecting
// ============================================================================

/// Fits `inner` on a subset of the design-matrix columns only.
#[derive(Debug, Clone)]
pub struct Selecting<L> {
    pub columns: Vec<String>,
    pub inner: L,
}

impl<L> Selecting<L> {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, inner: L) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            inner,
        }
    }
}

#[derive(Debug)]
struct SelectedRegressor {
    columns: Vec<String>,
    inner: Rc<dyn FittedRegressor>,
}

#[derive(Debug)]
struct SelectedClassifier {
    columns: Vec<String>,
    inner: Rc<dyn FittedClassifier>,
}

impl<L: Regressor> Regressor for Selecting<L> {
    fn name(&self) -> String {
        format!("{}[{}]", self.inner.name(), self.columns.join(","))
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedRegressor>> {
        let inner = self.inner.fit(&select_matching(x, &self.columns)?, y)?;
        Ok(Rc::new(SelectedRegressor {
            columns: self.columns.clone(),
            inner,
        }))
    }
}

impl<L: Classifier> Classifier for Selecting<L> {
    fn name(&self) -> String {
        format!("{}[{}]", self.inner.name(), self.columns.join(","))
    }

    fn fit(&self, x: &Matrix, y: &[f64]) -> Result<Rc<dyn FittedClassifier>> {
        let inner = self.inner.fit(&select_matching(x, &self.columns)?, y)?;
        Ok(Rc::new(SelectedClassifier {
            columns: self.columns.clone(),
            inner,
        }))
    }
}

impl FittedRegressor for SelectedRegressor {
    fn predict(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.inner.predict(&select_matching(x, &self.columns)?)
    }
}

impl FittedClassifier for SelectedClassifier {
    fn predict_target_class_prob(&self, x: &Matrix) -> Result<Vec<f64>> {
        self.inner
            .predict_target_class_prob(&select_matching(x, &self.columns)?)
    }
}
