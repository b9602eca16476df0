//! Clever covariate: signed indicator over truncated treatment density.

use std::rc::Rc;

use super::indicator::IndicatorTable;
use crate::data::Dataset;
use crate::error::Result;
use crate::learners::DensityModel;
use crate::numeric::{elemwise_divide, plateau, Values};

/// Pieces of the clever covariate for one treatment table.
///
/// The density is a deferred node: nothing is evaluated until one of the
/// fields is realized, and the density model runs at most once.
#[derive(Debug, Clone)]
pub struct CleverCovariate {
    /// Sign of each row's treatment pattern in the contrast (0 if absent).
    pub indicator: Values,
    /// Raw `g(T | W)` as returned by the density model.
    pub density: Values,
    /// `max(g, threshold)`
    pub truncated_density: Values,
    /// `indicator / truncated_density`
    pub covariate: Values,
}

/// Build the clever covariate for treatments `t` given confounders `w`.
pub fn clever_covariate(
    density_model: &Rc<dyn DensityModel>,
    w: &Dataset,
    t: &Dataset,
    indicators: &IndicatorTable,
    threshold: f64,
) -> Result<CleverCovariate> {
    let indicator = Values::from(indicators.row_values(t)?);

    let model = Rc::clone(density_model);
    let (w, t) = (w.clone(), t.clone());
    let density = Values::lazy("treatment_density", move || {
        Ok(model.density(&w, &t)?.into())
    });

    let truncated_density = plateau(&density, threshold);
    let covariate = elemwise_divide(&indicator, &truncated_density)?;
    Ok(CleverCovariate {
        indicator,
        density,
        truncated_density,
        covariate,
    })
}

impl CleverCovariate {
    /// Share of rows whose density was lifted to the threshold.
    pub fn truncated_fraction(&self, threshold: f64) -> Result<f64> {
        let density = self.density.realize()?;
        if density.is_empty() {
            return Ok(0.0);
        }
        let lifted = density.iter().filter(|&&g| g < threshold).count();
        Ok(lifted as f64 / density.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Factor};
    use crate::estimand::Query;
    use crate::learners::{DensityLearner, MarginalFrequency};
    use crate::targeting::indicator::indicator_fns;

    fn assert_close(got: &[f64], want: &[f64]) {
        assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-12, "got {got:?}, want {want:?}");
        }
    }

    fn data() -> (Dataset, Dataset) {
        let w = Dataset::new().with_column("W", Column::Float(vec![0.0; 5])).unwrap();
        let t = Dataset::new()
            .with_column("T", Column::Factor(Factor::from_values(&["1", "1", "1", "1", "0"])))
            .unwrap();
        (w, t)
    }

    #[test]
    fn covariate_is_indicator_over_density() {
        let (w, t) = data();
        let g = MarginalFrequency.fit(&w, &t).unwrap();
        let table = indicator_fns(&Query::new().with("T", [1, 0])).unwrap();
        let h = clever_covariate(&g, &w, &t, &table, 1e-8).unwrap();
        assert!(h.covariate.is_lazy());
        assert_close(&h.covariate.to_vec().unwrap(), &[1.25, 1.25, 1.25, 1.25, -5.0]);
    }

    #[test]
    fn threshold_bounds_the_covariate() {
        let (w, t) = data();
        let g = MarginalFrequency.fit(&w, &t).unwrap();
        let table = indicator_fns(&Query::new().with("T", [1, 0])).unwrap();
        let h = clever_covariate(&g, &w, &t, &table, 0.5).unwrap();
        assert_close(&h.covariate.to_vec().unwrap(), &[1.25, 1.25, 1.25, 1.25, -2.0]);
        assert!((h.truncated_fraction(0.5).unwrap() - 0.2).abs() < 1e-12);
    }
}
