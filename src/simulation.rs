//! Seeded synthetic datasets with known estimand values.
//!
//! Each scenario returns the dataset, the estimand it was built for and the
//! true value of that estimand, integrated by Monte Carlo over a separate
//! large draw of the confounders.

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use rand_distr::{Bernoulli, Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::defaults::TRUTH_MONTE_CARLO_DRAWS;
use crate::data::{Column, Dataset, Factor};
use crate::error::{Result, TmleError};
use crate::estimand::{Estimand, Query};
use crate::numeric::{expit, mean};

/// Mixed into the seed of the truth integration so it never shares draws
/// with the dataset.
const TRUTH_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// One confounder, binary treatment, binary outcome; estimand is the ATE.
    #[default]
    BinaryConfounded,
    /// One confounder, two binary treatments, continuous outcome; estimand
    /// is their interaction effect.
    ContinuousInteraction,
}

impl FromStr for Scenario {
    type Err = TmleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary_confounded" => Ok(Self::BinaryConfounded),
            "continuous_interaction" => Ok(Self::ContinuousInteraction),
            other => Err(TmleError::config(format!(
                "unknown scenario '{other}', expected binary_confounded or continuous_interaction"
            ))),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BinaryConfounded => "binary_confounded",
            Self::ContinuousInteraction => "continuous_interaction",
        })
    }
}

/// A simulated dataset and the truth it was drawn around.
#[derive(Debug, Clone)]
pub struct Simulated {
    pub dataset: Dataset,
    pub estimand: Estimand,
    pub truth: f64,
}

pub fn simulate(scenario: Scenario, n: usize, seed: u64) -> Result<Simulated> {
    match scenario {
        Scenario::BinaryConfounded => binary_confounded(n, seed),
        Scenario::ContinuousInteraction => continuous_interaction(n, seed),
    }
}

fn standard_normal() -> Result<Normal<f64>> {
    Normal::new(0.0, 1.0).map_err(|e| TmleError::numerical(e.to_string()))
}

fn bernoulli(rng: &mut StdRng, p: f64) -> Result<bool> {
    Ok(Bernoulli::new(p)
        .map_err(|e| TmleError::numerical(e.to_string()))?
        .sample(rng))
}

fn binary_factor(draws: &[bool]) -> Result<Factor> {
    let values: Vec<&str> = draws.iter().map(|&b| if b { "1" } else { "0" }).collect();
    Factor::with_levels("binary", vec!["0".into(), "1".into()], &values)
}

/// Average of `f(w)` over a large standard-normal sample.
fn integrate_over_w(seed: u64, f: impl Fn(f64) -> f64) -> Result<f64> {
    let mut rng = StdRng::seed_from_u64(seed ^ TRUTH_SEED_SALT);
    let normal = standard_normal()?;
    let values: Vec<f64> = (0..TRUTH_MONTE_CARLO_DRAWS)
        .map(|_| f(normal.sample(&mut rng)))
        .collect();
    Ok(mean(&values))
}

// ============================================================================
// Binary outcome, single confounded treatment
// ============================================================================

fn binary_outcome_mean(t: f64, w: f64) -> f64 {
    expit(-0.5 + t + 1.2 * w)
}

/// `W ~ N(0,1)`, `T ~ Bern(expit(0.8 W))`, `Y ~ Bern(expit(-0.5 + T + 1.2 W))`.
///
/// Estimand: ATE of `T = 1` against `T = 0` adjusted for `W`.
pub fn binary_confounded(n: usize, seed: u64) -> Result<Simulated> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = standard_normal()?;

    let mut w = Vec::with_capacity(n);
    let mut t = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let wi = normal.sample(&mut rng);
        let ti = bernoulli(&mut rng, expit(0.8 * wi))?;
        let yi = bernoulli(&mut rng, binary_outcome_mean(f64::from(u8::from(ti)), wi))?;
        w.push(wi);
        t.push(ti);
        y.push(yi);
    }

    let dataset = Dataset::new()
        .with_column("W", Column::Float(w))?
        .with_column("T", Column::Factor(binary_factor(&t)?))?
        .with_column("Y", Column::Factor(binary_factor(&y)?))?;
    let estimand = Estimand::ate("Y", Query::new().with("T", [1, 0]), vec!["W".into()])?;
    let truth = integrate_over_w(seed, |w| binary_outcome_mean(1.0, w) - binary_outcome_mean(0.0, w))?;

    Ok(Simulated {
        dataset,
        estimand,
        truth,
    })
}

// ============================================================================
// Continuous outcome, two interacting treatments
// ============================================================================

fn continuous_outcome_mean(t1: f64, t2: f64, w: f64) -> f64 {
    1.0 + 0.5 * t1 + 0.8 * t2 + 1.5 * t1 * t2 + w + 0.5 * w * t1 * t2
}

/// `W ~ N(0,1)`, `T1 ~ Bern(expit(0.5 W))`, `T2 ~ Bern(expit(0.3 - 0.4 W))`,
/// `Y = 1 + 0.5 T1 + 0.8 T2 + 1.5 T1 T2 + W + 0.5 W T1 T2 + N(0,1)`.
///
/// Estimand: interaction effect of `(T1, T2)` with reference `(1, 1)`,
/// which is `1.5 + 0.5 E[W]`.
pub fn continuous_interaction(n: usize, seed: u64) -> Result<Simulated> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = standard_normal()?;

    let mut w = Vec::with_capacity(n);
    let mut t1 = Vec::with_capacity(n);
    let mut t2 = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let wi = normal.sample(&mut rng);
        let a = bernoulli(&mut rng, expit(0.5 * wi))?;
        let b = bernoulli(&mut rng, expit(0.3 - 0.4 * wi))?;
        let mu = continuous_outcome_mean(f64::from(u8::from(a)), f64::from(u8::from(b)), wi);
        w.push(wi);
        t1.push(a);
        t2.push(b);
        y.push(mu + normal.sample(&mut rng));
    }

    let dataset = Dataset::new()
        .with_column("W", Column::Float(w))?
        .with_column("T1", Column::Factor(binary_factor(&t1)?))?
        .with_column("T2", Column::Factor(binary_factor(&t2)?))?
        .with_column("Y", Column::Float(y))?;
    let query = Query::new().with("T1", [1, 0]).with("T2", [1, 0]);
    let estimand = Estimand::iate("Y", query, vec!["W".into()])?;
    let truth = integrate_over_w(seed, |w| {
        continuous_outcome_mean(1.0, 1.0, w) - continuous_outcome_mean(1.0, 0.0, w)
            - continuous_outcome_mean(0.0, 1.0, w)
            + continuous_outcome_mean(0.0, 0.0, w)
    })?;

    Ok(Simulated {
        dataset,
        estimand,
        truth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_data() {
        let a = binary_confounded(200, 7).unwrap();
        let b = binary_confounded(200, 7).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(a.truth, b.truth);
        let c = binary_confounded(200, 8).unwrap();
        assert_ne!(a.dataset, c.dataset);
    }

    #[test]
    fn binary_truth_is_plausible() {
        let sim = binary_confounded(10, 1).unwrap();
        // expit(0.5) - expit(-0.5) bounds the effect at W = 0.
        assert!(sim.truth > 0.15 && sim.truth < 0.245, "truth {}", sim.truth);
        assert_eq!(sim.dataset.factor("Y").unwrap().levels(), ["0", "1"]);
    }

    #[test]
    fn interaction_truth_is_near_closed_form() {
        let sim = continuous_interaction(10, 3).unwrap();
        assert!((sim.truth - 1.5).abs() < 0.01, "truth {}", sim.truth);
        assert_eq!(sim.estimand.treatments(), ["T1", "T2"]);
    }

    #[test]
    fn scenario_names() {
        for scenario in [Scenario::BinaryConfounded, Scenario::ContinuousInteraction] {
            assert_eq!(scenario.to_string().parse::<Scenario>().unwrap(), scenario);
        }
        assert!(matches!("linear".parse::<Scenario>(), Err(TmleError::Configuration(_))));
    }

    #[test]
    fn treatment_is_confounded() {
        let sim = binary_confounded(4000, 5).unwrap();
        let w = sim.dataset.floats("W").unwrap();
        let t = sim.dataset.factor("T").unwrap();
        let treated: Vec<f64> = (0..w.len()).filter(|&i| t.level_of(i) == "1").map(|i| w[i]).collect();
        let control: Vec<f64> = (0..w.len()).filter(|&i| t.level_of(i) == "0").map(|i| w[i]).collect();
        assert!(mean(&treated) - mean(&control) > 0.3);
    }
}
