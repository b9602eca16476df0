//! Estimation Regression Tests
//!
//! End-to-end runs of `tmle`, `ose` and `naive_plugin_estimate` on seeded
//! simulated data with a known truth. Tolerances are a few standard errors
//! of the estimate, so a regression in targeting or inference shows up as
//! a miss rather than as noise.

use tmle::learners::{FactorizedDensity, LinearRegression, LogisticRegression, Selecting};
use tmle::nuisance::NuisanceFitter;
use tmle::numeric::mean;
use tmle::simulation::{binary_confounded, continuous_interaction, Simulated};
use tmle::targeting::{naive_plugin_estimate, ose, tmle, EstimationOptions, Tail};
use tmle::{Column, Dataset, Estimand, Factor, Query, TmleError};

fn quiet() -> EstimationOptions {
    EstimationOptions {
        verbosity: 0,
        ..EstimationOptions::default()
    }
}

fn binary(n: usize) -> Simulated {
    binary_confounded(n, 2024).expect("simulation")
}

/// Rebuild `sim` in row order `order`, letting every factor infer its
/// levels from the raw values.
fn rebuilt_from_values(sim: &Simulated, order: &[usize]) -> Dataset {
    let ds = &sim.dataset;
    let w = ds.floats("W").expect("W");
    let labels = |name: &str| -> Vec<String> {
        let f = ds.factor(name).expect("factor");
        order.iter().map(|&i| f.level_of(i).to_string()).collect()
    };
    Dataset::new()
        .with_column("W", Column::Float(order.iter().map(|&i| w[i]).collect()))
        .and_then(|d| d.with_column("T", Column::Factor(Factor::from_values(&labels("T")))))
        .and_then(|d| d.with_column("Y", Column::Factor(Factor::from_values(&labels("Y")))))
        .expect("dataset")
}

/// Outcome model that sees only the treatment, so it cannot adjust for `W`.
fn treatment_only_fitter(treatments: &[&str]) -> NuisanceFitter {
    NuisanceFitter::new(
        Selecting::new(treatments.iter().copied(), LinearRegression::default()),
        Selecting::new(treatments.iter().copied(), LogisticRegression::default()),
        FactorizedDensity::default(),
    )
}

// ============================================================================
// Binary outcome, confounded treatment
// ============================================================================

#[test]
fn tmle_recovers_ate_with_correct_models() {
    let sim = binary(5000);
    let mut fitter = NuisanceFitter::default();
    let (estimate, fluctuation) = tmle(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let report = estimate.report(Tail::Both).unwrap();

    let error = (estimate.estimate - sim.truth).abs();
    assert!(error < 4.0 * report.stderror, "error {error}, se {}", report.stderror);
    assert!(error < 0.1);
    assert!(report.confint.0 < report.estimate && report.estimate < report.confint.1);
    // With a correct outcome model the fluctuation barely moves it.
    assert!(fluctuation.epsilon().abs() < 0.1, "epsilon {}", fluctuation.epsilon());
}

#[test]
fn ose_and_tmle_agree_to_first_order() {
    let sim = binary(5000);
    let mut fitter = NuisanceFitter::default();
    let (targeted, _) = tmle(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let (one_step, _) = ose(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    assert!(
        (targeted.estimate - one_step.estimate).abs() < 0.02,
        "tmle {} vs ose {}",
        targeted.estimate,
        one_step.estimate
    );
    assert_eq!(targeted.initial_estimate, one_step.initial_estimate);
}

#[test]
fn targeted_influence_curve_has_zero_mean() {
    let sim = binary(3000);
    let (estimate, _) = tmle(&mut NuisanceFitter::default(), &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let report = estimate.report(Tail::Both).unwrap();
    assert!(report.mean_influence_curve.abs() < 1e-4, "mean IC {}", report.mean_influence_curve);
    assert_eq!(estimate.influence_curve.len(), 3000);
}

#[test]
fn targeting_removes_outcome_model_bias() {
    let sim = binary(5000);
    let mut fitter = treatment_only_fitter(&["T"]);

    let naive = naive_plugin_estimate(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let (targeted, _) = tmle(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let (one_step, _) = ose(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();

    let naive_error = (naive - sim.truth).abs();
    let tmle_error = (targeted.estimate - sim.truth).abs();
    let ose_error = (one_step.estimate - sim.truth).abs();
    assert!(naive_error > 0.1, "naive {naive}, truth {}", sim.truth);
    assert!(tmle_error < naive_error);
    assert!(tmle_error < 0.08, "tmle {}, truth {}", targeted.estimate, sim.truth);
    assert!(ose_error < 0.08, "ose {}, truth {}", one_step.estimate, sim.truth);
    // The naive estimate is the initial estimate of the targeted run.
    assert!((targeted.initial_estimate - naive).abs() < 1e-12);
}

#[test]
fn weighted_fluctuation_is_also_consistent() {
    let sim = binary(5000);
    let options = EstimationOptions {
        weighted_fluctuation: true,
        ..quiet()
    };
    let mut fitter = treatment_only_fitter(&["T"]);
    let (weighted, fluctuation) = tmle(&mut fitter, &sim.estimand, &sim.dataset, &options).unwrap();
    assert!(fluctuation.is_weighted());
    let report = weighted.report(Tail::Both).unwrap();
    let error = (weighted.estimate - sim.truth).abs();
    assert!(error < 4.0 * report.stderror + 0.01, "error {error}, se {}", report.stderror);
}

#[test]
fn binary_outcome_estimate_does_not_depend_on_row_order() {
    let sim = binary(2000);
    let y = sim.dataset.factor("Y").unwrap();
    let first_one = (0..y.len()).find(|&i| y.level_of(i) == "1").unwrap();
    let first_zero = (0..y.len()).find(|&i| y.level_of(i) == "0").unwrap();

    // One table starts with Y = "0", the other with Y = "1".
    let mut zero_first: Vec<usize> = (0..y.len()).collect();
    zero_first.swap(0, first_zero);
    let mut one_first: Vec<usize> = (0..y.len()).collect();
    one_first.swap(0, first_one);

    let a = rebuilt_from_values(&sim, &zero_first);
    let b = rebuilt_from_values(&sim, &one_first);
    assert_eq!(b.factor("Y").unwrap().levels(), ["0", "1"]);

    let (on_a, _) = tmle(&mut NuisanceFitter::default(), &sim.estimand, &a, &quiet()).unwrap();
    let (on_b, _) = tmle(&mut NuisanceFitter::default(), &sim.estimand, &b, &quiet()).unwrap();
    let (on_sim, _) = tmle(&mut NuisanceFitter::default(), &sim.estimand, &sim.dataset, &quiet()).unwrap();
    assert!((on_a.estimate - on_b.estimate).abs() < 1e-6, "{} vs {}", on_a.estimate, on_b.estimate);
    assert!((on_a.estimate - on_sim.estimate).abs() < 1e-6);
    assert!(on_a.estimate > 0.0);
}

#[test]
fn absent_level_is_rejected_before_any_fit() {
    let sim = binary(200);
    let estimand = Estimand::ate("Y", Query::new().with("T", ["yes", "0"]), vec!["W".into()]).unwrap();
    let mut fitter = NuisanceFitter::default();
    let err = tmle(&mut fitter, &estimand, &sim.dataset, &quiet()).unwrap_err();
    assert_eq!(
        err,
        TmleError::DataMismatch {
            variable: "T".into(),
            level: "yes".into()
        }
    );
    assert_eq!(fitter.fits_performed(), 0);
}

#[test]
fn nuisance_fits_are_shared_across_estimators() {
    let sim = binary(1000);
    let mut fitter = NuisanceFitter::default();
    tmle(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    ose(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    naive_plugin_estimate(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    assert_eq!(fitter.fits_performed(), 2);

    let forced = EstimationOptions { force: true, ..quiet() };
    tmle(&mut fitter, &sim.estimand, &sim.dataset, &forced).unwrap();
    assert_eq!(fitter.fits_performed(), 4);
}

#[test]
fn conditional_mean_of_treated_arm() {
    let sim = binary(4000);
    let estimand = Estimand::conditional_mean("Y", Query::new().with("T", [1]), vec!["W".into()]).unwrap();
    let (estimate, _) = tmle(&mut NuisanceFitter::default(), &estimand, &sim.dataset, &quiet()).unwrap();
    // E[Y(1)] = E[expit(0.5 + 1.2 W)], about 0.6
    assert!(estimate.estimate > 0.5 && estimate.estimate < 0.7, "{}", estimate.estimate);
}

// ============================================================================
// Continuous outcome, two interacting treatments
// ============================================================================

#[test]
fn interaction_effect_is_recovered_by_targeting() {
    let sim = continuous_interaction(5000, 99).unwrap();
    let mut fitter = NuisanceFitter::default();

    // An additive outcome model has no interaction at all.
    let naive = naive_plugin_estimate(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    assert!(naive.abs() < 1e-8, "naive {naive}");

    let (estimate, fluctuation) = tmle(&mut fitter, &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let report = estimate.report(Tail::Right).unwrap();
    let error = (estimate.estimate - sim.truth).abs();
    assert!(error < 4.0 * report.stderror, "estimate {}, truth {}, se {}", estimate.estimate, sim.truth, report.stderror);
    assert!(report.pvalue < 0.01);
    assert!(fluctuation.epsilon().abs() > 0.0);
    assert!(mean(&estimate.influence_curve).abs() < 1e-6);
}

#[test]
fn interaction_requires_two_treatments() {
    let err = Estimand::iate("Y", Query::new().with("T1", [1, 0]), vec!["W".into()]).unwrap_err();
    assert!(matches!(err, TmleError::Configuration(_)));
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn report_serializes_to_json() {
    let sim = binary(1000);
    let (estimate, _) = tmle(&mut NuisanceFitter::default(), &sim.estimand, &sim.dataset, &quiet()).unwrap();
    let json = serde_json::to_value(estimate.report(Tail::Both).unwrap()).unwrap();
    for key in ["pvalue", "confint", "estimate", "stderror", "initial_estimate", "mean_influence_curve"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn invalid_tail_is_configuration_error() {
    assert!(matches!("two-sided".parse::<Tail>(), Err(TmleError::Configuration(_))));
}
