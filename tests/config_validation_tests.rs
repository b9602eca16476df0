//! Config Validation Tests
//!
//! Typo detection, range validation and the mapping from `TmleConfig` to
//! estimator options and nuisance learners.

use tmle::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys, walk_toml_keys,
};
use tmle::config::{ConfigError, OutcomeLearner, PropensityLearner, TmleConfig};
use tmle::simulation::{simulate, Scenario};
use tmle::targeting::{naive_plugin_estimate, Tail, ThresholdRule};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_lowerbound_warns_with_suggestion() {
    let toml_str = r#"
[estimation]
ps_lowerbnd = 0.01
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "estimation.ps_lowerbnd");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("estimation.ps_lowerbound"),
        "Should suggest the correct spelling"
    );
}

#[test]
fn typo_in_section_name_is_reported_once_per_key() {
    let toml_str = r#"
[learner]
outcome = "glm"
"#;
    let warnings = validate_unknown_keys(toml_str);
    let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
    assert_eq!(fields.len(), 2);
    assert!(fields.contains(&"learner"));
    assert!(fields.contains(&"learner.outcome"));
    let section = warnings.iter().find(|w| w.field == "learner").unwrap();
    assert_eq!(section.suggestion.as_deref(), Some("learners"));
}

#[test]
fn typo_still_parses_with_defaults() {
    let config = TmleConfig::from_toml_str("[simulation]\nseeed = 3\n").unwrap();
    assert_eq!(config, TmleConfig::default());
}

#[test]
fn every_serialized_key_is_known() {
    let rendered = TmleConfig::default().to_toml().unwrap();
    let value: toml::Value = rendered.parse().unwrap();
    let known = known_config_keys();
    for key in walk_toml_keys(&value, "") {
        assert!(known.contains(key.as_str()), "'{key}' missing from known_config_keys");
    }
}

#[test]
fn far_away_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert!(suggest_correction("completely_unrelated_key", &known).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn validation_collects_every_error() {
    let toml_str = r#"
[estimation]
ps_lowerbound = 1.5

[fluctuation]
tolerance = 0.0
max_iterations = 0
"#;
    match TmleConfig::from_toml_str(toml_str) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 3, "{errors:?}");
            assert!(errors[0].contains("ps_lowerbound"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn zero_lowerbound_is_only_an_error_for_fixed_rule() {
    let adaptive = "[estimation]\nps_lowerbound = 0.0\n";
    assert!(TmleConfig::from_toml_str(adaptive).is_ok());

    let fixed = "[estimation]\nps_lowerbound = 0.0\nthreshold_rule = \"fixed\"\n";
    assert!(matches!(
        TmleConfig::from_toml_str(fixed),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn unknown_tail_is_a_parse_error() {
    let err = TmleConfig::from_toml_str("[estimation]\ntail = \"sideways\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
    assert!(err.to_string().contains("Config parse error"));
}

#[test]
fn small_sample_with_adaptive_threshold_warns() {
    let mut config = TmleConfig::default();
    config.simulation.n = 10;
    let warnings = validate_ranges(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "simulation.n");

    config.estimation.threshold_rule = ThresholdRule::Fixed;
    assert!(validate_ranges(&config).is_empty());
}

// ============================================================================
// Mapping to estimator inputs
// ============================================================================

#[test]
fn estimation_options_follow_config() {
    let toml_str = r#"
[estimation]
ps_lowerbound = 0.025
threshold_rule = "fixed"
weighted_fluctuation = true
tail = "left"
verbosity = 0

[fluctuation]
max_iterations = 40
tolerance = 1e-9

[learners]
l2 = 0.5
"#;
    let config = TmleConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.estimation.tail, Tail::Left);

    let options = config.estimation_options();
    assert_eq!(options.ps_lowerbound, 0.025);
    assert_eq!(options.threshold_rule, ThresholdRule::Fixed);
    assert!(options.weighted_fluctuation);
    assert_eq!(options.verbosity, 0);
    assert_eq!(options.fluctuation.max_iterations, 40);
    assert_eq!(options.fluctuation.l2, 0.0, "fluctuation is never penalized");
    assert_eq!(config.learner_settings().l2, 0.5);
}

#[test]
fn configured_learners_change_the_plugin_estimate() {
    let mut config = TmleConfig::default();
    config.estimation.verbosity = 0;
    config.simulation.n = 3000;
    let sim = simulate(Scenario::BinaryConfounded, config.simulation.n, config.simulation.seed).unwrap();
    let treatments = sim.estimand.treatments();
    let options = config.estimation_options();

    let mut adjusted = config.nuisance_fitter(&treatments);
    let adjusted_naive = naive_plugin_estimate(&mut adjusted, &sim.estimand, &sim.dataset, &options).unwrap();

    config.learners.outcome = OutcomeLearner::TreatmentOnly;
    config.learners.propensity = PropensityLearner::Marginal;
    let mut unadjusted = config.nuisance_fitter(&treatments);
    let unadjusted_naive = naive_plugin_estimate(&mut unadjusted, &sim.estimand, &sim.dataset, &options).unwrap();

    assert!((adjusted_naive - sim.truth).abs() < 0.05, "adjusted {adjusted_naive}, truth {}", sim.truth);
    assert!(unadjusted_naive - sim.truth > 0.1, "unadjusted {unadjusted_naive}, truth {}", sim.truth);
}

#[test]
fn config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmle.toml");

    let mut config = TmleConfig::default();
    config.simulation.scenario = Scenario::ContinuousInteraction;
    config.estimation.tail = Tail::Right;
    config.save_to_file(&path).unwrap();

    assert_eq!(TmleConfig::load_from_file(&path).unwrap(), config);
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TmleConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}
