//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::{OutcomeLearner, TmleConfig};
use crate::targeting::ThresholdRule;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `TmleConfig`.
///
/// Kept by hand in step with tmle_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [estimation]
        "estimation",
        "estimation.ps_lowerbound",
        "estimation.threshold_rule",
        "estimation.weighted_fluctuation",
        "estimation.tail",
        "estimation.verbosity",
        // [fluctuation]
        "fluctuation",
        "fluctuation.max_iterations",
        "fluctuation.tolerance",
        // [learners]
        "learners",
        "learners.outcome",
        "learners.propensity",
        "learners.l2",
        // [simulation]
        "simulation",
        "simulation.n",
        "simulation.seed",
        "simulation.scenario",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3. Ties go to the
/// lexicographically smaller key so the hint is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for every key of `raw_toml` that `TmleConfig` does not know.
///
/// Never fails; parse errors are reported by serde afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Values that are legal but probably not intended.
pub fn validate_ranges(config: &TmleConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let lb = config.estimation.ps_lowerbound;
    if lb > 0.1 {
        warnings.push(ValidationWarning {
            field: "estimation.ps_lowerbound".to_string(),
            message: format!(
                "ps_lowerbound = {lb} truncates any treatment rarer than {:.0}%; \
                 estimates will be biased toward the plug-in",
                lb * 100.0
            ),
            suggestion: None,
        });
    }

    if config.fluctuation.tolerance > 1e-4 {
        warnings.push(ValidationWarning {
            field: "fluctuation.tolerance".to_string(),
            message: format!(
                "fluctuation.tolerance = {} is loose; the score equation may not be solved",
                config.fluctuation.tolerance
            ),
            suggestion: None,
        });
    }

    if config.estimation.threshold_rule == ThresholdRule::SampleAdaptive && config.simulation.n < 20 {
        warnings.push(ValidationWarning {
            field: "simulation.n".to_string(),
            message: format!(
                "simulation.n = {} is too small for the sample-adaptive threshold to stay below 1",
                config.simulation.n
            ),
            suggestion: None,
        });
    }

    if config.learners.outcome == OutcomeLearner::TreatmentOnly {
        warnings.push(ValidationWarning {
            field: "learners.outcome".to_string(),
            message: "learners.outcome = \"treatment_only\" ignores confounders; \
                      the plug-in estimate is expected to be biased"
                .to_string(),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
