//! Causal estimands and their treatment queries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{Result, TmleError};

// ============================================================================
// Query
// ============================================================================

/// Ordered mapping from treatment variable to its levels.
///
/// The first level of each variable is the reference ("case") value and
/// contributes with a positive sign; the following ones are comparison
/// values. Variable order is insertion order and is what every enumeration
/// downstream iterates in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    entries: Vec<(String, Vec<String>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a treatment variable. Levels can be anything displayable, e.g.
    /// `query.with("T", [1, 0])`.
    #[must_use]
    pub fn with<L: ToString>(mut self, variable: impl Into<String>, levels: impl IntoIterator<Item = L>) -> Self {
        self.entries.push((
            variable.into(),
            levels.into_iter().map(|l| l.to_string()).collect(),
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(v, _)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, Vec<String>)] {
        &self.entries
    }

    pub fn levels(&self, variable: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, l)| l.as_slice())
    }

    /// Structural checks: non-empty, every variable has levels, no duplicates.
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(TmleError::config("query must name at least one treatment"));
        }
        for (i, (variable, levels)) in self.entries.iter().enumerate() {
            if levels.is_empty() {
                return Err(TmleError::config(format!("treatment '{variable}' has no levels in the query")));
            }
            if self.entries[..i].iter().any(|(v, _)| v == variable) {
                return Err(TmleError::config(format!("treatment '{variable}' appears twice in the query")));
            }
            for (j, level) in levels.iter().enumerate() {
                if levels[..j].contains(level) {
                    return Err(TmleError::config(format!(
                        "level '{level}' of treatment '{variable}' appears twice in the query"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every queried level must actually occur in the dataset's column.
    pub fn check_levels_present(&self, dataset: &Dataset) -> Result<()> {
        for (variable, levels) in &self.entries {
            let factor = dataset.factor(variable)?;
            if let Some(level) = levels.iter().find(|l| !factor.is_observed(l)) {
                return Err(TmleError::DataMismatch {
                    variable: variable.clone(),
                    level: level.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(v, l)| format!("{v}: [{}]", l.join(", ")))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

// ============================================================================
// Estimand
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimandKind {
    /// `E[Y(t)]` for a single treatment pattern.
    ConditionalMean,
    /// `E[Y(case)] - E[Y(control)]`.
    Ate,
    /// Interaction effect of two or more treatments.
    Iate,
}

impl fmt::Display for EstimandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConditionalMean => write!(f, "CM"),
            Self::Ate => write!(f, "ATE"),
            Self::Iate => write!(f, "IATE"),
        }
    }
}

/// A target parameter: which contrast of which outcome, adjusted for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimand {
    pub kind: EstimandKind,
    pub outcome: String,
    pub query: Query,
    /// Adjustment set for both nuisance models.
    pub confounders: Vec<String>,
    /// Extra outcome-model inputs that do not enter the treatment density.
    #[serde(default)]
    pub covariates: Vec<String>,
}

impl Estimand {
    pub fn new(
        kind: EstimandKind,
        outcome: impl Into<String>,
        query: Query,
        confounders: Vec<String>,
    ) -> Result<Self> {
        let estimand = Self {
            kind,
            outcome: outcome.into(),
            query,
            confounders,
            covariates: Vec::new(),
        };
        estimand.validate()?;
        Ok(estimand)
    }

    pub fn conditional_mean(outcome: impl Into<String>, query: Query, confounders: Vec<String>) -> Result<Self> {
        Self::new(EstimandKind::ConditionalMean, outcome, query, confounders)
    }

    pub fn ate(outcome: impl Into<String>, query: Query, confounders: Vec<String>) -> Result<Self> {
        Self::new(EstimandKind::Ate, outcome, query, confounders)
    }

    pub fn iate(outcome: impl Into<String>, query: Query, confounders: Vec<String>) -> Result<Self> {
        Self::new(EstimandKind::Iate, outcome, query, confounders)
    }

    #[must_use]
    pub fn with_covariates(mut self, covariates: Vec<String>) -> Self {
        self.covariates = covariates;
        self
    }

    pub fn treatments(&self) -> Vec<String> {
        self.query.variables().map(str::to_string).collect()
    }

    /// Outcome-model inputs: confounders, covariates, then treatments.
    pub fn outcome_parents(&self) -> Vec<String> {
        self.confounders
            .iter()
            .chain(&self.covariates)
            .cloned()
            .chain(self.treatments())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        self.query.validate()?;
        let level_counts: Vec<usize> = self.query.entries().iter().map(|(_, l)| l.len()).collect();
        match self.kind {
            EstimandKind::ConditionalMean if level_counts.iter().any(|&c| c != 1) => Err(TmleError::config(
                "a conditional mean needs exactly one level per treatment",
            )),
            EstimandKind::Ate if level_counts.iter().any(|&c| c != 2) => Err(TmleError::config(
                "an ATE needs exactly two levels (case, control) per treatment",
            )),
            EstimandKind::Iate if level_counts.len() < 2 => Err(TmleError::config(
                "an interaction effect needs at least two treatments",
            )),
            EstimandKind::Iate if level_counts.iter().any(|&c| c < 2) => Err(TmleError::config(
                "an interaction effect needs at least two levels per treatment",
            )),
            _ => {
                let treatments = self.treatments();
                if treatments.contains(&self.outcome) {
                    return Err(TmleError::config("the outcome cannot also be a treatment"));
                }
                if let Some(c) = self.confounders.iter().find(|c| treatments.contains(c)) {
                    return Err(TmleError::config(format!("'{c}' is both a treatment and a confounder")));
                }
                if let Some(c) = self.covariates.iter().find(|c| treatments.contains(c)) {
                    return Err(TmleError::config(format!("'{c}' is both a treatment and a covariate")));
                }
                if self.confounders.contains(&self.outcome) || self.covariates.contains(&self.outcome) {
                    return Err(TmleError::config(format!(
                        "the outcome '{}' cannot also be an outcome-model input",
                        self.outcome
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Estimand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} | {})", self.kind, self.outcome, self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Factor};

    #[test]
    fn query_keeps_insertion_order() {
        let q = Query::new().with("B", [1, 0]).with("A", ["x", "y"]);
        assert_eq!(q.variables().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(q.levels("B").unwrap(), &["1", "0"]);
        assert_eq!(q.to_string(), "{B: [1, 0], A: [x, y]}");
    }

    #[test]
    fn empty_query_is_configuration_error() {
        assert!(matches!(Query::new().validate(), Err(TmleError::Configuration(_))));
        let no_levels = Query::new().with("T", Vec::<i32>::new());
        assert!(matches!(no_levels.validate(), Err(TmleError::Configuration(_))));
    }

    #[test]
    fn duplicates_are_rejected() {
        let q = Query::new().with("T", [0, 1]).with("T", [0, 1]);
        assert!(q.validate().is_err());
        let q = Query::new().with("T", [1, 1]);
        assert!(q.validate().is_err());
    }

    #[test]
    fn kinds_check_level_counts() {
        let two = Query::new().with("T", [1, 0]);
        let one = Query::new().with("T", [1]);
        assert!(Estimand::ate("Y", two.clone(), vec![]).is_ok());
        assert!(Estimand::ate("Y", one.clone(), vec![]).is_err());
        assert!(Estimand::conditional_mean("Y", one, vec![]).is_ok());
        assert!(Estimand::iate("Y", two.clone(), vec![]).is_err());
        let pair = two.with("S", ["a", "b"]);
        assert!(Estimand::iate("Y", pair, vec!["W".into()]).is_ok());
    }

    #[test]
    fn covariates_cannot_overlap_outcome_or_treatments() {
        let ate = Estimand::ate("Y", Query::new().with("T", [1, 0]), vec!["W".into()]).unwrap();
        assert!(ate.clone().with_covariates(vec!["C".into()]).validate().is_ok());
        assert!(matches!(
            ate.clone().with_covariates(vec!["T".into()]).validate(),
            Err(TmleError::Configuration(_))
        ));
        assert!(matches!(
            ate.with_covariates(vec!["Y".into()]).validate(),
            Err(TmleError::Configuration(_))
        ));
        assert!(Estimand::ate("Y", Query::new().with("T", [1, 0]), vec!["Y".into()]).is_err());
    }

    #[test]
    fn missing_level_is_data_mismatch() {
        let ds = Dataset::new()
            .with_column("T", Column::Factor(Factor::from_values(&["0", "1", "1"])))
            .unwrap();
        let q = Query::new().with("T", [2, 0]);
        assert_eq!(
            q.check_levels_present(&ds),
            Err(TmleError::DataMismatch {
                variable: "T".into(),
                level: "2".into()
            })
        );
        assert!(Query::new().with("T", [1, 0]).check_levels_present(&ds).is_ok());
    }

    #[test]
    fn outcome_parents_put_treatments_last() {
        let e = Estimand::ate("Y", Query::new().with("T", [1, 0]), vec!["W".into()])
            .unwrap()
            .with_covariates(vec!["C".into()]);
        assert_eq!(e.outcome_parents(), vec!["W", "C", "T"]);
    }
}
