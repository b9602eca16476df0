//! Error taxonomy for the estimation core.
//!
//! Every failure is surfaced synchronously to the caller. There is no
//! partial-result mode: an estimator either returns a complete
//! (estimate, influence curve) pair or one of these errors.

use thiserror::Error;

/// Errors raised by the estimation pipeline and its reference collaborators.
///
/// `Clone` is required because memoized graph nodes hand the same result
/// to every consumer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TmleError {
    /// Invalid query, tail, option value or outcome class count.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A level referenced by the query is absent from the dataset.
    #[error("Data mismatch: level '{level}' of treatment '{variable}' is not present in the dataset")]
    DataMismatch { variable: String, level: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Length mismatch: expected {expected} rows, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Fit did not converge after {iterations} iterations (deviance {deviance:.6})")]
    Convergence { iterations: usize, deviance: f64 },

    /// The clever covariate carries no information to fit a slope on.
    #[error("Degenerate covariate: {0}")]
    DegenerateCovariate(String),

    /// A collaborator was asked for an operation its model family lacks.
    #[error("Model interface error: {0}")]
    ModelInterface(String),
}

pub type Result<T> = std::result::Result<T, TmleError>;

impl TmleError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    pub(crate) fn interface(msg: impl Into<String>) -> Self {
        Self::ModelInterface(msg.into())
    }

    pub(crate) fn check_len(expected: usize, found: usize) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(Self::LengthMismatch { expected, found })
        }
    }
}
