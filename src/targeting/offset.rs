//! Initial outcome model and the fluctuation offset derived from it.

use std::fmt;
use std::rc::Rc;

use crate::data::Matrix;
use crate::error::Result;
use crate::learners::{FittedClassifier, FittedRegressor, Link};
use crate::numeric::Values;

/// Probabilities are kept this far inside (0, 1) before taking the logit.
const OFFSET_PROBABILITY_FLOOR: f64 = 1e-12;

/// Fitted initial outcome regression, tagged by outcome type.
#[derive(Clone)]
pub enum OutcomeModel {
    /// Deterministic prediction of a continuous outcome.
    Continuous(Rc<dyn FittedRegressor>),
    /// Probability of the target class (second of the two outcome levels).
    Binary {
        model: Rc<dyn FittedClassifier>,
        levels: [String; 2],
    },
}

impl OutcomeModel {
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }

    /// Link under which the offset lives.
    pub const fn link(&self) -> Link {
        match self {
            Self::Continuous(_) => Link::Identity,
            Self::Binary { .. } => Link::Logit,
        }
    }

    /// `E[Y | X]`: the prediction itself, or the target-class probability.
    pub fn expected_value(&self, x: &Matrix) -> Result<Vec<f64>> {
        match self {
            Self::Continuous(model) => model.predict(x),
            Self::Binary { model, .. } => model.predict_target_class_prob(x),
        }
    }

    /// Fixed offset of the fluctuation: the raw mean for continuous
    /// outcomes, the logit of the target-class probability for binary ones.
    pub fn offset(&self, x: &Matrix) -> Result<Values> {
        let expected = Values::from(self.expected_value(x)?);
        Ok(match self {
            Self::Continuous(_) => expected,
            Self::Binary { .. } => expected
                .map("clamp_probability", |p| {
                    p.clamp(OFFSET_PROBABILITY_FLOOR, 1.0 - OFFSET_PROBABILITY_FLOOR)
                })
                .logit(),
        })
    }
}

impl fmt::Debug for OutcomeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous(model) => f.debug_tuple("Continuous").field(model).finish(),
            Self::Binary { model, levels } => f
                .debug_struct("Binary")
                .field("model", model)
                .field("levels", levels)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learners::{Classifier, LinearRegression, LogisticRegression, Regressor};
    use crate::numeric::expit;

    fn x() -> Matrix {
        Matrix::from_columns(4, vec![("a".into(), vec![-1.0, 0.0, 1.0, 2.0])]).unwrap()
    }

    #[test]
    fn continuous_offset_is_identity() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let model = OutcomeModel::Continuous(LinearRegression::default().fit(&x(), &y).unwrap());
        let offset = model.offset(&x()).unwrap().to_vec().unwrap();
        let expected = model.expected_value(&x()).unwrap();
        assert_eq!(offset, expected);
        assert_eq!(model.link(), Link::Identity);
    }

    #[test]
    fn binary_offset_is_logit_of_probability() {
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let model = OutcomeModel::Binary {
            model: LogisticRegression::default().fit(&x(), &y).unwrap(),
            levels: ["no".into(), "yes".into()],
        };
        let p = model.expected_value(&x()).unwrap();
        let offset = model.offset(&x()).unwrap().to_vec().unwrap();
        for (o, p) in offset.iter().zip(&p) {
            assert!((expit(*o) - p).abs() < 1e-12);
        }
        assert!(model.is_binary());
    }
}
