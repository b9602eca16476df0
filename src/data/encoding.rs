//! Treatment-encoding transform.
//!
//! Learned once on the observed table and applied unchanged to every
//! counterfactual table, so dummy columns line up across all predictions.

use super::{Column, Dataset, Matrix};
use crate::error::{Result, TmleError};

/// Turns a table into a numeric design matrix.
pub trait Encoder {
    fn fit(&mut self, table: &Dataset) -> Result<()>;
    fn transform(&self, table: &Dataset) -> Result<Matrix>;
}

/// Dummy/one-hot encoding of factor columns; floats pass through.
///
/// Dummy columns are named `"{column}__{level}"`.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    /// Drop the first level of each factor (keeps intercept models identifiable).
    pub drop_first: bool,
    fitted: Option<Vec<(String, Option<Vec<String>>)>>,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OneHotEncoder {
    pub const fn new(drop_first: bool) -> Self {
        Self {
            drop_first,
            fitted: None,
        }
    }

    pub fn dummy_name(column: &str, level: &str) -> String {
        format!("{column}__{level}")
    }

    pub const fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

impl Encoder for OneHotEncoder {
    fn fit(&mut self, table: &Dataset) -> Result<()> {
        let schema = table
            .columns()
            .map(|(name, column)| {
                let levels = column.as_factor().map(|f| f.levels().to_vec());
                (name.to_string(), levels)
            })
            .collect();
        self.fitted = Some(schema);
        Ok(())
    }

    fn transform(&self, table: &Dataset) -> Result<Matrix> {
        let schema = self
            .fitted
            .as_ref()
            .ok_or_else(|| TmleError::interface("encoder used before fit"))?;
        let mut out = Matrix::empty(table.nrows());
        for (name, levels) in schema {
            match (table.get(name)?, levels) {
                (Column::Float(v), None) => out.push_column(name.clone(), v.clone())?,
                (Column::Factor(f), Some(levels)) => {
                    if f.levels() != levels.as_slice() {
                        return Err(TmleError::interface(format!(
                            "column '{name}' has a level set that differs from the fitted one"
                        )));
                    }
                    let skip = usize::from(self.drop_first);
                    for (code, level) in levels.iter().enumerate().skip(skip) {
                        let dummy = f
                            .codes()
                            .iter()
                            .map(|&c| if c as usize == code { 1.0 } else { 0.0 })
                            .collect();
                        out.push_column(Self::dummy_name(name, level), dummy)?;
                    }
                }
                _ => {
                    return Err(TmleError::interface(format!(
                        "column '{name}' changed type since the encoder was fitted"
                    )))
                }
            }
        }
        Ok(out)
    }
}
