//! Minimal in-memory tabular data.
//!
//! Only what the estimators need: named columns of floats or factors,
//! column selection, and constant counterfactual factor columns that keep
//! the observed level set.

pub mod encoding;
pub mod matrix;

pub use encoding::{Encoder, OneHotEncoder};
pub use matrix::Matrix;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::{Result, TmleError};

// ============================================================================
// Factor
// ============================================================================

/// Categorical column: an ordered level set plus one code per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factor {
    levels: Vec<String>,
    codes: Vec<u32>,
}

impl Factor {
    /// Build from raw values. Levels are sorted with [`compare_levels`], so
    /// the level order does not depend on row order.
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let mut levels: Vec<String> = Vec::new();
        for v in values {
            if !levels.iter().any(|l| l == v.as_ref()) {
                levels.push(v.as_ref().to_string());
            }
        }
        levels.sort_by(|a, b| compare_levels(a, b));
        let codes = values
            .iter()
            .map(|v| {
                levels
                    .iter()
                    .position(|l| l == v.as_ref())
                    .map_or(0, |c| c as u32)
            })
            .collect();
        Self { levels, codes }
    }

    /// Build with an explicit level order. Values outside `levels` are a
    /// data mismatch.
    pub fn with_levels<S: AsRef<str>>(name: &str, levels: Vec<String>, values: &[S]) -> Result<Self> {
        let codes = values
            .iter()
            .map(|v| {
                levels
                    .iter()
                    .position(|l| l == v.as_ref())
                    .map(|c| c as u32)
                    .ok_or_else(|| TmleError::DataMismatch {
                        variable: name.to_string(),
                        level: v.as_ref().to_string(),
                    })
            })
            .collect::<Result<Vec<u32>>>()?;
        Ok(Self { levels, codes })
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn level_of(&self, row: usize) -> &str {
        &self.levels[self.codes[row] as usize]
    }

    pub fn code_of(&self, level: &str) -> Option<u32> {
        self.levels.iter().position(|l| l == level).map(|c| c as u32)
    }

    /// Whether at least one row actually takes `level`.
    pub fn is_observed(&self, level: &str) -> bool {
        self.code_of(level)
            .is_some_and(|code| self.codes.iter().any(|&c| c == code))
    }

    /// Same level set, every row forced to `level`.
    pub fn constant_like(&self, name: &str, level: &str) -> Result<Self> {
        let code = self.code_of(level).ok_or_else(|| TmleError::DataMismatch {
            variable: name.to_string(),
            level: level.to_string(),
        })?;
        Ok(Self {
            levels: self.levels.clone(),
            codes: vec![code; self.codes.len()],
        })
    }
}

/// Level ordering: numeric labels by value ("2" < "10"), before any
/// non-numeric label; everything else lexicographic.
pub fn compare_levels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ============================================================================
// Column / Dataset
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Factor(Factor),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Factor(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn as_factor(&self) -> Option<&Factor> {
        match self {
            Self::Factor(f) => Some(f),
            Self::Float(_) => None,
        }
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Float(v) => {
                0u8.hash(state);
                for x in v {
                    x.to_bits().hash(state);
                }
            }
            Self::Factor(f) => {
                1u8.hash(state);
                f.hash(state);
            }
        }
    }
}

impl Hash for Factor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.levels.hash(state);
        self.codes.hash(state);
    }
}

/// Ordered collection of equally long named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<(String, Column)>,
    /// Kept separately so a selection of zero columns still knows its height.
    nrows: Option<usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column. All columns must share the same length.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if let Some(n) = self.nrows {
            TmleError::check_len(n, column.len())?;
        }
        self.nrows = Some(column.len());
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.nrows.unwrap_or(0)
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn get(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| TmleError::MissingColumn(name.to_string()))
    }

    pub fn factor(&self, name: &str) -> Result<&Factor> {
        self.get(name)?.as_factor().ok_or_else(|| {
            TmleError::config(format!("column '{name}' must be categorical"))
        })
    }

    pub fn floats(&self, name: &str) -> Result<&[f64]> {
        match self.get(name)? {
            Column::Float(v) => Ok(v.as_slice()),
            Column::Factor(_) => Err(TmleError::config(format!("column '{name}' must be numeric"))),
        }
    }

    /// New dataset holding the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|n| Ok((n.as_ref().to_string(), self.get(n.as_ref())?.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            nrows: self.nrows,
        })
    }

    /// Column-wise concatenation. Names in `other` replace ours.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        let mut out = self.clone();
        for (name, column) in &other.columns {
            out = out.with_column(name.clone(), column.clone())?;
        }
        Ok(out)
    }

    /// Stable hash of the named columns' names and contents, used to key
    /// cached model fits.
    pub fn fingerprint<S: AsRef<str>>(&self, names: &[S]) -> Result<u64> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.nrows().hash(&mut hasher);
        for name in names {
            name.as_ref().hash(&mut hasher);
            self.get(name.as_ref())?.hash_into(&mut hasher);
        }
        Ok(hasher.finish())
    }
}
