//! Dense column-major design matrix.

use crate::error::{Result, TmleError};

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    nrows: usize,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Matrix {
    pub const fn empty(nrows: usize) -> Self {
        Self {
            nrows,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn from_columns(nrows: usize, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut m = Self::empty(nrows);
        for (name, values) in columns {
            m.push_column(name, values)?;
        }
        Ok(m)
    }

    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        TmleError::check_len(self.nrows, values.len())?;
        self.names.push(name.into());
        self.columns.push(values);
        Ok(())
    }

    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.columns[j]
    }

    pub fn columns(&self) -> impl Iterator<Item = &[f64]> {
        self.columns.iter().map(Vec::as_slice)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.columns[j][i]
    }

    /// Sub-matrix of the named columns.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut out = Self::empty(self.nrows);
        for name in names {
            let name = name.as_ref();
            let j = self
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| TmleError::MissingColumn(name.to_string()))?;
            out.push_column(name, self.columns[j].clone())?;
        }
        Ok(out)
    }

    /// Names of columns that start with `prefix`, in order.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Horizontal concatenation.
    pub fn hstack(&self, other: &Self) -> Result<Self> {
        TmleError::check_len(self.nrows, other.nrows)?;
        let mut out = self.clone();
        out.names.extend(other.names.iter().cloned());
        out.columns.extend(other.columns.iter().cloned());
        Ok(out)
    }
}
