//! Signed indicator table for a treatment query.
//!
//! Every combination of queried levels gets the weight `(-1)^(n - j)`, where
//! `n` is the number of treatment variables and `j` the number of variables
//! sitting at their reference (first) level. The reference combination has
//! weight +1 and the sign flips with each step of Hamming distance away
//! from it. Only the count `j` matters, so variable order does not change
//! any weight; it only fixes the enumeration order.

use std::collections::HashMap;

use crate::data::Dataset;
use crate::error::{Result, TmleError};
use crate::estimand::Query;

/// Mapping from level combination to signed weight, in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    variables: Vec<String>,
    entries: Vec<(Vec<String>, f64)>,
    index: HashMap<Vec<String>, usize>,
}

/// Enumerate the Cartesian product of the query's levels with their signs.
///
/// Combinations come out in odometer order over the query's variable order,
/// the last variable varying fastest.
pub fn indicator_fns(query: &Query) -> Result<IndicatorTable> {
    query.validate()?;
    let entries = query.entries();
    let n = entries.len();

    let mut combinations: Vec<Vec<usize>> = vec![Vec::new()];
    for (_, levels) in entries {
        combinations = combinations
            .into_iter()
            .flat_map(|prefix| {
                (0..levels.len()).map(move |k| {
                    let mut c = prefix.clone();
                    c.push(k);
                    c
                })
            })
            .collect();
    }

    let table: Vec<(Vec<String>, f64)> = combinations
        .into_iter()
        .map(|positions| {
            let at_reference = positions.iter().filter(|&&k| k == 0).count();
            let sign = if (n - at_reference) % 2 == 0 { 1.0 } else { -1.0 };
            let levels = positions
                .iter()
                .zip(entries)
                .map(|(&k, (_, levels))| levels[k].clone())
                .collect();
            (levels, sign)
        })
        .collect();

    let index = table
        .iter()
        .enumerate()
        .map(|(i, (levels, _))| (levels.clone(), i))
        .collect();

    Ok(IndicatorTable {
        variables: query.variables().map(str::to_string).collect(),
        entries: table,
        index,
    })
}

impl IndicatorTable {
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(combination, sign)` pairs; a combination lists one level per variable.
    pub fn iter(&self) -> impl Iterator<Item = (&[String], f64)> {
        self.entries.iter().map(|(c, s)| (c.as_slice(), *s))
    }

    pub fn weight(&self, combination: &[String]) -> Option<f64> {
        self.index.get(combination).map(|&i| self.entries[i].1)
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.entries.iter().map(|(_, s)| s).sum()
    }

    /// Per-row weight of the row's own treatment pattern, 0 when the
    /// pattern is not part of the contrast.
    pub fn row_values(&self, t: &Dataset) -> Result<Vec<f64>> {
        let factors = self
            .variables
            .iter()
            .map(|v| t.factor(v))
            .collect::<Result<Vec<_>>>()?;
        if let Some(first) = factors.first() {
            for f in &factors[1..] {
                TmleError::check_len(first.len(), f.len())?;
            }
        }
        let mut key = Vec::with_capacity(factors.len());
        Ok((0..t.nrows())
            .map(|i| {
                key.clear();
                key.extend(factors.iter().map(|f| f.level_of(i).to_string()));
                self.weight(&key).unwrap_or(0.0)
            })
            .collect())
    }
}
