//! Observed pairwise dissimilarities and the individual-to-deme assignment.

use mesa_core::errors::{ErrorInfo, MesaError};
use serde::{Deserialize, Serialize};

/// Observed data bundle: an `n` by `n` dissimilarity matrix over individuals
/// plus the assignment of each individual to an observed deme.
///
/// Validation is fatal at construction so downstream consumers can assume a
/// symmetric, finite, non-negative matrix and a total assignment onto the
/// observed-deme prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedData {
    diffs: Vec<Vec<f64>>,
    deme_of: Vec<usize>,
    num_observed: usize,
}

impl ObservedData {
    /// Builds and validates the bundle against `num_observed` observed demes.
    pub fn new(
        diffs: Vec<Vec<f64>>,
        deme_of: Vec<usize>,
        num_observed: usize,
    ) -> Result<Self, MesaError> {
        let n = diffs.len();
        if n < 2 {
            return Err(MesaError::Data(
                ErrorInfo::new("too-few-individuals", "need at least two individuals")
                    .with_context("individuals", n.to_string()),
            ));
        }
        if deme_of.len() != n {
            return Err(MesaError::Data(
                ErrorInfo::new("assignment-length", "assignment length must match matrix order")
                    .with_context("individuals", n.to_string())
                    .with_context("assignments", deme_of.len().to_string()),
            ));
        }
        for (i, row) in diffs.iter().enumerate() {
            if row.len() != n {
                return Err(MesaError::Data(
                    ErrorInfo::new("ragged-matrix", "dissimilarity matrix must be square")
                        .with_context("row", i.to_string())
                        .with_context("len", row.len().to_string()),
                ));
            }
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(MesaError::Data(
                        ErrorInfo::new("bad-entry", "dissimilarities must be finite and >= 0")
                            .with_context("row", i.to_string())
                            .with_context("col", j.to_string()),
                    ));
                }
                if (value - diffs[j][i]).abs() > 1e-12 {
                    return Err(MesaError::Data(
                        ErrorInfo::new("asymmetric-matrix", "dissimilarity matrix is asymmetric")
                            .with_context("row", i.to_string())
                            .with_context("col", j.to_string()),
                    ));
                }
            }
            if diffs[i][i] != 0.0 {
                return Err(MesaError::Data(
                    ErrorInfo::new("nonzero-diagonal", "self dissimilarity must be zero")
                        .with_context("row", i.to_string()),
                ));
            }
        }
        let mut counts = vec![0usize; num_observed];
        for (i, &deme) in deme_of.iter().enumerate() {
            if deme >= num_observed {
                return Err(MesaError::Data(
                    ErrorInfo::new("assignment-out-of-range", "individual assigned beyond observed demes")
                        .with_context("individual", i.to_string())
                        .with_context("deme", deme.to_string())
                        .with_context("observed", num_observed.to_string()),
                ));
            }
            counts[deme] += 1;
        }
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(MesaError::Data(
                ErrorInfo::new("empty-observed-deme", "observed deme has no individuals")
                    .with_context("deme", empty.to_string())
                    .with_hint("shrink the observed prefix or reassign individuals"),
            ));
        }
        Ok(Self {
            diffs,
            deme_of,
            num_observed,
        })
    }

    /// Returns the number of individuals `n`.
    pub fn num_individuals(&self) -> usize {
        self.diffs.len()
    }

    /// Returns the number of observed demes `o`.
    pub fn num_observed(&self) -> usize {
        self.num_observed
    }

    /// Returns the dissimilarity matrix rows.
    pub fn diffs(&self) -> &[Vec<f64>] {
        &self.diffs
    }

    /// Returns the deme assignment of each individual.
    pub fn deme_of(&self) -> &[usize] {
        &self.deme_of
    }

    /// Returns per-observed-deme individual counts.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_observed];
        for &deme in &self.deme_of {
            counts[deme] += 1;
        }
        counts
    }
}
