//! Immutable per-run sufficient statistics of the observed dissimilarities.

use mesa_core::errors::{ErrorInfo, MesaError};
use mesa_domain::ObservedData;
use nalgebra::{Cholesky, DMatrix};

/// Fixed quantities derived once from the observed data.
///
/// Everything the likelihood needs about the `n` by `n` dissimilarity matrix
/// is reduced here to `o`-level aggregates plus one determinant, so density
/// evaluations never touch the full matrix again.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    /// Number of individuals `n`.
    pub n: usize,
    /// Number of observed demes `o`.
    pub o: usize,
    /// Individuals per observed deme.
    pub counts: Vec<f64>,
    /// Deme-aggregated dissimilarities `J' D J` (o by o).
    pub jt_d_j: DMatrix<f64>,
    /// Per-deme sums of the matrix diagonal.
    pub diag_sums: Vec<f64>,
    /// `logdet(-L D L')` at the observed contrasts, `L = [-1 | I]`.
    pub ldet: f64,
}

impl SufficientStats {
    /// Computes the sufficient statistics, failing if the observed contrast
    /// matrix `-L D L'` is not positive definite.
    pub fn from_data(data: &ObservedData) -> Result<Self, MesaError> {
        let n = data.num_individuals();
        let o = data.num_observed();
        let diffs = data.diffs();
        let deme_of = data.deme_of();

        let counts: Vec<f64> = data.counts().into_iter().map(|c| c as f64).collect();

        let mut jt_d_j = DMatrix::zeros(o, o);
        let mut diag_sums = vec![0.0; o];
        for i in 0..n {
            diag_sums[deme_of[i]] += diffs[i][i];
            for j in 0..n {
                jt_d_j[(deme_of[i], deme_of[j])] += diffs[i][j];
            }
        }

        // Contrasts against individual 0: X[i][j] = -(L D L')[i][j].
        let p = n - 1;
        let contrasts = DMatrix::from_fn(p, p, |i, j| {
            diffs[i + 1][0] + diffs[0][j + 1] - diffs[i + 1][j + 1] - diffs[0][0]
        });
        let chol = Cholesky::new(contrasts).ok_or_else(|| {
            MesaError::Data(
                ErrorInfo::new(
                    "contrasts-not-positive-definite",
                    "observed dissimilarity contrasts -L D L' are not positive definite",
                )
                .with_hint("the matrix must be conditionally negative definite"),
            )
        })?;
        let ldet = 2.0 * chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>();

        Ok(Self {
            n,
            o,
            counts,
            jt_d_j,
            diag_sums,
            ldet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_offdiag(n: usize, value: f64) -> Vec<Vec<f64>> {
        (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { value }).collect())
            .collect()
    }

    #[test]
    fn aggregates_match_hand_counts() {
        let diffs = vec![
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 0.0, 4.0, 5.0],
            vec![2.0, 4.0, 0.0, 6.0],
            vec![3.0, 5.0, 6.0, 0.0],
        ];
        let data = ObservedData::new(diffs, vec![0, 0, 1, 1], 2).expect("data");
        let stats = SufficientStats::from_data(&data).expect("stats");
        assert_eq!(stats.counts, vec![2.0, 2.0]);
        // Deme block sums: within 0 = 2*1, within 1 = 2*6, across = 2+3+4+5.
        assert!((stats.jt_d_j[(0, 0)] - 2.0).abs() < 1e-12);
        assert!((stats.jt_d_j[(1, 1)] - 12.0).abs() < 1e-12);
        assert!((stats.jt_d_j[(0, 1)] - 14.0).abs() < 1e-12);
        assert!((stats.jt_d_j[(1, 0)] - 14.0).abs() < 1e-12);
        assert_eq!(stats.diag_sums, vec![0.0, 0.0]);
    }

    #[test]
    fn contrast_determinant_on_constant_matrix() {
        // D with all off-diagonal entries 2 gives -L D L' = 2 (I + 1 1'),
        // whose eigenvalues are 2 (n-2 times) and 2n.
        let n = 4;
        let data =
            ObservedData::new(constant_offdiag(n, 2.0), vec![0, 1, 2, 3], 4).expect("data");
        let stats = SufficientStats::from_data(&data).expect("stats");
        let expected = (n - 2) as f64 * 2.0_f64.ln() + (2.0 * n as f64).ln();
        assert!((stats.ldet - expected).abs() < 1e-10);
    }

    #[test]
    fn rejects_contrasts_that_are_not_positive_definite() {
        // A dissimilarity that violates conditional negative definiteness.
        let diffs = vec![
            vec![0.0, 10.0, 1.0],
            vec![10.0, 0.0, 1.0],
            vec![1.0, 1.0, 0.0],
        ];
        let data = ObservedData::new(diffs, vec![0, 1, 2], 3).expect("data");
        let err = SufficientStats::from_data(&data).unwrap_err();
        assert_eq!(err.info().code, "contrasts-not-positive-definite");
    }
}
