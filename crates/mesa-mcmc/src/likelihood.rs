//! Rate-surface assembly and the Wishart log-density on observed contrasts.

use std::f64::consts::LN_2;

use mesa_domain::DemeGraph;
use nalgebra::{DMatrix, DVector};

use crate::special;
use crate::stats::SufficientStats;

/// Cached density terms returned by [`wishart_ln_pdf`].
///
/// `tri_delta_qd` and `ll_at_fixed_df` depend only on the rate surfaces (and
/// `df` for the latter), so scale-only updates can recompose `log_lik` from
/// them without touching the o-level algebra again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodTerms {
    /// `tr((-L Δ L')⁻¹ (-L D L'))`, the scale-free trace term.
    pub tri_delta_qd: f64,
    /// Log-density with the `sigma2` factors removed.
    pub ll_at_fixed_df: f64,
    /// Full log-likelihood.
    pub log_lik: f64,
}

impl LikelihoodTerms {
    fn degenerate() -> Self {
        Self {
            tri_delta_qd: f64::NAN,
            ll_at_fixed_df: f64::NEG_INFINITY,
            log_lik: f64::NEG_INFINITY,
        }
    }
}

/// Computes the within-deme diversity vector `W` over all demes.
pub fn calc_within(q_effects: &[f64], q_colors: &[usize], within_scale: f64) -> Vec<f64> {
    q_colors
        .iter()
        .map(|&tile| within_scale * 10f64.powf(q_effects[tile]))
        .collect()
}

/// Computes the inverse `Binv` of the observed between-deme distance matrix.
///
/// Per-deme linear migration rates feed edge conductances, whose Laplacian
/// (grounded at the last deme) yields resistance distances; `B` is their
/// scaled restriction to the observed demes. A singular grounded block or a
/// singular `B` returns `None`, which the density maps to `-inf`.
pub fn calc_between(
    graph: &DemeGraph,
    m_effects: &[f64],
    m_colors: &[usize],
    m_rate_mu: f64,
    between_scale: f64,
) -> Option<DMatrix<f64>> {
    let d = graph.num_demes();
    let o = graph.num_observed();
    let rates: Vec<f64> = m_colors
        .iter()
        .map(|&tile| 10f64.powf(m_rate_mu + m_effects[tile]))
        .collect();
    if rates.iter().any(|r| !r.is_finite()) {
        return None;
    }

    let mut laplacian = DMatrix::zeros(d, d);
    for &(a, b) in graph.edges() {
        let conductance = 0.5 * (rates[a] + rates[b]);
        laplacian[(a, b)] -= conductance;
        laplacian[(b, a)] -= conductance;
        laplacian[(a, a)] += conductance;
        laplacian[(b, b)] += conductance;
    }

    // Ground the last deme; the grounded inverse extends with a zero row/col.
    let reduced = DMatrix::from_fn(d - 1, d - 1, |i, j| laplacian[(i, j)]);
    let grounded = reduced.lu().try_inverse()?;
    let green = |a: usize, b: usize| {
        if a < d - 1 && b < d - 1 {
            grounded[(a, b)]
        } else {
            0.0
        }
    };

    let mut b_mat = DMatrix::zeros(o, o);
    for a in 0..o {
        for b in (a + 1)..o {
            let resistance = green(a, a) + green(b, b) - 2.0 * green(a, b);
            let value = between_scale * resistance;
            b_mat[(a, b)] = value;
            b_mat[(b, a)] = value;
        }
    }

    let binv = b_mat.lu().try_inverse()?;
    if binv.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(binv)
}

/// Evaluates the Wishart log-density of the observed contrasts through the
/// o-level reduction `S = diag(J W) - J B J'`.
///
/// Degenerate surfaces (missing `Binv`, non-positive `W`, sign-indefinite
/// determinants, non-finite terms) evaluate to `-inf` rather than erroring.
pub fn wishart_ln_pdf(
    between_inv: Option<&DMatrix<f64>>,
    within: &[f64],
    sigma2: f64,
    df: f64,
    stats: &SufficientStats,
) -> LikelihoodTerms {
    let binv = match between_inv {
        Some(binv) => binv,
        None => return LikelihoodTerms::degenerate(),
    };
    let o = stats.o;
    let n = stats.n as f64;
    let p = n - 1.0;
    let w = &within[..o];
    if w.iter().any(|&x| !(x > 0.0) || !x.is_finite()) {
        return LikelihoodTerms::degenerate();
    }

    // Woodbury core C = Binv - diag(c / W).
    let mut c_mat = binv.clone();
    for a in 0..o {
        c_mat[(a, a)] -= stats.counts[a] / w[a];
    }
    let c_lu = c_mat.lu();
    let det_c = c_lu.determinant();
    let c_inv = match c_lu.try_inverse() {
        Some(inv) => inv,
        None => return LikelihoodTerms::degenerate(),
    };

    let u = DVector::from_fn(o, |a, _| stats.counts[a] / w[a]);
    let cu = &c_inv * &u;
    let q = u.sum() + u.dot(&cu);

    // tr(S⁻¹ D) and the projection correction 1' S⁻¹ D S⁻¹ 1.
    let mut trace = 0.0;
    for a in 0..o {
        trace += stats.diag_sums[a] / w[a];
        for b in 0..o {
            trace += c_inv[(a, b)] * stats.jt_d_j[(b, a)] / (w[b] * w[a]);
        }
    }
    let v = DVector::from_fn(o, |a, _| (1.0 + cu[a]) / w[a]);
    let projection = (v.transpose() * &stats.jt_d_j * &v)[(0, 0)];
    let tri_delta_qd = -trace + projection / q;

    let det_binv = binv.clone().lu().determinant();
    let det_ratio = det_c / det_binv;
    if !(det_ratio > 0.0) || !(q > 0.0) || !det_ratio.is_finite() || !q.is_finite() {
        return LikelihoodTerms::degenerate();
    }
    let count_log_within: f64 = (0..o).map(|a| stats.counts[a] * w[a].ln()).sum();
    let logdet_scale = count_log_within + det_ratio.ln() + q.ln();

    let half_df = df / 2.0;
    let ll_at_fixed_df = (df - n) / 2.0 * stats.ldet - half_df * p * LN_2
        + half_df * p * df.ln()
        - half_df * logdet_scale
        - special::ln_multigamma(stats.n - 1, half_df);
    if !tri_delta_qd.is_finite() || ll_at_fixed_df.is_nan() {
        return LikelihoodTerms::degenerate();
    }

    let log_lik = ln_pdf_at_scale(tri_delta_qd, ll_at_fixed_df, stats.n, df, sigma2);
    LikelihoodTerms {
        tri_delta_qd,
        ll_at_fixed_df,
        log_lik,
    }
}

/// Recomposes the log-likelihood from the cached pair for a new `sigma2`.
pub fn ln_pdf_at_scale(
    tri_delta_qd: f64,
    ll_at_fixed_df: f64,
    num_individuals: usize,
    df: f64,
    sigma2: f64,
) -> f64 {
    if !tri_delta_qd.is_finite() || ll_at_fixed_df == f64::NEG_INFINITY || !(sigma2 > 0.0) {
        return f64::NEG_INFINITY;
    }
    let p = (num_individuals - 1) as f64;
    ll_at_fixed_df - p * (df / 2.0) * sigma2.ln() - (df / 2.0) * tri_delta_qd / sigma2
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_domain::ObservedData;

    fn line_problem() -> (DemeGraph, ObservedData, SufficientStats) {
        let graph = DemeGraph::grid(2, 2).expect("grid");
        // Squared distances between points on a line are conditionally
        // negative definite, so the contrasts are positive definite.
        let points: [f64; 5] = [0.0, 1.0, 3.0, 6.0, 10.0];
        let n = points.len();
        let diffs: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| (points[i] - points[j]).powi(2)).collect())
            .collect();
        let data = ObservedData::new(diffs, vec![0, 1, 2, 3, 1], 4).expect("data");
        let stats = SufficientStats::from_data(&data).expect("stats");
        (graph, data, stats)
    }

    fn dense_wishart(
        binv: &DMatrix<f64>,
        within: &[f64],
        data: &ObservedData,
        sigma2: f64,
        df: f64,
    ) -> (f64, f64) {
        let n = data.num_individuals();
        let p = n - 1;
        let deme_of = data.deme_of();
        let b_mat = binv.clone().lu().try_inverse().expect("B");
        let delta = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                0.0
            } else {
                b_mat[(deme_of[i], deme_of[j])] + 0.5 * (within[deme_of[i]] + within[deme_of[j]])
            }
        });
        let contract = |m: &DMatrix<f64>| {
            DMatrix::from_fn(p, p, |i, j| {
                m[(i + 1, 0)] + m[(0, j + 1)] - m[(i + 1, j + 1)] - m[(0, 0)]
            })
        };
        let scale = contract(&delta);
        let observed = DMatrix::from_fn(p, p, |i, j| {
            data.diffs()[i + 1][0] + data.diffs()[0][j + 1]
                - data.diffs()[i + 1][j + 1]
                - data.diffs()[0][0]
        });
        let scale_lu = scale.clone().lu();
        let tri = (scale_lu.try_inverse().expect("scale inverse") * &observed).trace();
        let ldet_scale = scale_lu.determinant().ln();
        let ldet_observed = observed.lu().determinant().ln();
        let pf = p as f64;
        let ll = (df - n as f64) / 2.0 * ldet_observed - df / 2.0 * pf * LN_2
            + df / 2.0 * pf * df.ln()
            - df / 2.0 * ldet_scale
            - special::ln_multigamma(p, df / 2.0)
            - pf * (df / 2.0) * sigma2.ln()
            - (df / 2.0) * tri / sigma2;
        (tri, ll)
    }

    #[test]
    fn reduction_matches_dense_evaluation() {
        let (graph, data, stats) = line_problem();
        let within = calc_within(&[0.1], &vec![0; graph.num_demes()], 1.0);
        let binv = calc_between(&graph, &[0.05], &vec![0; graph.num_demes()], 0.2, 1.0)
            .expect("surface");
        let sigma2 = 0.8;
        let df = 4.5;
        let terms = wishart_ln_pdf(Some(&binv), &within, sigma2, df, &stats);
        let (tri_dense, ll_dense) = dense_wishart(&binv, &within, &data, sigma2, df);
        assert!((terms.tri_delta_qd - tri_dense).abs() <= 1e-8 * tri_dense.abs().max(1.0));
        assert!((terms.log_lik - ll_dense).abs() <= 1e-8 * ll_dense.abs().max(1.0));
    }

    #[test]
    fn cached_pair_recomposes_scale_changes() {
        let (graph, _data, stats) = line_problem();
        let within = calc_within(&[0.0], &vec![0; graph.num_demes()], 1.0);
        let binv = calc_between(&graph, &[0.0], &vec![0; graph.num_demes()], 0.0, 1.0)
            .expect("surface");
        let df = 5.0;
        let base = wishart_ln_pdf(Some(&binv), &within, 1.0, df, &stats);
        for &sigma2 in &[0.5, 1.0, 2.5] {
            let full = wishart_ln_pdf(Some(&binv), &within, sigma2, df, &stats);
            let recomposed =
                ln_pdf_at_scale(base.tri_delta_qd, base.ll_at_fixed_df, stats.n, df, sigma2);
            assert!((full.log_lik - recomposed).abs() <= 1e-10 * recomposed.abs().max(1.0));
            assert!((full.tri_delta_qd - base.tri_delta_qd).abs() <= 1e-12);
        }
    }

    #[test]
    fn path_resistance_on_two_demes() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0]];
        let graph = DemeGraph::new(coords, vec![(0, 1)], 2).expect("path");
        // Unit rates give a single unit conductance, so R(0, 1) = 1 and
        // Binv equals the permutation [[0, 1], [1, 0]].
        let binv = calc_between(&graph, &[0.0], &[0, 0], 0.0, 1.0).expect("surface");
        assert!((binv[(0, 1)] - 1.0).abs() < 1e-12);
        assert!(binv[(0, 0)].abs() < 1e-12);
    }

    #[test]
    fn missing_surface_is_minus_infinity() {
        let (_graph, _data, stats) = line_problem();
        let within = vec![1.0; 4];
        let terms = wishart_ln_pdf(None, &within, 1.0, 5.0, &stats);
        assert_eq!(terms.log_lik, f64::NEG_INFINITY);
        assert!(terms.tri_delta_qd.is_nan());
    }

    #[test]
    fn nonpositive_within_is_minus_infinity() {
        let (graph, _data, stats) = line_problem();
        let binv = calc_between(&graph, &[0.0], &vec![0; graph.num_demes()], 0.0, 1.0)
            .expect("surface");
        let mut within = vec![1.0; 4];
        within[2] = 0.0;
        let terms = wishart_ln_pdf(Some(&binv), &within, 1.0, 5.0, &stats);
        assert_eq!(terms.log_lik, f64::NEG_INFINITY);
    }
}
