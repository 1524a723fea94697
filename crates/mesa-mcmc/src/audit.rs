//! Cache audit that recomputes the state's derived quantities from scratch.

use crate::state::{ChainState, RunInputs};

const REL_TOL: f64 = 1e-8;

/// Verifies that every cached quantity matches a from-scratch recomputation.
///
/// Incremental cache updates accumulate no error beyond floating-point noise,
/// so any disagreement past the tolerance points at a stale cache path.
pub fn self_consistency_check(inputs: &RunInputs, state: &ChainState) -> bool {
    let mut fresh = state.clone();
    fresh.refresh_caches(inputs);

    if fresh.m_colors != state.m_colors || fresh.q_colors != state.q_colors {
        return false;
    }
    if fresh.within.len() != state.within.len()
        || fresh
            .within
            .iter()
            .zip(&state.within)
            .any(|(a, b)| !close(*a, *b))
    {
        return false;
    }
    match (&fresh.between_inv, &state.between_inv) {
        (None, None) => {}
        (Some(a), Some(b)) => {
            if a.shape() != b.shape() || a.iter().zip(b.iter()).any(|(x, y)| !close(*x, *y)) {
                return false;
            }
        }
        _ => return false,
    }
    close(fresh.log_prior, state.log_prior)
        && close(fresh.log_lik, state.log_lik)
        && close(fresh.tri_delta_qd, state.tri_delta_qd)
        && close(fresh.ll_at_fixed_df, state.ll_at_fixed_df)
}

fn close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= REL_TOL * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use mesa_core::RngHandle;
    use mesa_domain::{DemeGraph, Habitat, ObservedData};

    fn sample_run() -> (RunInputs, ChainState) {
        let habitat = Habitat::rectangle(-0.5, -0.5, 1.5, 1.5).expect("habitat");
        let graph = DemeGraph::grid(2, 2).expect("grid");
        let points: [f64; 4] = [0.0, 1.0, 3.0, 6.0];
        let diffs: Vec<Vec<f64>> = (0..4)
            .map(|i| (0..4).map(|j| (points[i] - points[j]).powi(2)).collect())
            .collect();
        let data = ObservedData::new(diffs, vec![0, 1, 2, 3], 4).expect("data");
        let inputs =
            RunInputs::new(habitat, graph, data, RunConfig::default()).expect("inputs");
        let mut rng = RngHandle::from_seed(31);
        let state = ChainState::initialize(&inputs, &mut rng);
        (inputs, state)
    }

    #[test]
    fn fresh_state_passes() {
        let (inputs, state) = sample_run();
        assert!(self_consistency_check(&inputs, &state));
    }

    #[test]
    fn corrupted_cache_fails() {
        let (inputs, mut state) = sample_run();
        state.log_lik += 1.0;
        assert!(!self_consistency_check(&inputs, &state));
    }

    #[test]
    fn corrupted_coloring_fails() {
        let (inputs, mut state) = sample_run();
        state.within[0] *= 2.0;
        assert!(!self_consistency_check(&inputs, &state));
    }

    #[test]
    fn tolerance_absorbs_rounding_noise() {
        let (inputs, mut state) = sample_run();
        state.log_lik *= 1.0 + 1e-12;
        assert!(self_consistency_check(&inputs, &state));
    }
}
