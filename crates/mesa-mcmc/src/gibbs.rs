//! Conjugate Gibbs updates for the variance parameters.

use mesa_core::RngHandle;

use crate::likelihood;
use crate::prior;
use crate::state::{ChainState, RunInputs};

/// Draws `sigma2` from its inverse-gamma full conditional and recomposes the
/// cached densities.
///
/// When the likelihood caches are degenerate the update is skipped, since the
/// full conditional is only defined at a finite likelihood.
pub fn update_sigma2(state: &mut ChainState, inputs: &RunInputs, rng: &mut RngHandle) {
    let tri = state.tri_delta_qd;
    if !tri.is_finite() || !(tri > 0.0) {
        return;
    }
    let p = (inputs.data().num_individuals() - 1) as f64;
    let prior_cfg = &inputs.config().prior;
    let shape = prior_cfg.sigma2_shape / 2.0 + p * state.df / 2.0;
    let scale = prior_cfg.sigma2_scale / 2.0 + state.df * tri / 2.0;
    let draw = rng.inverse_gamma(shape, scale);
    if !draw.is_finite() || !(draw > 0.0) {
        return;
    }
    state.sigma2 = draw;
    state.log_lik = likelihood::ln_pdf_at_scale(
        state.tri_delta_qd,
        state.ll_at_fixed_df,
        inputs.data().num_individuals(),
        state.df,
        state.sigma2,
    );
    state.log_prior = prior::ln_prior(
        &state.prior_params(),
        inputs.habitat(),
        &inputs.config().prior,
        inputs.df_bounds(),
    );
}

/// Draws the effect variances from their inverse-gamma full conditionals.
///
/// Only the prior depends on these, so the likelihood caches stay untouched.
pub fn update_hyperparams(state: &mut ChainState, inputs: &RunInputs, rng: &mut RngHandle) {
    let prior_cfg = &inputs.config().prior;

    let m_sq: f64 = state.m_tiles.effects.iter().map(|e| e * e).sum();
    let m_k = state.m_tiles.num_tiles() as f64;
    let m_draw = rng.inverse_gamma(
        prior_cfg.m_rate_shape / 2.0 + m_k / 2.0,
        prior_cfg.m_rate_scale / 2.0 + m_sq / 2.0,
    );
    if m_draw.is_finite() && m_draw > 0.0 {
        state.m_rate_s2 = m_draw;
    }

    let q_sq: f64 = state.q_tiles.effects.iter().map(|e| e * e).sum();
    let q_k = state.q_tiles.num_tiles() as f64;
    let q_draw = rng.inverse_gamma(
        prior_cfg.q_rate_shape / 2.0 + q_k / 2.0,
        prior_cfg.q_rate_scale / 2.0 + q_sq / 2.0,
    );
    if q_draw.is_finite() && q_draw > 0.0 {
        state.q_rate_s2 = q_draw;
    }

    state.log_prior = prior::ln_prior(
        &state.prior_params(),
        inputs.habitat(),
        &inputs.config().prior,
        inputs.df_bounds(),
    );
}
