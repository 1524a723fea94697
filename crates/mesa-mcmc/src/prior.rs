//! Hierarchical prior over tessellations, effects, and scalar parameters.

use mesa_domain::Habitat;

use crate::config::PriorConfig;
use crate::special;
use crate::tessellation::Tessellation;

/// Borrowed view of the parameters the prior scores.
#[derive(Debug, Clone, Copy)]
pub struct PriorParams<'a> {
    /// Migration tessellation.
    pub m_tiles: &'a Tessellation,
    /// Diversity tessellation.
    pub q_tiles: &'a Tessellation,
    /// Overall migration offset (log10).
    pub m_rate_mu: f64,
    /// Migration effect variance.
    pub m_rate_s2: f64,
    /// Diversity effect variance.
    pub q_rate_s2: f64,
    /// Wishart scale parameter.
    pub sigma2: f64,
    /// Wishart degrees of freedom.
    pub df: f64,
}

/// Log-density of the full hierarchical prior, `-inf` outside its support.
pub fn ln_prior(
    params: &PriorParams<'_>,
    habitat: &Habitat,
    prior: &PriorConfig,
    df_bounds: (f64, f64),
) -> f64 {
    let (df_min, df_max) = df_bounds;
    if !(params.df >= df_min && params.df <= df_max) {
        return f64::NEG_INFINITY;
    }
    if params.m_rate_mu.abs() > prior.m_rate_mu_half_interval {
        return f64::NEG_INFINITY;
    }

    let mut total = -params.df.ln();
    total -= (2.0 * prior.m_rate_mu_half_interval).ln();

    total += ln_negative_binomial(params.m_tiles.num_tiles(), prior.nb_size, prior.nb_prob);
    total += ln_negative_binomial(params.q_tiles.num_tiles(), prior.nb_size, prior.nb_prob);

    for surface in [params.m_tiles, params.q_tiles] {
        for seed in &surface.seeds {
            if !habitat.contains(seed[0], seed[1]) {
                return f64::NEG_INFINITY;
            }
        }
    }

    match effects_ln_density(
        &params.m_tiles.effects,
        params.m_rate_s2,
        prior.m_effect_half_interval,
    ) {
        Some(term) => total += term,
        None => return f64::NEG_INFINITY,
    }
    match effects_ln_density(
        &params.q_tiles.effects,
        params.q_rate_s2,
        prior.q_effect_half_interval,
    ) {
        Some(term) => total += term,
        None => return f64::NEG_INFINITY,
    }

    total += ln_inverse_gamma(params.m_rate_s2, prior.m_rate_shape, prior.m_rate_scale);
    total += ln_inverse_gamma(params.q_rate_s2, prior.q_rate_shape, prior.q_rate_scale);
    total += ln_inverse_gamma(params.sigma2, prior.sigma2_shape, prior.sigma2_scale);
    total
}

/// Negative-binomial log-pmf on the tile count.
pub fn ln_negative_binomial(count: usize, size: f64, prob: f64) -> f64 {
    let k = count as f64;
    special::ln_gamma(k + size) - special::ln_gamma(size) - special::ln_gamma(k + 1.0)
        + size * (1.0 - prob).ln()
        + k * prob.ln()
}

/// Sum of zero-mean normal log-densities with a hard interval bound.
///
/// Returns `None` when any effect escapes the interval or the variance is
/// not usable.
fn effects_ln_density(effects: &[f64], variance: f64, half_interval: f64) -> Option<f64> {
    if !(variance > 0.0) || !variance.is_finite() {
        return None;
    }
    let mut total = 0.0;
    for &effect in effects {
        if effect.abs() > half_interval {
            return None;
        }
        total += -0.5 * (2.0 * std::f64::consts::PI * variance).ln()
            - effect * effect / (2.0 * variance);
    }
    Some(total)
}

/// Inverse-gamma log-density with shape `shape / 2` and scale `scale / 2`.
pub fn ln_inverse_gamma(x: f64, shape: f64, scale: f64) -> f64 {
    if !(x > 0.0) || !x.is_finite() {
        return f64::NEG_INFINITY;
    }
    let alpha = shape / 2.0;
    let beta = scale / 2.0;
    alpha * beta.ln() - special::ln_gamma(alpha) - (alpha + 1.0) * x.ln() - beta / x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_habitat() -> Habitat {
        Habitat::rectangle(0.0, 0.0, 1.0, 1.0).expect("habitat")
    }

    fn baseline<'a>(m: &'a Tessellation, q: &'a Tessellation) -> PriorParams<'a> {
        PriorParams {
            m_tiles: m,
            q_tiles: q,
            m_rate_mu: 0.0,
            m_rate_s2: 1.0,
            q_rate_s2: 1.0,
            sigma2: 1.0,
            df: 5.0,
        }
    }

    #[test]
    fn negative_binomial_matches_closed_form() {
        // k = 2, r = 3, p = 0.4: pmf = C(4, 2) 0.6^3 0.4^2 = 6 * 0.216 * 0.16.
        let expected = (6.0 * 0.216 * 0.16_f64).ln();
        assert!((ln_negative_binomial(2, 3.0, 0.4) - expected).abs() < 1e-10);
    }

    #[test]
    fn inverse_gamma_matches_closed_form() {
        // shape 2, scale 4: alpha = 1, beta = 2, pdf = 2 x^{-2} e^{-2/x}.
        let x: f64 = 1.5;
        let expected = 2.0_f64.ln() - 2.0 * x.ln() - 2.0 / x;
        assert!((ln_inverse_gamma(x, 2.0, 4.0) - expected).abs() < 1e-10);
        assert_eq!(ln_inverse_gamma(0.0, 2.0, 4.0), f64::NEG_INFINITY);
    }

    #[test]
    fn finite_inside_support() {
        let habitat = unit_habitat();
        let m = Tessellation::single([0.5, 0.5], 0.2);
        let q = Tessellation::single([0.25, 0.75], 0.05);
        let params = baseline(&m, &q);
        let config = PriorConfig::default();
        let value = ln_prior(&params, &habitat, &config, (4.0, 8.0));
        assert!(value.is_finite());
    }

    #[test]
    fn seed_outside_habitat_is_rejected() {
        let habitat = unit_habitat();
        let m = Tessellation::single([1.5, 0.5], 0.0);
        let q = Tessellation::single([0.5, 0.5], 0.0);
        let params = baseline(&m, &q);
        let config = PriorConfig::default();
        assert_eq!(
            ln_prior(&params, &habitat, &config, (4.0, 8.0)),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn effect_beyond_interval_is_rejected() {
        let habitat = unit_habitat();
        let config = PriorConfig::default();
        let m = Tessellation::single([0.5, 0.5], config.m_effect_half_interval + 0.01);
        let q = Tessellation::single([0.5, 0.5], 0.0);
        let params = baseline(&m, &q);
        assert_eq!(
            ln_prior(&params, &habitat, &config, (4.0, 8.0)),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn df_and_mu_bounds_are_hard() {
        let habitat = unit_habitat();
        let config = PriorConfig::default();
        let m = Tessellation::single([0.5, 0.5], 0.0);
        let q = Tessellation::single([0.5, 0.5], 0.0);
        let mut params = baseline(&m, &q);
        params.df = 3.9;
        assert_eq!(
            ln_prior(&params, &habitat, &config, (4.0, 8.0)),
            f64::NEG_INFINITY
        );
        params.df = 5.0;
        params.m_rate_mu = config.m_rate_mu_half_interval + 0.1;
        assert_eq!(
            ln_prior(&params, &habitat, &config, (4.0, 8.0)),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn extra_tiles_change_count_term_only() {
        let habitat = unit_habitat();
        let config = PriorConfig::default();
        let m1 = Tessellation::single([0.5, 0.5], 0.0);
        let q = Tessellation::single([0.5, 0.5], 0.0);
        let m2 = m1.with_birth([0.25, 0.25], 0.0);
        let one = ln_prior(&baseline(&m1, &q), &habitat, &config, (4.0, 8.0));
        let two = ln_prior(&baseline(&m2, &q), &habitat, &config, (4.0, 8.0));
        let count_delta = ln_negative_binomial(2, config.nb_size, config.nb_prob)
            - ln_negative_binomial(1, config.nb_size, config.nb_prob);
        let effect_delta = -0.5 * (2.0 * std::f64::consts::PI).ln();
        assert!((two - one - count_delta - effect_delta).abs() < 1e-10);
    }
}
