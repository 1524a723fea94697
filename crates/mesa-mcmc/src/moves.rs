//! Proposal generators for the eight move kinds.

use mesa_core::RngHandle;

use crate::likelihood::{calc_between, calc_within};
use crate::special;
use crate::state::{ChainState, MoveKind, Proposal, ProposalDelta, RunInputs};
use crate::tessellation::{assign_colors, Tessellation};

/// Generates the proposal for the given move kind.
pub fn propose(
    kind: MoveKind,
    inputs: &RunInputs,
    state: &ChainState,
    rng: &mut RngHandle,
) -> Proposal {
    match kind {
        MoveKind::RateOneQ => propose_rate_one_q(inputs, state, rng),
        MoveKind::MoveOneQ => propose_move_one_q(inputs, state, rng),
        MoveKind::BirthDeathQ => propose_birth_death_q(inputs, state, rng),
        MoveKind::RateOneM => propose_rate_one_m(inputs, state, rng),
        MoveKind::MoveOneM => propose_move_one_m(inputs, state, rng),
        MoveKind::BirthDeathM => propose_birth_death_m(inputs, state, rng),
        MoveKind::OverallMRate => propose_overall_m_rate(inputs, state, rng),
        MoveKind::DegreesOfFreedom => propose_degrees_of_freedom(inputs, state, rng),
    }
}

/// Probability of attempting a birth at the current tile count.
pub fn birth_probability(num_tiles: usize, max_tiles: usize) -> f64 {
    if num_tiles <= 1 {
        1.0
    } else if num_tiles >= max_tiles {
        0.0
    } else {
        0.5
    }
}

/// Log-density of the zero-mean truncated normal used for birth effects.
pub fn ln_truncated_normal_pdf(effect: f64, variance: f64, half_interval: f64) -> f64 {
    let sd = variance.sqrt();
    let mass = 2.0 * special::norm_cdf(half_interval / sd) - 1.0;
    -0.5 * (2.0 * std::f64::consts::PI * variance).ln() - effect * effect / (2.0 * variance)
        - mass.ln()
}

fn propose_rate_one_q(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let tile = rng.index(state.q_tiles.num_tiles());
    let effect = state.q_tiles.effects[tile] + rng.normal(0.0, inputs.config().scales.q_effect);
    let tiles = state.q_tiles.with_effect(tile, effect);
    let within = calc_within(
        &tiles.effects,
        &state.q_colors,
        inputs.config().ploidy.within_scale(),
    );
    Proposal {
        kind: MoveKind::RateOneQ,
        delta: ProposalDelta::QTiles {
            tiles,
            colors: None,
            within,
        },
        ratio_ln: 0.0,
    }
}

fn propose_move_one_q(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let tile = rng.index(state.q_tiles.num_tiles());
    let scale = inputs.config().scales.q_seed;
    let old = state.q_tiles.seeds[tile];
    let seed = [old[0] + rng.normal(0.0, scale), old[1] + rng.normal(0.0, scale)];
    let tiles = state.q_tiles.with_seed(tile, seed);
    let colors = assign_colors(&tiles.seeds, inputs.graph().coords());
    let within = calc_within(
        &tiles.effects,
        &colors,
        inputs.config().ploidy.within_scale(),
    );
    Proposal {
        kind: MoveKind::MoveOneQ,
        delta: ProposalDelta::QTiles {
            tiles,
            colors: Some(colors),
            within,
        },
        ratio_ln: 0.0,
    }
}

fn propose_birth_death_q(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let prior = &inputs.config().prior;
    let (tiles, ratio_ln) = propose_birth_death(
        &state.q_tiles,
        inputs,
        state.q_rate_s2,
        prior.q_effect_half_interval,
        rng,
    );
    let colors = assign_colors(&tiles.seeds, inputs.graph().coords());
    let within = calc_within(
        &tiles.effects,
        &colors,
        inputs.config().ploidy.within_scale(),
    );
    Proposal {
        kind: MoveKind::BirthDeathQ,
        delta: ProposalDelta::QTiles {
            tiles,
            colors: Some(colors),
            within,
        },
        ratio_ln,
    }
}

fn propose_rate_one_m(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let tile = rng.index(state.m_tiles.num_tiles());
    let effect = state.m_tiles.effects[tile] + rng.normal(0.0, inputs.config().scales.m_effect);
    let tiles = state.m_tiles.with_effect(tile, effect);
    let between_inv = calc_between(
        inputs.graph(),
        &tiles.effects,
        &state.m_colors,
        state.m_rate_mu,
        inputs.config().ploidy.between_scale(),
    );
    Proposal {
        kind: MoveKind::RateOneM,
        delta: ProposalDelta::MTiles {
            tiles,
            colors: None,
            between_inv,
        },
        ratio_ln: 0.0,
    }
}

fn propose_move_one_m(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let tile = rng.index(state.m_tiles.num_tiles());
    let scale = inputs.config().scales.m_seed;
    let old = state.m_tiles.seeds[tile];
    let seed = [old[0] + rng.normal(0.0, scale), old[1] + rng.normal(0.0, scale)];
    let tiles = state.m_tiles.with_seed(tile, seed);
    let colors = assign_colors(&tiles.seeds, inputs.graph().coords());
    let between_inv = calc_between(
        inputs.graph(),
        &tiles.effects,
        &colors,
        state.m_rate_mu,
        inputs.config().ploidy.between_scale(),
    );
    Proposal {
        kind: MoveKind::MoveOneM,
        delta: ProposalDelta::MTiles {
            tiles,
            colors: Some(colors),
            between_inv,
        },
        ratio_ln: 0.0,
    }
}

fn propose_birth_death_m(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let prior = &inputs.config().prior;
    let (tiles, ratio_ln) = propose_birth_death(
        &state.m_tiles,
        inputs,
        state.m_rate_s2,
        prior.m_effect_half_interval,
        rng,
    );
    let colors = assign_colors(&tiles.seeds, inputs.graph().coords());
    let between_inv = calc_between(
        inputs.graph(),
        &tiles.effects,
        &colors,
        state.m_rate_mu,
        inputs.config().ploidy.between_scale(),
    );
    Proposal {
        kind: MoveKind::BirthDeathM,
        delta: ProposalDelta::MTiles {
            tiles,
            colors: Some(colors),
            between_inv,
        },
        ratio_ln,
    }
}

fn propose_overall_m_rate(inputs: &RunInputs, state: &ChainState, rng: &mut RngHandle) -> Proposal {
    let m_rate_mu = state.m_rate_mu + rng.normal(0.0, inputs.config().scales.m_rate_mu);
    let between_inv = calc_between(
        inputs.graph(),
        &state.m_tiles.effects,
        &state.m_colors,
        m_rate_mu,
        inputs.config().ploidy.between_scale(),
    );
    Proposal {
        kind: MoveKind::OverallMRate,
        delta: ProposalDelta::OverallMRate {
            m_rate_mu,
            between_inv,
        },
        ratio_ln: 0.0,
    }
}

fn propose_degrees_of_freedom(
    inputs: &RunInputs,
    state: &ChainState,
    rng: &mut RngHandle,
) -> Proposal {
    let df = state.df + rng.normal(0.0, inputs.config().scales.df);
    Proposal {
        kind: MoveKind::DegreesOfFreedom,
        delta: ProposalDelta::DegreesOfFreedom { df },
        ratio_ln: 0.0,
    }
}

/// Shared birth/death core: grows or shrinks a tessellation and returns the
/// log proposal ratio. The uniform seed placement cancels against the
/// uniform seed prior, so only the effect density and the birth/death coin
/// enter the ratio.
fn propose_birth_death(
    tiles: &Tessellation,
    inputs: &RunInputs,
    variance: f64,
    half_interval: f64,
    rng: &mut RngHandle,
) -> (Tessellation, f64) {
    let k = tiles.num_tiles();
    let max_tiles = inputs.config().max_tiles;
    let p_birth = birth_probability(k, max_tiles);
    if rng.uniform() < p_birth {
        let seed = inputs.habitat().sample_point(rng);
        let effect = rng.truncated_normal(variance.sqrt(), half_interval);
        let ratio_ln = (1.0 - birth_probability(k + 1, max_tiles)).ln() - p_birth.ln()
            - ln_truncated_normal_pdf(effect, variance, half_interval);
        (tiles.with_birth(seed, effect), ratio_ln)
    } else {
        let tile = rng.index(k);
        let effect = tiles.effects[tile];
        let ratio_ln = birth_probability(k - 1, max_tiles).ln() - (1.0 - p_birth).ln()
            + ln_truncated_normal_pdf(effect, variance, half_interval);
        (tiles.with_death(tile), ratio_ln)
    }
}
