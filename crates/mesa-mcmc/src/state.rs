//! Chain state, move taxonomy, and the immutable per-run inputs.

use mesa_core::errors::{ErrorInfo, MesaError};
use mesa_core::RngHandle;
use mesa_domain::{DemeGraph, Habitat, ObservedData};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::likelihood;
use crate::prior::{self, PriorParams};
use crate::stats::SufficientStats;
use crate::tessellation::{assign_colors, Tessellation};

/// The eight proposal kinds the sampler cycles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveKind {
    /// Perturb one diversity tile effect.
    RateOneQ,
    /// Jitter one diversity tile seed.
    MoveOneQ,
    /// Birth or death of a diversity tile.
    BirthDeathQ,
    /// Perturb one migration tile effect.
    RateOneM,
    /// Jitter one migration tile seed.
    MoveOneM,
    /// Birth or death of a migration tile.
    BirthDeathM,
    /// Perturb the overall migration offset.
    OverallMRate,
    /// Random walk on the degrees of freedom.
    DegreesOfFreedom,
}

impl MoveKind {
    /// All kinds in canonical selection order.
    pub const ALL: [MoveKind; 8] = [
        MoveKind::RateOneQ,
        MoveKind::MoveOneQ,
        MoveKind::BirthDeathQ,
        MoveKind::RateOneM,
        MoveKind::MoveOneM,
        MoveKind::BirthDeathM,
        MoveKind::OverallMRate,
        MoveKind::DegreesOfFreedom,
    ];

    /// Stable kebab-case name used in reports and counters.
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveKind::RateOneQ => "rate-one-q-tile",
            MoveKind::MoveOneQ => "move-one-q-tile",
            MoveKind::BirthDeathQ => "birth-death-q-tile",
            MoveKind::RateOneM => "rate-one-m-tile",
            MoveKind::MoveOneM => "move-one-m-tile",
            MoveKind::BirthDeathM => "birth-death-m-tile",
            MoveKind::OverallMRate => "overall-m-rate",
            MoveKind::DegreesOfFreedom => "degrees-of-freedom",
        }
    }
}

/// Immutable inputs shared by every iteration of a run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    habitat: Habitat,
    graph: DemeGraph,
    data: ObservedData,
    stats: SufficientStats,
    config: RunConfig,
}

impl RunInputs {
    /// Validates and bundles the problem definition.
    pub fn new(
        habitat: Habitat,
        graph: DemeGraph,
        data: ObservedData,
        config: RunConfig,
    ) -> Result<Self, MesaError> {
        if graph.num_observed() != data.num_observed() {
            return Err(MesaError::Domain(
                ErrorInfo::new(
                    "observed-count-mismatch",
                    "graph and dissimilarity data disagree on the observed deme count",
                )
                .with_context("graph", graph.num_observed().to_string())
                .with_context("data", data.num_observed().to_string()),
            ));
        }
        config.validate(data.num_observed(), data.num_individuals())?;
        let stats = SufficientStats::from_data(&data)?;
        Ok(Self {
            habitat,
            graph,
            data,
            stats,
            config,
        })
    }

    /// Habitat polygon.
    pub fn habitat(&self) -> &Habitat {
        &self.habitat
    }

    /// Deme graph.
    pub fn graph(&self) -> &DemeGraph {
        &self.graph
    }

    /// Observed dissimilarity data.
    pub fn data(&self) -> &ObservedData {
        &self.data
    }

    /// Precomputed sufficient statistics.
    pub fn stats(&self) -> &SufficientStats {
        &self.stats
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Resolved degrees-of-freedom bounds.
    pub fn df_bounds(&self) -> (f64, f64) {
        self.config
            .prior
            .df_bounds(self.data.num_observed(), self.data.num_individuals())
    }
}

/// Full parameter state of the chain plus its cached derived quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    /// Migration tessellation.
    pub m_tiles: Tessellation,
    /// Diversity tessellation.
    pub q_tiles: Tessellation,
    /// Nearest-seed coloring of demes by migration tile.
    pub m_colors: Vec<usize>,
    /// Nearest-seed coloring of demes by diversity tile.
    pub q_colors: Vec<usize>,
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
    /// Cached within-deme diversity vector over all demes.
    pub within: Vec<f64>,
    /// Cached inverse of the observed between-deme distance matrix.
    pub between_inv: Option<DMatrix<f64>>,
    /// Cached prior log-density.
    pub log_prior: f64,
    /// Cached log-likelihood.
    pub log_lik: f64,
    /// Cached scale-free trace term of the likelihood.
    pub tri_delta_qd: f64,
    /// Cached likelihood with the `sigma2` factors removed.
    pub ll_at_fixed_df: f64,
}

impl ChainState {
    /// Draws the starting state: one tile per surface, unit variances, and a
    /// uniformly drawn `df`.
    pub fn initialize(inputs: &RunInputs, rng: &mut RngHandle) -> Self {
        let (df_min, df_max) = inputs.df_bounds();
        let df = if df_min < df_max {
            rng.uniform_range(df_min, df_max)
        } else {
            df_min
        };
        let m_tiles = Tessellation::single(inputs.habitat().sample_point(rng), 0.0);
        let q_tiles = Tessellation::single(inputs.habitat().sample_point(rng), 0.0);

        let mut state = Self {
            m_tiles,
            q_tiles,
            m_colors: Vec::new(),
            q_colors: Vec::new(),
            m_rate_mu: 0.0,
            m_rate_s2: 1.0,
            q_rate_s2: 1.0,
            sigma2: 1.0,
            df,
            within: Vec::new(),
            between_inv: None,
            log_prior: 0.0,
            log_lik: 0.0,
            tri_delta_qd: f64::NAN,
            ll_at_fixed_df: 0.0,
        };
        state.refresh_caches(inputs);
        state
    }

    /// Borrowed parameter view for the prior.
    pub fn prior_params(&self) -> PriorParams<'_> {
        PriorParams {
            m_tiles: &self.m_tiles,
            q_tiles: &self.q_tiles,
            m_rate_mu: self.m_rate_mu,
            m_rate_s2: self.m_rate_s2,
            q_rate_s2: self.q_rate_s2,
            sigma2: self.sigma2,
            df: self.df,
        }
    }

    /// Recomputes every derived quantity from the parameters alone.
    pub fn refresh_caches(&mut self, inputs: &RunInputs) {
        let points = inputs.graph().coords();
        self.m_colors = assign_colors(&self.m_tiles.seeds, points);
        self.q_colors = assign_colors(&self.q_tiles.seeds, points);
        self.within = likelihood::calc_within(
            &self.q_tiles.effects,
            &self.q_colors,
            inputs.config().ploidy.within_scale(),
        );
        self.between_inv = likelihood::calc_between(
            inputs.graph(),
            &self.m_tiles.effects,
            &self.m_colors,
            self.m_rate_mu,
            inputs.config().ploidy.between_scale(),
        );
        self.log_prior = prior::ln_prior(
            &self.prior_params(),
            inputs.habitat(),
            &inputs.config().prior,
            inputs.df_bounds(),
        );
        let terms = likelihood::wishart_ln_pdf(
            self.between_inv.as_ref(),
            &self.within,
            self.sigma2,
            self.df,
            inputs.stats(),
        );
        self.tri_delta_qd = terms.tri_delta_qd;
        self.ll_at_fixed_df = terms.ll_at_fixed_df;
        self.log_lik = terms.log_lik;
    }
}

/// Replacement values a proposal carries for the state fields it touches.
#[derive(Debug, Clone)]
pub enum ProposalDelta {
    /// Diversity surface change with its rebuilt caches.
    QTiles {
        /// Proposed tessellation.
        tiles: Tessellation,
        /// Rebuilt coloring, or `None` when the seeds did not move.
        colors: Option<Vec<usize>>,
        /// Rebuilt within-deme diversity vector.
        within: Vec<f64>,
    },
    /// Migration surface change with its rebuilt caches.
    MTiles {
        /// Proposed tessellation.
        tiles: Tessellation,
        /// Rebuilt coloring, or `None` when the seeds did not move.
        colors: Option<Vec<usize>>,
        /// Rebuilt between-deme inverse.
        between_inv: Option<DMatrix<f64>>,
    },
    /// Overall migration offset change.
    OverallMRate {
        /// Proposed offset.
        m_rate_mu: f64,
        /// Rebuilt between-deme inverse.
        between_inv: Option<DMatrix<f64>>,
    },
    /// Degrees-of-freedom change.
    DegreesOfFreedom {
        /// Proposed value.
        df: f64,
    },
}

/// A complete Metropolis-Hastings proposal.
#[derive(Debug, Clone)]
pub struct Proposal {
    /// Which move generated it.
    pub kind: MoveKind,
    /// The state fields it replaces.
    pub delta: ProposalDelta,
    /// Log proposal ratio (including any dimension-change terms).
    pub ratio_ln: f64,
}
