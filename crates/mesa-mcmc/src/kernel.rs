//! The Metropolis-within-Gibbs driver: move selection, acceptance, outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mesa_core::errors::ErrorInfo;
use mesa_core::{MesaError, RngHandle};
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::checkpoint::{self, CheckpointPayload};
use crate::config::OutputConfig;
use crate::determinism::{iteration_seed, Purpose};
use crate::gibbs;
use crate::likelihood;
use crate::moves;
use crate::prior;
use crate::state::{ChainState, MoveKind, Proposal, ProposalDelta, RunInputs};
use crate::trace::Trace;

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// Total iterations completed (including any resumed prefix).
    pub iterations: usize,
    /// Posterior samples recorded after burn-in and thinning.
    pub samples_recorded: usize,
    /// Acceptance rates per move kind.
    pub acceptance_rates: BTreeMap<String, f64>,
    /// Prior log-density of the final state.
    pub final_log_prior: f64,
    /// Log-likelihood of the final state.
    pub final_log_lik: f64,
    /// Migration tile count of the final state.
    pub final_num_m_tiles: usize,
    /// Diversity tile count of the final state.
    pub final_num_q_tiles: usize,
    /// Scale parameter of the final state.
    pub final_sigma2: f64,
    /// Degrees of freedom of the final state.
    pub final_df: f64,
    /// Trace CSV files written during the run.
    pub trace_paths: Vec<PathBuf>,
    /// Summary JSON path, if emitted.
    pub summary_path: Option<PathBuf>,
    /// Checkpoint files retained at the end of the run.
    pub checkpoints: Vec<PathBuf>,
}

/// A single chain stepping through iterations.
///
/// Every random decision draws from a stream derived from `(master_seed,
/// iteration, purpose)`, so a chain rebuilt from a checkpoint continues with
/// exactly the draws the uninterrupted run would have made.
pub struct Chain {
    inputs: RunInputs,
    state: ChainState,
    master_seed: u64,
    iteration: usize,
    accepted: BTreeMap<MoveKind, usize>,
    proposed: BTreeMap<MoveKind, usize>,
}

impl Chain {
    /// Starts a fresh chain from the derived initial state.
    pub fn new(inputs: RunInputs, master_seed: u64) -> Self {
        let mut init_rng = RngHandle::from_seed(iteration_seed(master_seed, 0, Purpose::Init));
        let state = ChainState::initialize(&inputs, &mut init_rng);
        Self {
            inputs,
            state,
            master_seed,
            iteration: 0,
            accepted: BTreeMap::new(),
            proposed: BTreeMap::new(),
        }
    }

    /// Rebuilds a chain at a checkpointed position.
    pub fn from_parts(
        inputs: RunInputs,
        state: ChainState,
        iteration: usize,
        master_seed: u64,
    ) -> Self {
        Self {
            inputs,
            state,
            master_seed,
            iteration,
            accepted: BTreeMap::new(),
            proposed: BTreeMap::new(),
        }
    }

    /// Rebuilds a chain from a checkpoint file, verifying its digest.
    pub fn from_checkpoint(path: &Path) -> Result<Self, MesaError> {
        let payload = CheckpointPayload::load(path)?;
        let (inputs, state, iteration, master_seed) = payload.into_run()?;
        Ok(Self::from_parts(inputs, state, iteration, master_seed))
    }

    /// Writes the current position as a digest-protected checkpoint.
    pub fn save_checkpoint(&self, path: &Path) -> Result<(), MesaError> {
        let payload =
            CheckpointPayload::new(self.iteration, self.master_seed, &self.inputs, &self.state)?;
        payload.store(path)
    }

    /// Current chain state.
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Immutable run inputs.
    pub fn inputs(&self) -> &RunInputs {
        &self.inputs
    }

    /// Completed iteration count.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Master seed of the run.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Executes one iteration: one Metropolis-Hastings move followed by the
    /// Gibbs variance updates. Returns the attempted kind and its outcome.
    pub fn step(&mut self) -> (MoveKind, bool) {
        let iter = self.iteration as u64;

        let mut select_rng =
            RngHandle::from_seed(iteration_seed(self.master_seed, iter, Purpose::Select));
        let kind = select_move(&mut select_rng, &self.inputs.config().move_weights.as_array());

        let mut proposal_rng =
            RngHandle::from_seed(iteration_seed(self.master_seed, iter, Purpose::Proposal));
        let proposal = moves::propose(kind, &self.inputs, &self.state, &mut proposal_rng);

        let candidate = self.evaluate(&proposal);
        let log_alpha = proposal.ratio_ln + (candidate.log_prior - self.state.log_prior)
            + (candidate.log_lik - self.state.log_lik);

        let mut accept_rng =
            RngHandle::from_seed(iteration_seed(self.master_seed, iter, Purpose::Accept));
        let accepted = metropolis_accept(&mut accept_rng, log_alpha);
        self.record(kind, accepted);
        if accepted {
            self.state = candidate;
        }

        let mut gibbs_rng =
            RngHandle::from_seed(iteration_seed(self.master_seed, iter, Purpose::Gibbs));
        gibbs::update_sigma2(&mut self.state, &self.inputs, &mut gibbs_rng);
        gibbs::update_hyperparams(&mut self.state, &self.inputs, &mut gibbs_rng);

        self.iteration += 1;
        (kind, accepted)
    }

    /// Scores the state a proposal would produce, reusing the caches the
    /// proposal carries. The likelihood is skipped when the prior already
    /// excludes the candidate.
    fn evaluate(&self, proposal: &Proposal) -> ChainState {
        let mut candidate = self.state.clone();
        match &proposal.delta {
            ProposalDelta::QTiles {
                tiles,
                colors,
                within,
            } => {
                candidate.q_tiles = tiles.clone();
                if let Some(colors) = colors {
                    candidate.q_colors = colors.clone();
                }
                candidate.within = within.clone();
            }
            ProposalDelta::MTiles {
                tiles,
                colors,
                between_inv,
            } => {
                candidate.m_tiles = tiles.clone();
                if let Some(colors) = colors {
                    candidate.m_colors = colors.clone();
                }
                candidate.between_inv = between_inv.clone();
            }
            ProposalDelta::OverallMRate {
                m_rate_mu,
                between_inv,
            } => {
                candidate.m_rate_mu = *m_rate_mu;
                candidate.between_inv = between_inv.clone();
            }
            ProposalDelta::DegreesOfFreedom { df } => {
                candidate.df = *df;
            }
        }

        candidate.log_prior = prior::ln_prior(
            &candidate.prior_params(),
            self.inputs.habitat(),
            &self.inputs.config().prior,
            self.inputs.df_bounds(),
        );
        if candidate.log_prior == f64::NEG_INFINITY {
            candidate.tri_delta_qd = f64::NAN;
            candidate.ll_at_fixed_df = f64::NEG_INFINITY;
            candidate.log_lik = f64::NEG_INFINITY;
        } else {
            let terms = likelihood::wishart_ln_pdf(
                candidate.between_inv.as_ref(),
                &candidate.within,
                candidate.sigma2,
                candidate.df,
                self.inputs.stats(),
            );
            candidate.tri_delta_qd = terms.tri_delta_qd;
            candidate.ll_at_fixed_df = terms.ll_at_fixed_df;
            candidate.log_lik = terms.log_lik;
        }
        candidate
    }

    fn record(&mut self, kind: MoveKind, accepted: bool) {
        *self.proposed.entry(kind).or_insert(0) += 1;
        if accepted {
            *self.accepted.entry(kind).or_insert(0) += 1;
        }
    }

    /// Acceptance rates per move kind since this chain object was created.
    pub fn acceptance_rates(&self) -> BTreeMap<String, f64> {
        self.proposed
            .iter()
            .map(|(kind, &proposed)| {
                let accepted = self.accepted.get(kind).copied().unwrap_or(0);
                let rate = if proposed == 0 {
                    0.0
                } else {
                    accepted as f64 / proposed as f64
                };
                (kind.as_str().to_string(), rate)
            })
            .collect()
    }

    /// Recomputes every cache from scratch and compares against the state.
    pub fn self_consistency_check(&self) -> bool {
        audit::self_consistency_check(&self.inputs, &self.state)
    }
}

// A NaN log_alpha (both states out of support) compares false, so the move
// is rejected rather than silently accepted.
fn metropolis_accept(rng: &mut RngHandle, log_alpha: f64) -> bool {
    rng.uniform().ln() < log_alpha
}

fn select_move(rng: &mut RngHandle, weights: &[f64; 8]) -> MoveKind {
    let total: f64 = weights.iter().sum();
    let draw = rng.uniform() * total;
    let mut acc = 0.0;
    let mut last_positive = MoveKind::ALL[0];
    for (kind, &weight) in MoveKind::ALL.iter().zip(weights.iter()) {
        if weight <= 0.0 {
            continue;
        }
        last_positive = *kind;
        acc += weight;
        if draw < acc {
            return *kind;
        }
    }
    last_positive
}

/// Runs the sampler from scratch.
pub fn run(inputs: RunInputs) -> Result<RunSummary, MesaError> {
    let master_seed = inputs.config().seed_policy.master_seed;
    let chain = Chain::new(inputs, master_seed);
    run_chain(chain, Trace::new())
}

/// Resumes a run from a checkpoint file.
///
/// The chain continues bit for bit where it stopped; the trace buffer starts
/// empty, so only samples recorded after the checkpoint appear in the CSVs.
pub fn resume(path: &Path) -> Result<RunSummary, MesaError> {
    let chain = Chain::from_checkpoint(path)?;
    run_chain(chain, Trace::new())
}

fn run_chain(mut chain: Chain, mut trace: Trace) -> Result<RunSummary, MesaError> {
    let config = chain.inputs().config().clone();
    let layout = resolve_output_paths(&config.output);
    let mut checkpoints = Vec::new();

    while chain.iteration() < config.iterations {
        let iter = chain.iteration();
        chain.step();
        if iter >= config.burn_in && (iter - config.burn_in) % config.thinning == 0 {
            trace.record(iter, chain.state());
        }
        if config.checkpoint.interval > 0
            && (iter + 1) % config.checkpoint.interval == 0
            && layout.checkpoint_dir.is_some()
        {
            let dir = layout.checkpoint_dir.clone().unwrap_or_default();
            let path = checkpoint::checkpoint_path(&dir, iter + 1);
            chain.save_checkpoint(&path)?;
            checkpoints.push(path);
            enforce_checkpoint_retention(&mut checkpoints, config.checkpoint.max_to_keep)?;
        }
    }

    let trace_paths = if let Some(trace_dir) = layout.trace_dir.clone() {
        trace.write_csv(&trace_dir).map_err(|err| {
            MesaError::Serde(
                ErrorInfo::new("trace-write", err.to_string())
                    .with_context("path", trace_dir.display().to_string()),
            )
        })?
    } else {
        Vec::new()
    };

    let state = chain.state();
    let mut summary = RunSummary {
        iterations: chain.iteration(),
        samples_recorded: trace.len(),
        acceptance_rates: chain.acceptance_rates(),
        final_log_prior: state.log_prior,
        final_log_lik: state.log_lik,
        final_num_m_tiles: state.m_tiles.num_tiles(),
        final_num_q_tiles: state.q_tiles.num_tiles(),
        final_sigma2: state.sigma2,
        final_df: state.df,
        trace_paths,
        summary_path: None,
        checkpoints,
    };

    if let Some(summary_path) = layout.summary_file.clone() {
        summary.summary_path = Some(summary_path.clone());
        let text = serde_json::to_string_pretty(&summary).map_err(|err| {
            MesaError::Serde(ErrorInfo::new("summary-encode", err.to_string()))
        })?;
        std::fs::write(&summary_path, text).map_err(|err| {
            MesaError::Serde(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", summary_path.display().to_string()),
            )
        })?;
    }

    Ok(summary)
}

fn enforce_checkpoint_retention(
    paths: &mut Vec<PathBuf>,
    max_to_keep: usize,
) -> Result<(), MesaError> {
    if paths.len() <= max_to_keep {
        return Ok(());
    }
    let mut removed = Vec::new();
    while paths.len() > max_to_keep {
        removed.push(paths.remove(0));
    }
    for path in removed {
        std::fs::remove_file(&path).map_err(|err| {
            MesaError::Checkpoint(
                ErrorInfo::new("checkpoint-remove", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
    }
    Ok(())
}

#[derive(Default)]
struct ResolvedOutput {
    trace_dir: Option<PathBuf>,
    checkpoint_dir: Option<PathBuf>,
    summary_file: Option<PathBuf>,
}

fn resolve_output_paths(config: &OutputConfig) -> ResolvedOutput {
    match &config.run_directory {
        None => ResolvedOutput::default(),
        Some(run_dir) => ResolvedOutput {
            trace_dir: Some(run_dir.join(&config.trace_dir)),
            checkpoint_dir: Some(run_dir.join(&config.checkpoint_dir)),
            summary_file: Some(run_dir.join(&config.summary_file)),
        },
    }
}
