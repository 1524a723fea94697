#![deny(missing_docs)]
//! Reversible-jump MCMC sampler for effective migration and diversity rate
//! surfaces over a deme graph, driven by a Wishart likelihood on observed
//! genetic dissimilarity contrasts.

/// Chain-versus-recomputation consistency audit.
pub mod audit;
/// Checkpoint serialization with digest verification.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Conjugate inverse-gamma Gibbs updates.
pub mod gibbs;
/// Core sampling kernel and public `run`/`resume` entry points.
pub mod kernel;
/// Within/between rate assembly and the Wishart log-density.
pub mod likelihood;
/// The eight proposal generators.
pub mod moves;
/// Log-prior evaluation.
pub mod prior;
/// Special functions (log-gamma, erf, multivariate log-gamma).
pub mod special;
/// Chain state, proposal diffs, and fixed run inputs.
pub mod state;
/// Per-run sufficient statistics of the observed data.
pub mod stats;
/// Voronoi tile vectors and nearest-seed coloring.
pub mod tessellation;
/// Trace buffers and CSV export.
pub mod trace;

pub use config::{
    CheckpointConfig, MoveWeights, OutputConfig, Ploidy, PriorConfig, ProposalScales, RunConfig,
    SeedPolicy,
};
pub use kernel::{resume, run, Chain, RunSummary};
pub use state::{ChainState, MoveKind, Proposal, ProposalDelta, RunInputs};
pub use stats::SufficientStats;
