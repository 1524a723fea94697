use std::path::PathBuf;

use mesa_core::errors::{ErrorInfo, MesaError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing a sampler run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Total number of iterations to execute (including burn-in).
    pub iterations: usize,
    /// Number of initial iterations to discard from the trace.
    #[serde(default)]
    pub burn_in: usize,
    /// Interval at which post burn-in states are recorded.
    #[serde(default = "default_thinning")]
    pub thinning: usize,
    /// Maximum number of tiles allowed in either tessellation.
    #[serde(default = "default_max_tiles")]
    pub max_tiles: usize,
    /// Ploidy of the organism, fixing the rate scaling constants.
    #[serde(default)]
    pub ploidy: Ploidy,
    /// Relative selection weights for the eight move types.
    #[serde(default)]
    pub move_weights: MoveWeights,
    /// Random-walk standard deviations for the proposal generators.
    #[serde(default)]
    pub scales: ProposalScales,
    /// Hyperparameters of the hierarchical prior.
    #[serde(default)]
    pub prior: PriorConfig,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

fn default_thinning() -> usize {
    1
}

fn default_max_tiles() -> usize {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: 2000,
            burn_in: 0,
            thinning: 1,
            max_tiles: default_max_tiles(),
            ploidy: Ploidy::default(),
            move_weights: MoveWeights::default(),
            scales: ProposalScales::default(),
            prior: PriorConfig::default(),
            checkpoint: CheckpointConfig::default(),
            output: OutputConfig::default(),
            seed_policy: SeedPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Parses a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, MesaError> {
        serde_yaml::from_str(text).map_err(|err| {
            MesaError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Validates the configuration against the observed problem dimensions.
    pub fn validate(&self, num_observed: usize, num_individuals: usize) -> Result<(), MesaError> {
        if self.iterations == 0 {
            return Err(config_error("no-iterations", "iterations must be positive"));
        }
        if self.thinning == 0 {
            return Err(config_error("zero-thinning", "thinning must be at least one"));
        }
        if self.burn_in >= self.iterations {
            return Err(config_error(
                "burn-in-too-long",
                "burn-in must leave at least one recorded iteration",
            ));
        }
        // Birth/death needs headroom above the single tile every surface keeps.
        if self.max_tiles < 2 {
            return Err(config_error("bad-max-tiles", "max_tiles must be at least two"));
        }
        let weights = self.move_weights.as_array();
        if weights.iter().any(|&w| !(w >= 0.0) || !w.is_finite()) {
            return Err(config_error("bad-move-weight", "move weights must be finite and >= 0"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(config_error("all-zero-weights", "at least one move weight must be positive"));
        }
        for (name, value) in [
            ("q_effect", self.scales.q_effect),
            ("m_effect", self.scales.m_effect),
            ("q_seed", self.scales.q_seed),
            ("m_seed", self.scales.m_seed),
            ("m_rate_mu", self.scales.m_rate_mu),
            ("df", self.scales.df),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(MesaError::Config(
                    ErrorInfo::new("bad-proposal-scale", "proposal scales must be finite and > 0")
                        .with_context("scale", name),
                ));
            }
        }
        self.prior.validate(num_observed, num_individuals)
    }
}

fn config_error(code: &str, message: &str) -> MesaError {
    MesaError::Config(ErrorInfo::new(code, message))
}

/// Organism ploidy, which fixes the within/between rate scaling constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Ploidy {
    /// Diploid organisms (scaling 1/1).
    #[default]
    Diploid,
    /// Haploid organisms (within rates doubled, resistances scaled by four).
    Haploid,
}

impl Ploidy {
    /// Multiplier applied to within-deme diversity rates.
    pub fn within_scale(&self) -> f64 {
        match self {
            Ploidy::Diploid => 1.0,
            Ploidy::Haploid => 2.0,
        }
    }

    /// Multiplier applied to between-deme resistance distances.
    pub fn between_scale(&self) -> f64 {
        match self {
            Ploidy::Diploid => 1.0,
            Ploidy::Haploid => 4.0,
        }
    }
}

/// Relative selection weights for the eight move types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveWeights {
    /// Perturb one diversity tile effect.
    #[serde(default = "default_move_weight")]
    pub rate_one_q: f64,
    /// Jitter one diversity tile seed.
    #[serde(default = "default_move_weight")]
    pub move_one_q: f64,
    /// Birth/death of a diversity tile.
    #[serde(default = "default_move_weight")]
    pub birth_death_q: f64,
    /// Perturb one migration tile effect.
    #[serde(default = "default_move_weight")]
    pub rate_one_m: f64,
    /// Jitter one migration tile seed.
    #[serde(default = "default_move_weight")]
    pub move_one_m: f64,
    /// Birth/death of a migration tile.
    #[serde(default = "default_move_weight")]
    pub birth_death_m: f64,
    /// Perturb the overall migration offset.
    #[serde(default = "default_move_weight")]
    pub overall_m_rate: f64,
    /// Random walk on the Wishart degrees of freedom.
    #[serde(default = "default_move_weight")]
    pub degrees_of_freedom: f64,
}

fn default_move_weight() -> f64 {
    1.0
}

impl MoveWeights {
    /// Returns the weights in canonical move order.
    pub fn as_array(&self) -> [f64; 8] {
        [
            self.rate_one_q,
            self.move_one_q,
            self.birth_death_q,
            self.rate_one_m,
            self.move_one_m,
            self.birth_death_m,
            self.overall_m_rate,
            self.degrees_of_freedom,
        ]
    }
}

impl Default for MoveWeights {
    fn default() -> Self {
        Self {
            rate_one_q: default_move_weight(),
            move_one_q: default_move_weight(),
            birth_death_q: default_move_weight(),
            rate_one_m: default_move_weight(),
            move_one_m: default_move_weight(),
            birth_death_m: default_move_weight(),
            overall_m_rate: default_move_weight(),
            degrees_of_freedom: default_move_weight(),
        }
    }
}

/// Random-walk standard deviations used by the proposal generators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalScales {
    /// Diversity effect perturbation.
    #[serde(default = "default_effect_scale")]
    pub q_effect: f64,
    /// Migration effect perturbation.
    #[serde(default = "default_effect_scale")]
    pub m_effect: f64,
    /// Diversity seed jitter (per coordinate).
    #[serde(default = "default_seed_scale")]
    pub q_seed: f64,
    /// Migration seed jitter (per coordinate).
    #[serde(default = "default_seed_scale")]
    pub m_seed: f64,
    /// Overall migration offset perturbation.
    #[serde(default = "default_mu_scale")]
    pub m_rate_mu: f64,
    /// Degrees-of-freedom random walk.
    #[serde(default = "default_df_scale")]
    pub df: f64,
}

fn default_effect_scale() -> f64 {
    0.1
}

fn default_seed_scale() -> f64 {
    0.2
}

fn default_mu_scale() -> f64 {
    0.05
}

fn default_df_scale() -> f64 {
    1.0
}

impl Default for ProposalScales {
    fn default() -> Self {
        Self {
            q_effect: default_effect_scale(),
            m_effect: default_effect_scale(),
            q_seed: default_seed_scale(),
            m_seed: default_seed_scale(),
            m_rate_mu: default_mu_scale(),
            df: default_df_scale(),
        }
    }
}

/// Hyperparameters of the hierarchical prior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorConfig {
    /// Negative-binomial size parameter on tile counts.
    #[serde(default = "default_nb_size")]
    pub nb_size: f64,
    /// Negative-binomial success probability on tile counts.
    #[serde(default = "default_nb_prob")]
    pub nb_prob: f64,
    /// Hard bound on migration effects (log10).
    #[serde(default = "default_m_half_interval")]
    pub m_effect_half_interval: f64,
    /// Hard bound on diversity effects (log10).
    #[serde(default = "default_q_half_interval")]
    pub q_effect_half_interval: f64,
    /// Hard bound on the overall migration offset (log10).
    #[serde(default = "default_mu_half_interval")]
    pub m_rate_mu_half_interval: f64,
    /// Inverse-gamma shape for the migration effect variance.
    #[serde(default = "default_variance_shape")]
    pub m_rate_shape: f64,
    /// Inverse-gamma scale for the migration effect variance.
    #[serde(default = "default_variance_scale")]
    pub m_rate_scale: f64,
    /// Inverse-gamma shape for the diversity effect variance.
    #[serde(default = "default_variance_shape")]
    pub q_rate_shape: f64,
    /// Inverse-gamma scale for the diversity effect variance.
    #[serde(default = "default_variance_scale")]
    pub q_rate_scale: f64,
    /// Inverse-gamma shape for the scale parameter `sigma2`.
    #[serde(default = "default_variance_shape")]
    pub sigma2_shape: f64,
    /// Inverse-gamma scale for the scale parameter `sigma2`.
    #[serde(default = "default_variance_scale")]
    pub sigma2_scale: f64,
    /// Lower bound for the degrees of freedom (defaults to the observed deme count).
    #[serde(default)]
    pub df_min: Option<f64>,
    /// Upper bound for the degrees of freedom (defaults to the individual count).
    #[serde(default)]
    pub df_max: Option<f64>,
}

fn default_nb_size() -> f64 {
    10.0
}

fn default_nb_prob() -> f64 {
    0.67
}

fn default_m_half_interval() -> f64 {
    2.0
}

fn default_q_half_interval() -> f64 {
    0.1
}

fn default_mu_half_interval() -> f64 {
    2.5
}

fn default_variance_shape() -> f64 {
    0.001
}

fn default_variance_scale() -> f64 {
    1.0
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            nb_size: default_nb_size(),
            nb_prob: default_nb_prob(),
            m_effect_half_interval: default_m_half_interval(),
            q_effect_half_interval: default_q_half_interval(),
            m_rate_mu_half_interval: default_mu_half_interval(),
            m_rate_shape: default_variance_shape(),
            m_rate_scale: default_variance_scale(),
            q_rate_shape: default_variance_shape(),
            q_rate_scale: default_variance_scale(),
            sigma2_shape: default_variance_shape(),
            sigma2_scale: default_variance_scale(),
            df_min: None,
            df_max: None,
        }
    }
}

impl PriorConfig {
    /// Resolves the degrees-of-freedom bounds against the problem dimensions.
    pub fn df_bounds(&self, num_observed: usize, num_individuals: usize) -> (f64, f64) {
        (
            self.df_min.unwrap_or(num_observed as f64),
            self.df_max.unwrap_or(num_individuals as f64),
        )
    }

    fn validate(&self, num_observed: usize, num_individuals: usize) -> Result<(), MesaError> {
        if !(self.nb_size > 0.0) {
            return Err(config_error("bad-nb-size", "nb_size must be positive"));
        }
        if !(self.nb_prob > 0.0 && self.nb_prob < 1.0) {
            return Err(config_error("bad-nb-prob", "nb_prob must lie in (0, 1)"));
        }
        for (name, value) in [
            ("m_effect_half_interval", self.m_effect_half_interval),
            ("q_effect_half_interval", self.q_effect_half_interval),
            ("m_rate_mu_half_interval", self.m_rate_mu_half_interval),
            ("m_rate_shape", self.m_rate_shape),
            ("m_rate_scale", self.m_rate_scale),
            ("q_rate_shape", self.q_rate_shape),
            ("q_rate_scale", self.q_rate_scale),
            ("sigma2_shape", self.sigma2_shape),
            ("sigma2_scale", self.sigma2_scale),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(MesaError::Config(
                    ErrorInfo::new("bad-prior-parameter", "prior parameters must be finite and > 0")
                        .with_context("parameter", name),
                ));
            }
        }
        let (df_min, df_max) = self.df_bounds(num_observed, num_individuals);
        if !(df_min > num_observed as f64 - 1.0) {
            return Err(MesaError::Config(
                ErrorInfo::new("bad-df-bounds", "df_min must exceed the observed deme count minus one")
                    .with_context("df_min", df_min.to_string()),
            ));
        }
        if df_min > df_max {
            return Err(MesaError::Config(
                ErrorInfo::new("bad-df-bounds", "df_min must not exceed df_max")
                    .with_context("df_min", df_min.to_string())
                    .with_context("df_max", df_max.to_string()),
            ));
        }
        Ok(())
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointConfig {
    /// Interval in iterations between checkpoint writes (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Subdirectory for trace CSV files.
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// Summary filename relative to `run_directory`.
    #[serde(default = "default_summary_filename")]
    pub summary_file: PathBuf,
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from("traces")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

fn default_summary_filename() -> PathBuf {
    PathBuf::from("summary.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            trace_dir: default_trace_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            summary_file: default_summary_filename(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label used when deriving substream seeds (documented in summaries).
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
