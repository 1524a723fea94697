//! Digest-verified JSON checkpoints for exact resume.

use std::fs;
use std::path::{Path, PathBuf};

use mesa_core::errors::{ErrorInfo, MesaError};
use mesa_domain::{DemeGraph, Habitat, ObservedData};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RunConfig;
use crate::state::{ChainState, RunInputs};

/// Everything needed to rebuild a run mid-flight.
///
/// The payload embeds the full problem definition, so a checkpoint file is
/// self-contained and resume needs no other artefacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Number of completed iterations.
    pub iteration: usize,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Run configuration.
    pub config: RunConfig,
    /// Habitat polygon.
    pub habitat: Habitat,
    /// Deme graph.
    pub graph: DemeGraph,
    /// Observed dissimilarity matrix.
    pub diffs: Vec<Vec<f64>>,
    /// Deme assignment of each individual.
    pub deme_of: Vec<usize>,
    /// Chain state at the checkpoint.
    pub state: ChainState,
    /// Hex SHA-256 over the iteration, seed, and serialized state.
    pub digest: String,
}

impl CheckpointPayload {
    /// Builds a payload for the current position of a run.
    pub fn new(
        iteration: usize,
        master_seed: u64,
        inputs: &RunInputs,
        state: &ChainState,
    ) -> Result<Self, MesaError> {
        let digest = state_digest(iteration, master_seed, state)?;
        Ok(Self {
            iteration,
            master_seed,
            config: inputs.config().clone(),
            habitat: inputs.habitat().clone(),
            graph: inputs.graph().clone(),
            diffs: inputs.data().diffs().to_vec(),
            deme_of: inputs.data().deme_of().to_vec(),
            state: state.clone(),
            digest,
        })
    }

    /// Writes the payload as pretty JSON.
    pub fn store(&self, path: &Path) -> Result<(), MesaError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                MesaError::Checkpoint(
                    ErrorInfo::new("checkpoint-io", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|err| {
            MesaError::Serde(ErrorInfo::new("checkpoint-encode", err.to_string()))
        })?;
        fs::write(path, text).map_err(|err| {
            MesaError::Checkpoint(
                ErrorInfo::new("checkpoint-io", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Reads a payload and verifies its digest.
    pub fn load(path: &Path) -> Result<Self, MesaError> {
        let text = fs::read_to_string(path).map_err(|err| {
            MesaError::Checkpoint(
                ErrorInfo::new("checkpoint-io", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let payload: Self = serde_json::from_str(&text).map_err(|err| {
            MesaError::Serde(
                ErrorInfo::new("checkpoint-decode", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let expected = state_digest(payload.iteration, payload.master_seed, &payload.state)?;
        if expected != payload.digest {
            return Err(MesaError::Checkpoint(
                ErrorInfo::new("digest-mismatch", "checkpoint digest does not match its state")
                    .with_context("path", path.display().to_string())
                    .with_hint("the file was edited or truncated after it was written"),
            ));
        }
        Ok(payload)
    }

    /// Rebuilds the validated inputs and state for resuming.
    pub fn into_run(self) -> Result<(RunInputs, ChainState, usize, u64), MesaError> {
        let num_observed = self.graph.num_observed();
        let data = ObservedData::new(self.diffs, self.deme_of, num_observed)?;
        let inputs = RunInputs::new(self.habitat, self.graph, data, self.config)?;
        check_state_shape(&inputs, &self.state)?;
        Ok((inputs, self.state, self.iteration, self.master_seed))
    }
}

/// Canonical checkpoint filename for an iteration count.
pub fn checkpoint_path(root: &Path, iteration: usize) -> PathBuf {
    root.join(format!("ckpt_{iteration:07}.json"))
}

fn state_digest(
    iteration: usize,
    master_seed: u64,
    state: &ChainState,
) -> Result<String, MesaError> {
    let state_bytes = serde_json::to_vec(state).map_err(|err| {
        MesaError::Serde(ErrorInfo::new("checkpoint-encode", err.to_string()))
    })?;
    let mut hasher = Sha256::new();
    hasher.update((iteration as u64).to_le_bytes());
    hasher.update(master_seed.to_le_bytes());
    hasher.update(&state_bytes);
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

fn check_state_shape(inputs: &RunInputs, state: &ChainState) -> Result<(), MesaError> {
    let num_demes = inputs.graph().num_demes();
    let shape_ok = state.m_colors.len() == num_demes
        && state.q_colors.len() == num_demes
        && state.within.len() == num_demes
        && state.m_tiles.seeds.len() == state.m_tiles.effects.len()
        && state.q_tiles.seeds.len() == state.q_tiles.effects.len()
        && state.m_tiles.num_tiles() > 0
        && state.q_tiles.num_tiles() > 0
        && state.m_colors.iter().all(|&c| c < state.m_tiles.num_tiles())
        && state.q_colors.iter().all(|&c| c < state.q_tiles.num_tiles());
    if !shape_ok {
        return Err(MesaError::Checkpoint(
            ErrorInfo::new("corrupt-state", "checkpointed state does not fit the problem")
                .with_context("demes", num_demes.to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_core::RngHandle;

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
        let mut rng = RngHandle::from_seed(13);
        let state = ChainState::initialize(&inputs, &mut rng);
        (inputs, state)
    }

    #[test]
    fn round_trips_through_disk() {
        let (inputs, state) = sample_run();
        let payload = CheckpointPayload::new(42, 99, &inputs, &state).expect("payload");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = checkpoint_path(dir.path(), 42);
        assert!(path.to_string_lossy().ends_with("ckpt_0000042.json"));
        payload.store(&path).expect("store");
        let loaded = CheckpointPayload::load(&path).expect("load");
        let (_inputs, restored, iteration, master_seed) = loaded.into_run().expect("rebuild");
        assert_eq!(restored, state);
        assert_eq!(iteration, 42);
        assert_eq!(master_seed, 99);
    }

    #[test]
    fn rejects_tampered_files() {
        let (inputs, state) = sample_run();
        let payload = CheckpointPayload::new(7, 1, &inputs, &state).expect("payload");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = checkpoint_path(dir.path(), 7);
        payload.store(&path).expect("store");
        let text = fs::read_to_string(&path).expect("read");
        let tampered = text.replacen("\"iteration\": 7", "\"iteration\": 8", 1);
        assert_ne!(text, tampered);
        fs::write(&path, tampered).expect("write");
        let err = CheckpointPayload::load(&path).unwrap_err();
        assert_eq!(err.info().code, "digest-mismatch");
    }

    #[test]
    fn rejects_state_with_wrong_shape() {
        let (inputs, state) = sample_run();
        let mut payload = CheckpointPayload::new(0, 1, &inputs, &state).expect("payload");
        payload.state.m_colors.pop();
        payload.digest = state_digest(0, 1, &payload.state).expect("digest");
        let err = payload.into_run().unwrap_err();
        assert_eq!(err.info().code, "corrupt-state");
    }

    #[test]
    fn missing_file_reports_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = CheckpointPayload::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.info().code, "checkpoint-io");
    }
}
