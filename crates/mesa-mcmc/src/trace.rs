//! In-memory posterior trace and its CSV export.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::state::ChainState;
use crate::tessellation::Tessellation;

/// One recorded posterior sample.
#[derive(Debug, Clone, PartialEq)]
struct Sample {
    iteration: usize,
    m_tiles: Tessellation,
    q_tiles: Tessellation,
    m_rate_mu: f64,
    m_rate_s2: f64,
    q_rate_s2: f64,
    sigma2: f64,
    df: f64,
    log_prior: f64,
    log_lik: f64,
}

/// Buffered samples recorded after burn-in, exported as CSV at the end of a
/// run. The buffer is rebuilt on resume rather than checkpointed.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    samples: Vec<Sample>,
}

impl Trace {
    /// Creates an empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether anything has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Records a snapshot of the current state.
    pub fn record(&mut self, iteration: usize, state: &ChainState) {
        self.samples.push(Sample {
            iteration,
            m_tiles: state.m_tiles.clone(),
            q_tiles: state.q_tiles.clone(),
            m_rate_mu: state.m_rate_mu,
            m_rate_s2: state.m_rate_s2,
            q_rate_s2: state.q_rate_s2,
            sigma2: state.sigma2,
            df: state.df,
            log_prior: state.log_prior,
            log_lik: state.log_lik,
        });
    }

    /// Writes the trace as CSV files under `dir` and returns their paths.
    ///
    /// `params.csv` holds one scalar row per sample; the tile files are in
    /// long format with one row per (sample, tile) pair. Migration rows carry
    /// linear rates `10^(mu + effect)`, diversity rows `10^effect`.
    pub fn write_csv(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut paths = Vec::new();

        let params_path = dir.join("params.csv");
        let mut params = fs::File::create(&params_path)?;
        writeln!(
            params,
            "iteration,num_m_tiles,num_q_tiles,m_rate_mu,m_rate_s2,q_rate_s2,sigma2,df,log_prior,log_lik"
        )?;
        for s in &self.samples {
            writeln!(
                params,
                "{},{},{},{},{},{},{},{},{},{}",
                s.iteration,
                s.m_tiles.num_tiles(),
                s.q_tiles.num_tiles(),
                s.m_rate_mu,
                s.m_rate_s2,
                s.q_rate_s2,
                s.sigma2,
                s.df,
                s.log_prior,
                s.log_lik
            )?;
        }
        paths.push(params_path);

        paths.push(self.write_rates(dir, "m_rates.csv", |s| {
            s.m_tiles
                .effects
                .iter()
                .map(|e| 10f64.powf(s.m_rate_mu + e))
                .collect()
        })?);
        paths.push(self.write_rates(dir, "q_rates.csv", |s| {
            s.q_tiles.effects.iter().map(|e| 10f64.powf(*e)).collect()
        })?);
        paths.push(self.write_seeds(dir, "m_seeds.csv", |s| &s.m_tiles.seeds)?);
        paths.push(self.write_seeds(dir, "q_seeds.csv", |s| &s.q_tiles.seeds)?);

        Ok(paths)
    }

    fn write_rates(
        &self,
        dir: &Path,
        name: &str,
        rates: impl Fn(&Sample) -> Vec<f64>,
    ) -> io::Result<PathBuf> {
        let path = dir.join(name);
        let mut file = fs::File::create(&path)?;
        writeln!(file, "iteration,tile,rate")?;
        for s in &self.samples {
            for (tile, rate) in rates(s).into_iter().enumerate() {
                writeln!(file, "{},{},{}", s.iteration, tile, rate)?;
            }
        }
        Ok(path)
    }

    fn write_seeds(
        &self,
        dir: &Path,
        name: &str,
        seeds: impl Fn(&Sample) -> &[[f64; 2]],
    ) -> io::Result<PathBuf> {
        let path = dir.join(name);
        let mut file = fs::File::create(&path)?;
        writeln!(file, "iteration,tile,x,y")?;
        for s in &self.samples {
            for (tile, seed) in seeds(s).iter().enumerate() {
                writeln!(file, "{},{},{},{}", s.iteration, tile, seed[0], seed[1])?;
            }
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::state::RunInputs;
    use mesa_domain::{DemeGraph, Habitat, ObservedData};

    fn recorded_trace() -> Trace {
        let habitat = Habitat::rectangle(-0.5, -0.5, 1.5, 1.5).expect("habitat");
        let graph = DemeGraph::grid(2, 2).expect("grid");
        let points: [f64; 4] = [0.0, 1.0, 3.0, 6.0];
        let diffs: Vec<Vec<f64>> = (0..4)
            .map(|i| (0..4).map(|j| (points[i] - points[j]).powi(2)).collect())
            .collect();
        let data = ObservedData::new(diffs, vec![0, 1, 2, 3], 4).expect("data");
        let inputs =
            RunInputs::new(habitat, graph, data, RunConfig::default()).expect("inputs");
        let mut rng = mesa_core::RngHandle::from_seed(21);
        let state = ChainState::initialize(&inputs, &mut rng);
        let mut trace = Trace::new();
        trace.record(0, &state);
        trace.record(5, &state);
        trace
    }

    #[test]
    fn writes_all_five_files() {
        let trace = recorded_trace();
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = trace.write_csv(dir.path()).expect("write");
        assert_eq!(paths.len(), 5);
        for path in &paths {
            assert!(path.exists(), "missing {}", path.display());
        }
    }

    #[test]
    fn params_csv_has_one_row_per_sample() {
        let trace = recorded_trace();
        let dir = tempfile::tempdir().expect("tempdir");
        trace.write_csv(dir.path()).expect("write");
        let text = std::fs::read_to_string(dir.path().join("params.csv")).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + trace.len());
        assert!(lines[0].starts_with("iteration,num_m_tiles"));
        assert!(lines[1].starts_with("0,1,1,"));
        assert!(lines[2].starts_with("5,1,1,"));
    }

    #[test]
    fn rate_rows_are_linear_scale() {
        let trace = recorded_trace();
        let dir = tempfile::tempdir().expect("tempdir");
        trace.write_csv(dir.path()).expect("write");
        let text = std::fs::read_to_string(dir.path().join("q_rates.csv")).expect("read");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("iteration,tile,rate"));
        let first = lines.next().expect("row");
        let rate: f64 = first.split(',').nth(2).expect("rate").parse().expect("f64");
        // Initial effects are zero, so linear rates are exactly one.
        assert!((rate - 1.0).abs() < 1e-12);
    }
}
