use criterion::{criterion_group, criterion_main, Criterion};
use mesa_domain::{DemeGraph, Habitat, ObservedData};

use mesa_mcmc::{run, RunConfig, RunInputs};

fn sample_inputs(iterations: usize) -> RunInputs {
    let habitat = Habitat::rectangle(-0.5, -0.5, 1.5, 1.5).unwrap();
    let graph = DemeGraph::grid(2, 2).unwrap();
    let points = [0.0, 1.0, 3.0, 6.0, 10.0];
    let n = points.len();
    let diffs: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| (points[i] - points[j]).powi(2)).collect())
        .collect();
    let data = ObservedData::new(diffs, vec![0, 1, 2, 3, 1], 4).unwrap();

    let mut config = RunConfig::default();
    config.iterations = iterations;
    config.output.run_directory = None;
    config.checkpoint.interval = 0;
    RunInputs::new(habitat, graph, data, config).unwrap()
}

fn bench_chain(c: &mut Criterion) {
    c.bench_function("chain_40_iterations", |b| {
        b.iter(|| {
            let _ = run(sample_inputs(40)).unwrap();
        })
    });
}

criterion_group!(benches, bench_chain);
criterion_main!(benches);
