//! Benchmarks for the model-fitting hot paths: forests, penalized paths and SMOTE
//!
//! Run with: cargo bench --bench forest_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use faer::Mat;
use rand::prelude::*;
use rand::rngs::StdRng;

use pisarisk::pipeline::model::{lambda_path, ForestParams, PenalizedLogistic, RandomForest};
use pisarisk::pipeline::{EncodedData, Smote};

/// One-hot blocks of four-level questions, roughly 30% events driven by the
/// first question
fn generate_design(n_rows: usize, n_questions: usize, seed: u64) -> EncodedData {
    let mut rng = StdRng::seed_from_u64(seed);
    let levels: Vec<usize> = (0..n_rows * n_questions).map(|_| rng.gen_range(0..4)).collect();
    let y: Vec<u8> = (0..n_rows)
        .map(|i| {
            let p = if levels[i * n_questions] == 0 { 0.7 } else { 0.15 };
            u8::from(rng.gen::<f64>() < p)
        })
        .collect();

    let p = n_questions * 4;
    let x = Mat::from_fn(n_rows, p, |i, j| {
        let (question, level) = (j / 4, j % 4);
        if levels[i * n_questions + question] == level {
            1.0
        } else {
            0.0
        }
    });

    EncodedData {
        x,
        y,
        columns: (0..p).map(|j| format!("ST{:02}Q01={}", j / 4 + 1, j % 4 + 1)).collect(),
        groups: (0..p).map(|j| j / 4).collect(),
    }
}

/// Forest fitting for varying row counts
fn benchmark_forest_by_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_by_rows");
    group.sample_size(10);

    let params = ForestParams {
        n_trees: 100,
        ..ForestParams::default()
    };

    for n_rows in [1_000, 5_000, 20_000] {
        let data = generate_design(n_rows, 20, 42);
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &data, |b, data| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(2020);
                let _ = RandomForest::fit(black_box(&data.x), black_box(&data.y), &params, &mut rng);
            });
        });
    }

    group.finish();
}

/// Permutation importance as used by each Boruta run
fn benchmark_permutation_importance(c: &mut Criterion) {
    let mut group = c.benchmark_group("permutation_importance");
    group.sample_size(10);

    let data = generate_design(5_000, 20, 42);
    let params = ForestParams {
        n_trees: 100,
        ..ForestParams::default()
    };
    let mut rng = StdRng::seed_from_u64(2020);
    let forest = match RandomForest::fit(&data.x, &data.y, &params, &mut rng) {
        Ok(forest) => forest,
        Err(e) => panic!("benchmark forest failed to fit: {}", e),
    };

    group.bench_function("20_questions", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            let _ = forest.permutation_importance(black_box(&data.x), &data.y, &data.groups, 20, &mut rng);
        });
    });

    group.finish();
}

/// Warm-started lambda path vs independent fits
fn benchmark_penalized_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("penalized_path");
    group.sample_size(10);

    let data = generate_design(5_000, 20, 42);
    let lambdas = lambda_path(&data.x, &data.y, 0.5, 20, 0.01);

    group.bench_function("warm_start", |b| {
        b.iter(|| {
            let _ = PenalizedLogistic::fit_path(black_box(&data.x), &data.y, 0.5, &lambdas);
        });
    });

    group.bench_function("independent", |b| {
        b.iter(|| {
            for &lambda in &lambdas {
                let _ = PenalizedLogistic::fit(black_box(&data.x), &data.y, 0.5, lambda);
            }
        });
    });

    group.finish();
}

/// SMOTE oversampling for varying row counts
fn benchmark_smote(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote");
    group.sample_size(10);

    for n_rows in [1_000, 5_000, 10_000] {
        let data = generate_design(n_rows, 20, 42);
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(BenchmarkId::new("k5", n_rows), &data, |b, data| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(2020);
                let _ = Smote::default().oversample(black_box(data), &mut rng);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_forest_by_rows,
    benchmark_permutation_importance,
    benchmark_penalized_path,
    benchmark_smote
);
criterion_main!(benches);
