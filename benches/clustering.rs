use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use huddle::{Clusterer, Dbscan, Kmeans, Optics};
use rand::prelude::*;

fn synthetic(n: usize, d: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..d).map(|_| rng.random::<f64>() * 10.0).collect())
        .collect()
}

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");
    let data = synthetic(1000, 16, 42);

    group.bench_function("learn_n1000_d16_k10", |b| {
        b.iter(|| {
            let engine = Kmeans::new(10, 10).unwrap().with_seed(42);
            engine.learn(black_box(data.clone())).unwrap();
        })
    });

    group.finish();
}

fn bench_dbscan(c: &mut Criterion) {
    let mut group = c.benchmark_group("dbscan");
    let data = synthetic(1000, 4, 7);

    group.bench_function("learn_n1000_d4", |b| {
        b.iter(|| {
            let engine = Dbscan::new(5, 1.0, 0).unwrap();
            engine.learn(black_box(data.clone())).unwrap();
        })
    });

    group.finish();
}

fn bench_optics(c: &mut Criterion) {
    let mut group = c.benchmark_group("optics");
    let data = synthetic(500, 4, 7);

    group.bench_function("learn_n500_d4", |b| {
        b.iter(|| {
            let engine = Optics::new(5, 2.0, 0.05, 0).unwrap();
            engine.learn(black_box(data.clone())).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_kmeans, bench_dbscan, bench_optics);
criterion_main!(benches);
