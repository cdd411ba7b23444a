//! Benchmarks for marker nesting.
//!
//! Measures NFP computation, the single strategies and the full orchestrated
//! run at a few marker sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marker_core::Point;
use marker_nest::piece::{circle, l_shape, rectangle, Piece};
use marker_nest::{compute_nfp, Config, MarkerNester, StrategyKind};

fn marker(n: usize) -> Vec<Vec<Point>> {
    (0..n)
        .map(|i| match i % 4 {
            0 => rectangle(20.0 + (i as f64 * 3.0) % 30.0, 15.0 + (i as f64 * 7.0) % 25.0),
            1 => l_shape(40.0, 30.0, 18.0, 12.0),
            2 => circle(8.0 + (i % 3) as f64, 24),
            _ => vec![(0.0, 0.0), (30.0, 0.0), (24.0, 40.0), (6.0, 40.0)],
        })
        .collect()
}

fn bench_nfp(c: &mut Criterion) {
    let quarters = [0.0, 90.0, 180.0, 270.0];
    let fixed = Piece::new(0, l_shape(40.0, 30.0, 18.0, 12.0), &quarters).unwrap();
    let orbiting = Piece::new(1, circle(10.0, 32), &quarters).unwrap();

    c.bench_function("nfp_lshape_circle", |b| {
        b.iter(|| {
            compute_nfp(
                black_box(&fixed.variants()[1]),
                black_box(&orbiting.variants()[0]),
                0.5,
            )
        })
    });
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy");
    group.sample_size(10);

    let pieces = marker(20);
    let nester = MarkerNester::new(Config::new().with_gap(0.5));
    for kind in StrategyKind::ALL {
        group.bench_with_input(
            BenchmarkId::new(format!("{:?}", kind), pieces.len()),
            &pieces,
            |b, pieces| b.iter(|| nester.solve_with(kind, black_box(pieces), 150.0, false)),
        );
    }
    group.finish();
}

fn bench_orchestrator(c: &mut Criterion) {
    let mut group = c.benchmark_group("marker_nester");
    group.sample_size(10);

    for &n in &[10, 20, 40] {
        let pieces = marker(n);
        let nester = MarkerNester::new(Config::new().with_gap(0.5));
        group.bench_with_input(BenchmarkId::new("fast", n), &pieces, |b, pieces| {
            b.iter(|| nester.nest(black_box(pieces), 150.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_nfp, bench_strategies, bench_orchestrator);
criterion_main!(benches);
