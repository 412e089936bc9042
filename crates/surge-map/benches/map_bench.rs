use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use surge_map::boundary::{BoundaryLine, SplineBoundaryCurve};
use surge_map::curve::ReferenceCurve;
use surge_map::map::PerformanceMap;

fn build_map() -> PerformanceMap {
    let base_flow = [5000.0, 5800.0, 6600.0, 7400.0, 8200.0, 9000.0];
    let base_head = [120.0, 118.0, 114.0, 107.0, 97.0, 84.0];
    let eff = [0.72, 0.76, 0.79, 0.79, 0.76, 0.70];
    let curves = (0..8)
        .map(|i| {
            let n = 7000.0 + 700.0 * i as f64;
            let r = n / 10000.0;
            let flow: Vec<f64> = base_flow.iter().map(|q| q * r).collect();
            let head: Vec<f64> = base_head.iter().map(|h| h * r * r).collect();
            match ReferenceCurve::new(n, &flow, &head, &eff) {
                Ok(c) => c,
                Err(e) => panic!("bench curve invalid: {e}"),
            }
        })
        .collect();
    match PerformanceMap::new(curves) {
        Ok(m) => m,
        Err(e) => panic!("bench map invalid: {e}"),
    }
}

fn bench_head_lookup(c: &mut Criterion) {
    let map = build_map();
    let mut rng = StdRng::seed_from_u64(7);
    let queries: Vec<(f64, f64)> = (0..1024)
        .map(|_| (rng.gen_range(3000.0..12000.0), rng.gen_range(6000.0..13000.0)))
        .collect();

    c.bench_function("map_head_1024", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &(q, n) in &queries {
                acc += map.head(q, n);
            }
            black_box(acc)
        })
    });
}

fn bench_speed_solve(c: &mut Criterion) {
    let map = build_map();
    let head = map.head(6500.0, 9650.0);
    c.bench_function("map_speed_for", |b| {
        b.iter(|| map.speed_for(black_box(6500.0), black_box(head)))
    });
}

fn bench_surge_line(c: &mut Criterion) {
    let map = build_map();
    let surge: SplineBoundaryCurve = match map.generate_surge_curve() {
        Ok(s) => s,
        Err(e) => panic!("surge line fit failed: {e}"),
    };
    let mut rng = StdRng::seed_from_u64(11);
    let heads: Vec<f64> = (0..1024).map(|_| rng.gen_range(40.0..200.0)).collect();

    let mut group = c.benchmark_group("surge_line");
    group.bench_function("fit", |b| b.iter(|| map.generate_surge_curve()));
    group.bench_function("flow_at_head_1024", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &h in &heads {
                acc += surge.flow_at_head(h);
            }
            black_box(acc)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_head_lookup, bench_speed_solve, bench_surge_line);
criterion_main!(benches);
