use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use surge_math::polyfit::fit;
use surge_math::spline::CubicSpline;

fn curve(n: usize) -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..n).map(|i| 3000.0 + 500.0 * i as f64).collect();
    let y: Vec<f64> = x.iter().map(|q| 150.0 - 1.2e-6 * q * q).collect();
    (x, y)
}

fn bench_spline_build(c: &mut Criterion) {
    let (x, y) = curve(64);
    c.bench_function("spline_build_64", |b| {
        b.iter(|| CubicSpline::new(black_box(&x), black_box(&y)))
    });
}

fn bench_spline_eval(c: &mut Criterion) {
    let (x, y) = curve(64);
    let spline = match CubicSpline::new(&x, &y) {
        Ok(s) => s,
        Err(e) => panic!("bench spline fit failed: {e}"),
    };
    let mut rng = StdRng::seed_from_u64(42);
    let queries: Vec<f64> = (0..1024).map(|_| rng.gen_range(2000.0..40000.0)).collect();

    c.bench_function("spline_eval_1024", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &q in &queries {
                acc += spline.value(q);
            }
            black_box(acc)
        })
    });
}

fn bench_quadratic_fit(c: &mut Criterion) {
    let (x, y) = curve(32);
    c.bench_function("polyfit_quadratic_32", |b| {
        b.iter(|| fit(black_box(&y), black_box(&x), 2))
    });
}

criterion_group!(
    benches,
    bench_spline_build,
    bench_spline_eval,
    bench_quadratic_fit
);
criterion_main!(benches);
