// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Property-Based Tests (proptest) for surge-math
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for surge-math using proptest.
//!
//! Covers: Thomas solver, cubic spline interpolation and extrapolation,
//! polynomial least squares, sort/dedup helper.

use proptest::prelude::*;
use surge_math::interp::{lerp, sort_dedup_pairs};
use surge_math::polyfit::fit;
use surge_math::spline::CubicSpline;
use surge_math::tridiag::thomas_solve;

// ── Thomas Solver Properties ─────────────────────────────────────────

/// Spline-like curvature system: positive spacings `h` give
/// `h[i-1], 2(h[i-1] + h[i]), h[i]` rows, which are diagonally dominant.
fn curvature_system() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>)> {
    prop::collection::vec((0.1f64..10.0, -5.0f64..5.0), 2..30).prop_map(|rows| {
        let n = rows.len() - 1;
        let h: Vec<f64> = rows.iter().map(|r| r.0).collect();
        let sub = (0..n).map(|i| if i > 0 { h[i] } else { 0.0 }).collect();
        let diag = (0..n).map(|i| 2.0 * (h[i] + h[i + 1])).collect();
        let sup = (0..n).map(|i| if i + 1 < n { h[i + 1] } else { 0.0 }).collect();
        let rhs = rows.iter().take(n).map(|r| r.1).collect();
        (sub, diag, sup, rhs)
    })
}

proptest! {
    /// Solutions of curvature systems reproduce the right-hand side.
    #[test]
    fn thomas_solves_curvature_rows((sub, diag, sup, rhs) in curvature_system()) {
        let x = thomas_solve(&sub, &diag, &sup, &rhs).unwrap();
        let n = x.len();
        for row in 0..n {
            let left = if row > 0 { sub[row] * x[row - 1] } else { 0.0 };
            let right = if row + 1 < n { sup[row] * x[row + 1] } else { 0.0 };
            let lhs = left + diag[row] * x[row] + right;
            prop_assert!((lhs - rhs[row]).abs() < 1e-9,
                "row {row}: {lhs} vs {}", rhs[row]);
        }
    }
}

// ── Cubic Spline Properties ──────────────────────────────────────────

fn increasing_knots() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (2usize..12).prop_flat_map(|n| {
        (
            prop::collection::vec(0.1f64..10.0, n),
            prop::collection::vec(-100.0f64..100.0, n),
        )
            .prop_map(|(steps, ys)| {
                let mut x = Vec::with_capacity(steps.len());
                let mut acc = 0.0;
                for s in steps {
                    acc += s;
                    x.push(acc);
                }
                (x, ys)
            })
    })
}

proptest! {
    /// The spline passes through every knot.
    #[test]
    fn spline_hits_knots((x, y) in increasing_knots()) {
        let s = CubicSpline::new(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            prop_assert!((s.value(*xi) - yi).abs() < 1e-8 * (1.0 + yi.abs()),
                "spline({}) = {}, expected {}", xi, s.value(*xi), yi);
        }
    }

    /// Outside the domain the value follows the edge chord exactly.
    #[test]
    fn spline_extrapolates_on_edge_chord(
        (x, y) in increasing_knots(),
        overrun in 0.0f64..50.0,
    ) {
        let s = CubicSpline::new(&x, &y).unwrap();
        let n = x.len();
        let right = x[n - 1] + overrun;
        let expected_right = lerp(x[n - 2], y[n - 2], x[n - 1], y[n - 1], right);
        prop_assert!((s.value(right) - expected_right).abs() < 1e-8 * (1.0 + expected_right.abs()));
        let left = x[0] - overrun;
        let expected_left = lerp(x[0], y[0], x[1], y[1], left);
        prop_assert!((s.value(left) - expected_left).abs() < 1e-8 * (1.0 + expected_left.abs()));
    }

    /// Finite queries never yield NaN.
    #[test]
    fn spline_value_is_finite(
        (x, y) in increasing_knots(),
        q in -1e4f64..1e4,
    ) {
        let s = CubicSpline::new(&x, &y).unwrap();
        prop_assert!(s.value(q).is_finite());
    }
}

// ── Polynomial Fit Properties ────────────────────────────────────────

proptest! {
    /// A quadratic sampled at ≥ 3 distinct points is recovered.
    #[test]
    fn fit_recovers_quadratic(
        c0 in -100.0f64..100.0,
        c1 in -5.0f64..5.0,
        c2 in -0.5f64..0.5,
        start in -50.0f64..50.0,
        n in 3usize..15,
    ) {
        let x: Vec<f64> = (0..n).map(|i| start + i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| c0 + c1 * v + c2 * v * v).collect();
        let p = fit(&x, &y, 2).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            prop_assert!((p.value(*xi) - yi).abs() < 1e-6 * (1.0 + yi.abs()),
                "p({}) = {}, expected {}", xi, p.value(*xi), yi);
        }
    }
}

// ── Sort / Dedup ─────────────────────────────────────────────────────

proptest! {
    /// Output abscissae are strictly increasing and nothing is lost
    /// except duplicates.
    #[test]
    fn sort_dedup_strictly_increasing(
        pairs in prop::collection::vec((0i32..20, -10.0f64..10.0), 1..40),
    ) {
        let xs: Vec<f64> = pairs.iter().map(|(k, _)| *k as f64).collect();
        let ys: Vec<f64> = pairs.iter().map(|(_, v)| *v).collect();
        let (sx, sy, dropped) = sort_dedup_pairs(&xs, &ys).unwrap();
        prop_assert_eq!(sx.len(), sy.len());
        prop_assert_eq!(sx.len() + dropped, xs.len());
        for w in sx.windows(2) {
            prop_assert!(w[1] > w[0]);
        }
        // Last writer wins for every kept abscissa
        for (kx, ky) in sx.iter().zip(sy.iter()) {
            let last = xs.iter().zip(ys.iter()).filter(|(x, _)| *x == kx).last().map(|(_, y)| *y);
            prop_assert_eq!(last, Some(*ky));
        }
    }
}
