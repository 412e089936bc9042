// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Cubic Spline
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Natural cubic spline with linear edge extrapolation.
//!
//! Inside `[x_0, x_{n-1}]` the piecewise cubic with zero end curvature is
//! evaluated. Outside, the value continues along the chord of the two
//! nearest knots, so a finite query always yields a finite result.

use crate::interp::{lerp, require_strictly_increasing, segment_index, sort_dedup_pairs};
use crate::tridiag::thomas_solve;
use surge_types::error::{SurgeError, SurgeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit through strictly increasing `x`. Two knots give the chord.
    pub fn new(x: &[f64], y: &[f64]) -> SurgeResult<Self> {
        if x.len() != y.len() {
            return Err(SurgeError::InvalidInput(format!(
                "spline abscissae ({}) and ordinates ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(SurgeError::InvalidInput(format!(
                "spline needs at least 2 knots, got {}",
                x.len()
            )));
        }
        require_strictly_increasing(x, "spline abscissae")?;
        if let Some(bad) = y.iter().find(|v| !v.is_finite()) {
            return Err(SurgeError::InvalidInput(format!(
                "spline ordinate {bad} is not finite"
            )));
        }

        let n = x.len();
        let mut m = vec![0.0; n];
        if n > 2 {
            let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
            let k = n - 2;
            let mut sub = vec![0.0; k];
            let mut diag = vec![0.0; k];
            let mut sup = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for row in 0..k {
                let i = row + 1;
                sub[row] = h[i - 1];
                diag[row] = 2.0 * (h[i - 1] + h[i]);
                sup[row] = h[i];
                rhs[row] =
                    6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
            }
            let interior = thomas_solve(&sub, &diag, &sup, &rhs)?;
            m[1..n - 1].copy_from_slice(&interior);
        }

        Ok(CubicSpline {
            x: x.to_vec(),
            y: y.to_vec(),
            m,
        })
    }

    /// Sort by `x`, collapse duplicate abscissae (last sample wins) and fit.
    /// Also returns how many samples were dropped.
    pub fn from_unsorted(x: &[f64], y: &[f64]) -> SurgeResult<(Self, usize)> {
        let (sx, sy, dropped) = sort_dedup_pairs(x, y)?;
        let spline = CubicSpline::new(&sx, &sy)?;
        Ok((spline, dropped))
    }

    pub fn value(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] {
            return lerp(self.x[0], self.y[0], self.x[1], self.y[1], x);
        }
        if x > self.x[n - 1] {
            return lerp(
                self.x[n - 2],
                self.y[n - 2],
                self.x[n - 1],
                self.y[n - 1],
                x,
            );
        }
        let i = segment_index(&self.x, x);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        self.m[i] * a * a * a / (6.0 * h)
            + self.m[i + 1] * b * b * b / (6.0 * h)
            + (self.y[i] / h - self.m[i] * h / 6.0) * a
            + (self.y[i + 1] / h - self.m[i + 1] * h / 6.0) * b
    }

    /// First derivative; the edge chord slope outside the domain.
    pub fn derivative(&self, x: f64) -> f64 {
        let n = self.x.len();
        if x < self.x[0] {
            return (self.y[1] - self.y[0]) / (self.x[1] - self.x[0]);
        }
        if x > self.x[n - 1] {
            return (self.y[n - 1] - self.y[n - 2]) / (self.x[n - 1] - self.x[n - 2]);
        }
        let i = segment_index(&self.x, x);
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let h = x1 - x0;
        let a = x1 - x;
        let b = x - x0;
        -self.m[i] * a * a / (2.0 * h) + self.m[i + 1] * b * b / (2.0 * h)
            + (self.y[i + 1] - self.y[i]) / h
            - (self.m[i + 1] - self.m[i]) * h / 6.0
    }

    /// Fitted interval `(x_min, x_max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn is_within(&self, x: f64) -> bool {
        let (lo, hi) = self.domain();
        x >= lo && x <= hi
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    pub fn values(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}
