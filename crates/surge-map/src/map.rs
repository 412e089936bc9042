// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Performance Map
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Head and efficiency as functions of flow and speed.
//!
//! Each reference curve carries a head spline and an efficiency spline
//! over flow. A query picks the bracketing reference speeds, evaluates
//! each curve (linear past its flow range) and combines linearly in speed.

use crate::boundary::{BoundaryKind, SplineBoundaryCurve};
use crate::corrections::reynolds_efficiency_correction;
use crate::curve::{unique_by_flow, BoundarySample, ReferenceCurve};
use crate::molecular::MolecularWeightSupport;
use serde::{Deserialize, Serialize};
use surge_math::interp::{bisect_left, lerp};
use surge_math::spline::CubicSpline;
use surge_types::error::{SurgeError, SurgeResult};
use tracing::debug;

/// Iteration cap for the speed and flow solvers.
const SOLVER_MAX_ITER: usize = 60;
/// Bisection iterations used when the local solver does not converge.
const BISECTION_ITER: usize = 100;
/// Newton damping for the speed solve.
const SPEED_DAMPING: f64 = 0.7;
/// Largest Newton step as a fraction of the current speed.
const SPEED_MAX_STEP_FRACTION: f64 = 0.3;
/// Relative convergence tolerance on head.
const HEAD_REL_TOL: f64 = 1e-9;

/// Head and efficiency lookup shared by every map flavour.
pub trait PerformanceModel {
    /// Polytropic head (kJ/kg) at flow (m³/h) and speed (rpm).
    fn head(&self, flow: f64, speed: f64) -> f64;

    /// Polytropic efficiency (fraction) at flow and speed.
    fn efficiency(&self, flow: f64, speed: f64) -> f64;

    /// Lowest and highest reference speed (rpm).
    fn speed_range(&self) -> (f64, f64);

    /// Molecular-weight interpolation, if this model supports it.
    fn molecular_weight_support(&self) -> Option<&dyn MolecularWeightSupport>;

    fn molecular_weight_support_mut(&mut self) -> Option<&mut dyn MolecularWeightSupport>;

    /// Speed (rpm) at which the model delivers `head` at `flow`.
    /// Bisection over [0.5·min, 1.5·max] reference speed; the nearer
    /// bound when no root lies inside.
    fn speed_for(&self, flow: f64, head: f64) -> f64 {
        let (min, max) = self.speed_range();
        let tol = HEAD_REL_TOL * head.abs().max(1.0);
        bisect_root(|n| self.head(flow, n) - head, 0.5 * min, 1.5 * max, tol)
    }
}

/// Reference speeds used for a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedBracket {
    /// Requested speed matches a reference curve.
    Exact(usize),
    /// Nearest curve below and above.
    Between(usize, usize),
    /// Below the lowest reference speed.
    Below(usize),
    /// Above the highest reference speed.
    Above(usize),
}

/// Treatment of speeds outside the reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedExtrapolation {
    /// Use the single nearest reference curve.
    #[default]
    NearestCurve,
    /// Extend the line through the two outermost curves.
    Linear,
}

#[derive(Debug, Clone)]
struct CurveModel {
    curve: ReferenceCurve,
    head: CubicSpline,
    efficiency: CubicSpline,
}

impl CurveModel {
    fn build(curve: ReferenceCurve) -> SurgeResult<Self> {
        let (head, dropped_h) = CubicSpline::from_unsorted(curve.flow(), curve.head())?;
        let (efficiency, dropped_e) =
            CubicSpline::from_unsorted(curve.efficiency_flow(), curve.efficiency())?;
        if dropped_h + dropped_e > 0 {
            debug!(
                speed = curve.speed(),
                dropped_h, dropped_e, "duplicate flow samples collapsed"
            );
        }
        Ok(CurveModel {
            curve,
            head,
            efficiency,
        })
    }
}

/// Map of reference curves sorted by speed.
#[derive(Debug, Clone)]
pub struct PerformanceMap {
    curves: Vec<CurveModel>,
    speeds: Vec<f64>,
    extrapolation: SpeedExtrapolation,
}

impl PerformanceMap {
    pub fn new(curves: Vec<ReferenceCurve>) -> SurgeResult<Self> {
        if curves.is_empty() {
            return Err(SurgeError::MissingReferenceCurves);
        }
        let mut curves = curves;
        curves.sort_by(|a, b| a.speed().total_cmp(&b.speed()));
        for w in curves.windows(2) {
            if w[0].speed() == w[1].speed() {
                return Err(SurgeError::InvalidInput(format!(
                    "duplicate reference speed {} rpm",
                    w[0].speed()
                )));
            }
        }
        let speeds = curves.iter().map(|c| c.speed()).collect();
        let curves = curves
            .into_iter()
            .map(CurveModel::build)
            .collect::<SurgeResult<Vec<_>>>()?;
        Ok(PerformanceMap {
            curves,
            speeds,
            extrapolation: SpeedExtrapolation::default(),
        })
    }

    pub fn with_speed_extrapolation(mut self, mode: SpeedExtrapolation) -> Self {
        self.extrapolation = mode;
        self
    }

    pub fn speed_extrapolation(&self) -> SpeedExtrapolation {
        self.extrapolation
    }

    pub fn curves(&self) -> Vec<&ReferenceCurve> {
        self.curves.iter().map(|c| &c.curve).collect()
    }

    pub fn reference_speeds(&self) -> &[f64] {
        &self.speeds
    }

    pub fn min_speed(&self) -> f64 {
        self.speeds[0]
    }

    pub fn max_speed(&self) -> f64 {
        self.speeds[self.speeds.len() - 1]
    }

    pub fn reference_speeds_for(&self, speed: f64) -> SpeedBracket {
        let n = self.speeds.len();
        let pos = bisect_left(&self.speeds, speed);
        if pos < n && self.speeds[pos] == speed {
            SpeedBracket::Exact(pos)
        } else if pos == 0 {
            SpeedBracket::Below(0)
        } else if pos == n {
            SpeedBracket::Above(n - 1)
        } else {
            SpeedBracket::Between(pos - 1, pos)
        }
    }

    fn combine(&self, speed: f64, eval: impl Fn(&CurveModel) -> f64) -> f64 {
        let n = self.curves.len();
        let across = |i: usize, j: usize| {
            lerp(
                self.speeds[i],
                eval(&self.curves[i]),
                self.speeds[j],
                eval(&self.curves[j]),
                speed,
            )
        };
        match self.reference_speeds_for(speed) {
            SpeedBracket::Exact(i) => eval(&self.curves[i]),
            SpeedBracket::Between(i, j) => across(i, j),
            SpeedBracket::Below(i) | SpeedBracket::Above(i) => {
                match (self.extrapolation, n >= 2) {
                    (SpeedExtrapolation::Linear, true) if i == 0 => across(0, 1),
                    (SpeedExtrapolation::Linear, true) => across(n - 2, n - 1),
                    _ => eval(&self.curves[i]),
                }
            }
        }
    }

    pub fn head(&self, flow: f64, speed: f64) -> f64 {
        self.combine(speed, |c| c.head.value(flow))
    }

    pub fn efficiency(&self, flow: f64, speed: f64) -> f64 {
        self.combine(speed, |c| c.efficiency.value(flow))
    }

    /// Efficiency corrected from `reference_reynolds` to `reynolds`.
    pub fn efficiency_at_reynolds(
        &self,
        flow: f64,
        speed: f64,
        reynolds: f64,
        reference_reynolds: f64,
    ) -> f64 {
        reynolds_efficiency_correction(self.efficiency(flow, speed), reynolds, reference_reynolds)
    }

    /// Index of the reference curve nearest in speed; ties go to the lower.
    fn nearest_curve(&self, speed: f64) -> usize {
        let mut best = 0;
        for (i, &s) in self.speeds.iter().enumerate() {
            if (s - speed).abs() < (self.speeds[best] - speed).abs() {
                best = i;
            }
        }
        best
    }

    /// Minimum-flow point of the curve nearest in speed.
    pub fn surge_point_at_speed(&self, speed: f64) -> BoundarySample {
        self.curves[self.nearest_curve(speed)].curve.min_flow_point()
    }

    /// Maximum-flow point of the curve nearest in speed.
    pub fn stonewall_point_at_speed(&self, speed: f64) -> BoundarySample {
        self.curves[self.nearest_curve(speed)].curve.max_flow_point()
    }

    /// Surge line through the minimum-flow point of every curve.
    pub fn generate_surge_curve(&self) -> SurgeResult<SplineBoundaryCurve> {
        self.generate_boundary(BoundaryKind::Surge)
    }

    /// Stonewall line through the maximum-flow point of every curve.
    pub fn generate_stonewall_curve(&self) -> SurgeResult<SplineBoundaryCurve> {
        self.generate_boundary(BoundaryKind::Stonewall)
    }

    fn generate_boundary(&self, kind: BoundaryKind) -> SurgeResult<SplineBoundaryCurve> {
        let points: Vec<BoundarySample> = self
            .curves
            .iter()
            .map(|c| match kind {
                BoundaryKind::Surge => c.curve.min_flow_point(),
                BoundaryKind::Stonewall => c.curve.max_flow_point(),
            })
            .collect();
        let points = unique_by_flow(&points)?;
        SplineBoundaryCurve::from_samples(kind, &points)
    }

    /// Speed at which the map delivers `head` at `flow`.
    ///
    /// Damped Newton from a fan-law guess, bounded to
    /// [0.5·min, 1.5·max] reference speed, with bisection as a fallback.
    /// Returns the best bracket end when no root exists in the bounds.
    pub fn speed_for(&self, flow: f64, head: f64) -> f64 {
        let lo = 0.5 * self.min_speed();
        let hi = 1.5 * self.max_speed();
        let residual = |n: f64| self.head(flow, n) - head;
        let tol = HEAD_REL_TOL * head.abs().max(1.0);

        // Fan law: head scales with speed squared.
        let reference = self.speeds[self.speeds.len() / 2];
        let reference_head = self.head(flow, reference);
        let mut speed = if reference_head > 0.0 && head > 0.0 {
            reference * (head / reference_head).sqrt()
        } else {
            reference
        };
        speed = speed.clamp(lo, hi);

        for _ in 0..SOLVER_MAX_ITER {
            let r = residual(speed);
            if r.abs() <= tol {
                return speed;
            }
            let ds = (1e-4 * speed.abs()).max(1e-3);
            let slope = (residual(speed + ds) - r) / ds;
            if slope == 0.0 || !slope.is_finite() {
                break;
            }
            let max_step = SPEED_MAX_STEP_FRACTION * speed.abs().max(1.0);
            let step = (-SPEED_DAMPING * r / slope).clamp(-max_step, max_step);
            let next = (speed + step).clamp(lo, hi);
            if (next - speed).abs() <= 1e-9 * speed.abs().max(1.0) {
                speed = next;
                if residual(speed).abs() <= tol * 1e3 {
                    return speed;
                }
                break;
            }
            speed = next;
        }

        bisect_root(residual, lo, hi, tol)
    }

    /// Flow at which the curve at `speed` delivers `head`.
    ///
    /// Secant iteration from `guess` (non-positive guesses start at the
    /// middle of the nearest curve), kept at non-negative flow, with a
    /// bisection fallback over [0, 2·max reference flow].
    pub fn flow_for(&self, head: f64, speed: f64, guess: f64) -> f64 {
        let nearest = &self.curves[self.nearest_curve(speed)];
        let (qmin, qmax) = nearest.head.domain();
        let residual = |q: f64| self.head(q, speed) - head;
        let tol = HEAD_REL_TOL * head.abs().max(1.0);

        let mut q0 = if guess > 0.0 && guess.is_finite() {
            guess
        } else {
            0.5 * (qmin + qmax)
        };
        let mut q1 = q0 * 1.01 + 1e-6;
        let mut r0 = residual(q0);
        for _ in 0..SOLVER_MAX_ITER {
            let r1 = residual(q1);
            if r1.abs() <= tol {
                return q1;
            }
            let denom = r1 - r0;
            if denom == 0.0 || !denom.is_finite() {
                break;
            }
            let next = (q1 - r1 * (q1 - q0) / denom).max(0.0);
            q0 = q1;
            r0 = r1;
            q1 = next;
        }

        let upper = 2.0
            * self
                .curves
                .iter()
                .map(|c| c.head.domain().1)
                .fold(qmax, f64::max);
        bisect_root(residual, 0.0, upper.max(1.0), tol)
    }
}

/// Bisection on `[lo, hi]`; without a sign change the end with the
/// smaller residual is returned.
fn bisect_root(f: impl Fn(f64) -> f64, lo: f64, hi: f64, tol: f64) -> f64 {
    let (mut a, mut b) = (lo, hi);
    let (mut fa, fb) = (f(a), f(b));
    if fa.signum() == fb.signum() {
        return if fa.abs() <= fb.abs() { a } else { b };
    }
    for _ in 0..BISECTION_ITER {
        let mid = 0.5 * (a + b);
        let fm = f(mid);
        if fm.abs() <= tol {
            return mid;
        }
        if fm.signum() == fa.signum() {
            a = mid;
            fa = fm;
        } else {
            b = mid;
        }
    }
    0.5 * (a + b)
}

impl PerformanceModel for PerformanceMap {
    fn head(&self, flow: f64, speed: f64) -> f64 {
        PerformanceMap::head(self, flow, speed)
    }

    fn efficiency(&self, flow: f64, speed: f64) -> f64 {
        PerformanceMap::efficiency(self, flow, speed)
    }

    fn speed_range(&self) -> (f64, f64) {
        (self.min_speed(), self.max_speed())
    }

    fn speed_for(&self, flow: f64, head: f64) -> f64 {
        PerformanceMap::speed_for(self, flow, head)
    }

    fn molecular_weight_support(&self) -> Option<&dyn MolecularWeightSupport> {
        None
    }

    fn molecular_weight_support_mut(&mut self) -> Option<&mut dyn MolecularWeightSupport> {
        None
    }
}
