// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Boundary Curves
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surge and stonewall lines.
//!
//! Two fits are offered:
//! - [`PolynomialBoundaryCurve`]: quadratic head → flow, forward only.
//! - [`SplineBoundaryCurve`]: natural splines in both directions with
//!   linear extrapolation past the sampled range. Queries never fail and
//!   flow results are clamped to be non-negative.

use crate::curve::BoundarySample;
use serde::{Deserialize, Serialize};
use surge_math::interp::sort_dedup_pairs;
use surge_math::polyfit::{fit, Polynomial};
use surge_math::spline::CubicSpline;
use surge_types::error::{SurgeError, SurgeResult};
use tracing::warn;

/// Smallest flow used as a divisor in margin arithmetic.
const MARGIN_FLOW_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Surge,
    Stonewall,
}

impl BoundaryKind {
    /// Surge is violated below the line, stonewall above it.
    pub fn is_beyond(self, flow: f64, boundary_flow: f64) -> bool {
        match self {
            BoundaryKind::Surge => flow < boundary_flow,
            BoundaryKind::Stonewall => flow > boundary_flow,
        }
    }

    /// Normalized distance to the line; negative once beyond it.
    ///
    /// Surge: `flow / boundary − 1`. Stonewall: `boundary / flow − 1`.
    pub fn margin(self, flow: f64, boundary_flow: f64) -> f64 {
        match self {
            BoundaryKind::Surge => flow / boundary_flow.max(MARGIN_FLOW_FLOOR) - 1.0,
            BoundaryKind::Stonewall => boundary_flow / flow.max(MARGIN_FLOW_FLOOR) - 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryKind::Surge => "surge",
            BoundaryKind::Stonewall => "stonewall",
        }
    }
}

/// Head-indexed boundary flow.
pub trait BoundaryLine {
    fn kind(&self) -> BoundaryKind;

    /// Boundary flow at the given head. Finite for every finite head.
    fn flow_at_head(&self, head: f64) -> f64;

    fn is_beyond(&self, flow: f64, head: f64) -> bool {
        self.kind().is_beyond(flow, self.flow_at_head(head))
    }

    fn margin(&self, flow: f64, head: f64) -> f64 {
        self.kind().margin(flow, self.flow_at_head(head))
    }
}

fn check_samples(flow: &[f64], head: &[f64]) -> SurgeResult<()> {
    if flow.len() != head.len() {
        return Err(SurgeError::InvalidInput(format!(
            "boundary flow ({}) and head ({}) lengths differ",
            flow.len(),
            head.len()
        )));
    }
    if flow.len() < 2 {
        return Err(SurgeError::InvalidInput(format!(
            "boundary curve needs at least 2 points, got {}",
            flow.len()
        )));
    }
    if let Some(bad) = flow.iter().chain(head.iter()).find(|v| !v.is_finite()) {
        return Err(SurgeError::InvalidInput(format!(
            "boundary sample {bad} is not finite"
        )));
    }
    Ok(())
}

// ── Polynomial ───────────────────────────────────────────────────────

/// Second-order least-squares fit of flow as a function of head.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialBoundaryCurve {
    kind: BoundaryKind,
    poly: Polynomial,
    samples: Vec<BoundarySample>,
}

impl PolynomialBoundaryCurve {
    pub fn fit(kind: BoundaryKind, flow: &[f64], head: &[f64]) -> SurgeResult<Self> {
        check_samples(flow, head)?;
        let poly = fit(head, flow, 2)?;
        let samples = flow
            .iter()
            .zip(head.iter())
            .map(|(&flow, &head)| BoundarySample { flow, head })
            .collect();
        Ok(PolynomialBoundaryCurve {
            kind,
            poly,
            samples,
        })
    }

    pub fn polynomial(&self) -> &Polynomial {
        &self.poly
    }

    pub fn samples(&self) -> Vec<BoundarySample> {
        self.samples.clone()
    }
}

impl BoundaryLine for PolynomialBoundaryCurve {
    fn kind(&self) -> BoundaryKind {
        self.kind
    }

    fn flow_at_head(&self, head: f64) -> f64 {
        self.poly.value(head)
    }
}

// ── Safe spline ──────────────────────────────────────────────────────

/// Bidirectional spline boundary.
///
/// Holds the samples sorted by flow and two splines: head → flow over
/// samples deduplicated on head, and flow → head over samples
/// deduplicated on flow. In both cases the last sample written for a
/// duplicated key wins.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineBoundaryCurve {
    kind: BoundaryKind,
    by_flow: Vec<BoundarySample>,
    head_to_flow: CubicSpline,
    flow_to_head: CubicSpline,
}

impl SplineBoundaryCurve {
    pub fn fit(kind: BoundaryKind, flow: &[f64], head: &[f64]) -> SurgeResult<Self> {
        check_samples(flow, head)?;

        let (heads, flows_by_head, dropped_heads) = sort_dedup_pairs(head, flow)?;
        if heads.len() < 2 {
            return Err(SurgeError::InvalidInput(format!(
                "{} curve needs at least 2 distinct head values, got {}",
                kind.as_str(),
                heads.len()
            )));
        }
        let (flows, heads_by_flow, dropped_flows) = sort_dedup_pairs(flow, head)?;
        if flows.len() < 2 {
            return Err(SurgeError::InvalidInput(format!(
                "{} curve needs at least 2 distinct flow values, got {}",
                kind.as_str(),
                flows.len()
            )));
        }
        if dropped_heads > 0 || dropped_flows > 0 {
            warn!(
                kind = kind.as_str(),
                dropped_heads,
                dropped_flows,
                "boundary samples with duplicate keys collapsed"
            );
        }

        let head_to_flow = CubicSpline::new(&heads, &flows_by_head)?;
        let flow_to_head = CubicSpline::new(&flows, &heads_by_flow)?;
        let by_flow = flows
            .iter()
            .zip(heads_by_flow.iter())
            .map(|(&flow, &head)| BoundarySample { flow, head })
            .collect();

        Ok(SplineBoundaryCurve {
            kind,
            by_flow,
            head_to_flow,
            flow_to_head,
        })
    }

    pub fn surge(flow: &[f64], head: &[f64]) -> SurgeResult<Self> {
        Self::fit(BoundaryKind::Surge, flow, head)
    }

    pub fn stonewall(flow: &[f64], head: &[f64]) -> SurgeResult<Self> {
        Self::fit(BoundaryKind::Stonewall, flow, head)
    }

    pub fn from_samples(kind: BoundaryKind, samples: &[BoundarySample]) -> SurgeResult<Self> {
        let flow: Vec<f64> = samples.iter().map(|s| s.flow).collect();
        let head: Vec<f64> = samples.iter().map(|s| s.head).collect();
        Self::fit(kind, &flow, &head)
    }

    /// Boundary head at the given flow. Not clamped.
    pub fn head_at_flow(&self, flow: f64) -> f64 {
        self.flow_to_head.value(flow)
    }

    /// Samples sorted by flow.
    pub fn samples(&self) -> Vec<BoundarySample> {
        self.by_flow.clone()
    }

    pub fn head_range(&self) -> (f64, f64) {
        self.head_to_flow.domain()
    }

    pub fn flow_range(&self) -> (f64, f64) {
        self.flow_to_head.domain()
    }

    pub fn is_head_within(&self, head: f64) -> bool {
        self.head_to_flow.is_within(head)
    }
}

impl BoundaryLine for SplineBoundaryCurve {
    fn kind(&self) -> BoundaryKind {
        self.kind
    }

    fn flow_at_head(&self, head: f64) -> f64 {
        self.head_to_flow.value(head).max(0.0)
    }
}
