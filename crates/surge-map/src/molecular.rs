// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Molecular-Weight Maps
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Performance maps measured at several gas molecular weights.
//!
//! The operating molecular weight selects the two bracketing maps and
//! every query is interpolated linearly between them. Outside the
//! measured range the nearest map is used unless extrapolation is
//! enabled, in which case the two outermost maps are extended linearly.

use crate::boundary::{BoundaryLine, SplineBoundaryCurve};
use crate::map::{PerformanceMap, PerformanceModel};
use surge_types::error::{SurgeError, SurgeResult};

/// Optional capability of a performance model: interpolation over gas
/// molecular weight.
pub trait MolecularWeightSupport {
    /// Set the operating molecular weight (kg/kmol).
    fn set_operating_mw(&mut self, mw: f64) -> SurgeResult<()>;

    fn operating_mw(&self) -> f64;

    /// Molecular weights of the stored maps, ascending.
    fn map_molecular_weights(&self) -> Vec<f64>;
}

/// One map measured at a single molecular weight.
#[derive(Debug, Clone)]
pub struct MolecularWeightMap {
    mw: f64,
    map: PerformanceMap,
    surge: Option<SplineBoundaryCurve>,
    stonewall: Option<SplineBoundaryCurve>,
}

impl MolecularWeightMap {
    pub fn new(mw: f64, map: PerformanceMap) -> SurgeResult<Self> {
        if !mw.is_finite() || mw <= 0.0 {
            return Err(SurgeError::InvalidInput(format!(
                "molecular weight must be finite and > 0, got {mw}"
            )));
        }
        Ok(MolecularWeightMap {
            mw,
            map,
            surge: None,
            stonewall: None,
        })
    }

    /// Attach surge and stonewall lines generated from the map itself.
    pub fn with_generated_boundaries(mut self) -> SurgeResult<Self> {
        self.surge = Some(self.map.generate_surge_curve()?);
        self.stonewall = Some(self.map.generate_stonewall_curve()?);
        Ok(self)
    }

    pub fn with_surge_curve(mut self, curve: SplineBoundaryCurve) -> Self {
        self.surge = Some(curve);
        self
    }

    pub fn with_stonewall_curve(mut self, curve: SplineBoundaryCurve) -> Self {
        self.stonewall = Some(curve);
        self
    }

    pub fn molecular_weight(&self) -> f64 {
        self.mw
    }

    pub fn map(&self) -> &PerformanceMap {
        &self.map
    }
}

/// Bracketing maps and weight of the upper one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Weights {
    lower: usize,
    upper: usize,
    fraction: f64,
}

#[derive(Debug, Clone)]
pub struct MolecularWeightMaps {
    entries: Vec<MolecularWeightMap>,
    operating_mw: f64,
    allow_extrapolation: bool,
}

impl MolecularWeightMaps {
    /// Operating molecular weight starts at the lightest map.
    pub fn new(entries: Vec<MolecularWeightMap>) -> SurgeResult<Self> {
        if entries.is_empty() {
            return Err(SurgeError::MissingReferenceCurves);
        }
        let mut maps = MolecularWeightMaps {
            entries: Vec::with_capacity(entries.len()),
            operating_mw: 0.0,
            allow_extrapolation: false,
        };
        for entry in entries {
            maps.add(entry)?;
        }
        maps.operating_mw = maps.entries[0].mw;
        Ok(maps)
    }

    /// Insert keeping the maps sorted by molecular weight.
    pub fn add(&mut self, entry: MolecularWeightMap) -> SurgeResult<()> {
        if self.entries.iter().any(|e| e.mw == entry.mw) {
            return Err(SurgeError::InvalidInput(format!(
                "a map at molecular weight {} already exists",
                entry.mw
            )));
        }
        let pos = self.entries.partition_point(|e| e.mw < entry.mw);
        self.entries.insert(pos, entry);
        Ok(())
    }

    pub fn set_allow_extrapolation(&mut self, allow: bool) {
        self.allow_extrapolation = allow;
    }

    pub fn allow_extrapolation(&self) -> bool {
        self.allow_extrapolation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn weights(&self) -> Weights {
        let n = self.entries.len();
        let mw = self.operating_mw;
        let single = |i: usize| Weights {
            lower: i,
            upper: i,
            fraction: 0.0,
        };
        if n == 1 {
            return single(0);
        }
        let span = |i: usize, j: usize| Weights {
            lower: i,
            upper: j,
            fraction: (mw - self.entries[i].mw) / (self.entries[j].mw - self.entries[i].mw),
        };
        if mw < self.entries[0].mw {
            return if self.allow_extrapolation {
                span(0, 1)
            } else {
                single(0)
            };
        }
        if mw > self.entries[n - 1].mw {
            return if self.allow_extrapolation {
                span(n - 2, n - 1)
            } else {
                single(n - 1)
            };
        }
        let pos = self.entries.partition_point(|e| e.mw < mw);
        if self.entries[pos].mw == mw {
            single(pos)
        } else {
            span(pos - 1, pos)
        }
    }

    fn blend(&self, eval: impl Fn(&MolecularWeightMap) -> f64) -> f64 {
        let w = self.weights();
        let lo = eval(&self.entries[w.lower]);
        if w.lower == w.upper {
            return lo;
        }
        let hi = eval(&self.entries[w.upper]);
        lo + (hi - lo) * w.fraction
    }

    fn blend_boundary(
        &self,
        pick: impl Fn(&MolecularWeightMap) -> Option<&SplineBoundaryCurve>,
        head: f64,
    ) -> Option<f64> {
        let w = self.weights();
        let lo = pick(&self.entries[w.lower])?.flow_at_head(head);
        if w.lower == w.upper {
            return Some(lo);
        }
        let hi = pick(&self.entries[w.upper])?.flow_at_head(head);
        Some(lo + (hi - lo) * w.fraction)
    }

    /// Interpolated surge flow at `head`; `None` when a bracketing map
    /// has no surge line.
    pub fn surge_flow(&self, head: f64) -> Option<f64> {
        self.blend_boundary(|e| e.surge.as_ref(), head)
    }

    pub fn stonewall_flow(&self, head: f64) -> Option<f64> {
        self.blend_boundary(|e| e.stonewall.as_ref(), head)
    }

    /// `flow / surge_flow − 1`.
    pub fn distance_to_surge(&self, flow: f64, head: f64) -> Option<f64> {
        let surge = self.surge_flow(head)?;
        (surge > 0.0).then(|| flow / surge - 1.0)
    }

    /// `stonewall_flow / flow − 1`.
    pub fn distance_to_stonewall(&self, flow: f64, head: f64) -> Option<f64> {
        let stone = self.stonewall_flow(head)?;
        (flow > 0.0).then(|| stone / flow - 1.0)
    }

    pub fn surge_flow_at_speed(&self, speed: f64) -> f64 {
        self.blend(|e| e.map.surge_point_at_speed(speed).flow)
    }

    pub fn stonewall_flow_at_speed(&self, speed: f64) -> f64 {
        self.blend(|e| e.map.stonewall_point_at_speed(speed).flow)
    }
}

impl PerformanceModel for MolecularWeightMaps {
    fn head(&self, flow: f64, speed: f64) -> f64 {
        self.blend(|e| e.map.head(flow, speed))
    }

    fn efficiency(&self, flow: f64, speed: f64) -> f64 {
        self.blend(|e| e.map.efficiency(flow, speed))
    }

    fn speed_range(&self) -> (f64, f64) {
        self.entries.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
            (lo.min(e.map.min_speed()), hi.max(e.map.max_speed()))
        })
    }

    fn molecular_weight_support(&self) -> Option<&dyn MolecularWeightSupport> {
        Some(self)
    }

    fn molecular_weight_support_mut(&mut self) -> Option<&mut dyn MolecularWeightSupport> {
        Some(self)
    }
}

impl MolecularWeightSupport for MolecularWeightMaps {
    fn set_operating_mw(&mut self, mw: f64) -> SurgeResult<()> {
        if !mw.is_finite() || mw <= 0.0 {
            return Err(SurgeError::InvalidInput(format!(
                "operating molecular weight must be finite and > 0, got {mw}"
            )));
        }
        self.operating_mw = mw;
        Ok(())
    }

    fn operating_mw(&self) -> f64 {
        self.operating_mw
    }

    fn map_molecular_weights(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.mw).collect()
    }
}
