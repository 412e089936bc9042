// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Reference Curves
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-speed reference curves and the chart data they are built from.
//!
//! Flow is actual volumetric flow in m³/h, head is polytropic head in
//! kJ/kg (converted from metres on load), efficiency is a fraction.

use serde::{Deserialize, Serialize};
use surge_math::interp::sort_dedup_pairs;
use surge_types::constants::G_STANDARD;
use surge_types::error::{SurgeError, SurgeResult};

/// A point on a surge or stonewall line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundarySample {
    pub flow: f64,
    pub head: f64,
}

/// Head measured at one rotational speed across the flow range.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCurve {
    speed: f64,
    flow: Vec<f64>,
    head: Vec<f64>,
    efficiency: Vec<f64>,
    efficiency_flow: Option<Vec<f64>>,
}

impl ReferenceCurve {
    pub fn new(speed: f64, flow: &[f64], head: &[f64], efficiency: &[f64]) -> SurgeResult<Self> {
        if !speed.is_finite() {
            return Err(SurgeError::InvalidInput(format!(
                "curve speed must be finite, got {speed}"
            )));
        }
        if flow.len() != head.len() || flow.len() != efficiency.len() {
            return Err(SurgeError::InvalidInput(format!(
                "curve at {speed} rpm: flow ({}), head ({}) and efficiency ({}) lengths differ",
                flow.len(),
                head.len(),
                efficiency.len()
            )));
        }
        if flow.len() < 2 {
            return Err(SurgeError::InvalidInput(format!(
                "curve at {speed} rpm needs at least 2 points, got {}",
                flow.len()
            )));
        }
        require_finite(flow, "flow", speed)?;
        require_finite(head, "head", speed)?;
        require_finite(efficiency, "efficiency", speed)?;

        Ok(ReferenceCurve {
            speed,
            flow: flow.to_vec(),
            head: head.to_vec(),
            efficiency: efficiency.to_vec(),
            efficiency_flow: None,
        })
    }

    /// Attach a separate flow sampling for the efficiency column.
    pub fn with_efficiency_flow(mut self, efficiency_flow: &[f64]) -> SurgeResult<Self> {
        if efficiency_flow.len() != self.efficiency.len() {
            return Err(SurgeError::InvalidInput(format!(
                "curve at {} rpm: efficiency flow ({}) and efficiency ({}) lengths differ",
                self.speed,
                efficiency_flow.len(),
                self.efficiency.len()
            )));
        }
        require_finite(efficiency_flow, "efficiency flow", self.speed)?;
        self.efficiency_flow = Some(efficiency_flow.to_vec());
        Ok(self)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn flow(&self) -> &[f64] {
        &self.flow
    }

    pub fn head(&self) -> &[f64] {
        &self.head
    }

    pub fn efficiency(&self) -> &[f64] {
        &self.efficiency
    }

    /// Flow abscissae of the efficiency column: the separate sampling when
    /// present, the head flows otherwise.
    pub fn efficiency_flow(&self) -> &[f64] {
        self.efficiency_flow.as_deref().unwrap_or(&self.flow)
    }

    pub fn has_separate_efficiency_flow(&self) -> bool {
        self.efficiency_flow.is_some()
    }

    /// Lowest-flow sample, the surge end of the curve.
    pub fn min_flow_point(&self) -> BoundarySample {
        let i = extreme_index(&self.flow, |a, b| a < b);
        BoundarySample {
            flow: self.flow[i],
            head: self.head[i],
        }
    }

    /// Highest-flow sample, the stonewall end of the curve.
    pub fn max_flow_point(&self) -> BoundarySample {
        let i = extreme_index(&self.flow, |a, b| a > b);
        BoundarySample {
            flow: self.flow[i],
            head: self.head[i],
        }
    }

    /// Copy of this curve with every column mapped through the given
    /// transforms.
    pub fn map_units(
        &self,
        speed: impl Fn(f64) -> f64,
        flow: impl Fn(f64) -> f64,
        head: impl Fn(f64) -> f64,
    ) -> SurgeResult<Self> {
        let f: Vec<f64> = self.flow.iter().map(|&q| flow(q)).collect();
        let h: Vec<f64> = self.head.iter().map(|&v| head(v)).collect();
        let curve = ReferenceCurve::new(speed(self.speed), &f, &h, &self.efficiency)?;
        match &self.efficiency_flow {
            Some(ef) => {
                let mapped: Vec<f64> = ef.iter().map(|&q| flow(q)).collect();
                curve.with_efficiency_flow(&mapped)
            }
            None => Ok(curve),
        }
    }
}

fn require_finite(values: &[f64], what: &str, speed: f64) -> SurgeResult<()> {
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(SurgeError::InvalidInput(format!(
            "curve at {speed} rpm: {what}[{i}] = {v} is not finite"
        )));
    }
    Ok(())
}

/// First index winning the comparison; ties keep the earliest sample.
fn extreme_index(values: &[f64], better: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(v, values[best]) {
            best = i;
        }
    }
    best
}

/// Unit of the head column in chart data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HeadUnit {
    #[serde(rename = "meter")]
    Meter,
    #[default]
    #[serde(rename = "kJ/kg")]
    KjPerKg,
}

impl HeadUnit {
    pub fn to_kj_per_kg(self, head: f64) -> f64 {
        match self {
            HeadUnit::Meter => head * G_STANDARD / 1000.0,
            HeadUnit::KjPerKg => head,
        }
    }
}

/// Parallel arrays as produced by a chart loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub speeds: Vec<f64>,
    pub flow: Vec<Vec<f64>>,
    pub head: Vec<Vec<f64>>,
    pub efficiency: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_flow: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub head_unit: HeadUnit,
    /// kW
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_design_power: Option<f64>,
}

impl ChartData {
    pub fn from_file(path: &str) -> SurgeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Validate row counts and build one curve per speed, head in kJ/kg.
    pub fn curves(&self) -> SurgeResult<Vec<ReferenceCurve>> {
        let n = self.speeds.len();
        if self.flow.len() != n || self.head.len() != n || self.efficiency.len() != n {
            return Err(SurgeError::InvalidInput(format!(
                "chart has {n} speeds but {} flow, {} head and {} efficiency rows",
                self.flow.len(),
                self.head.len(),
                self.efficiency.len()
            )));
        }
        if let Some(ef) = &self.efficiency_flow {
            if ef.len() != n {
                return Err(SurgeError::InvalidInput(format!(
                    "chart has {n} speeds but {} efficiency flow rows",
                    ef.len()
                )));
            }
        }

        let mut curves = Vec::with_capacity(n);
        for i in 0..n {
            let head: Vec<f64> = self.head[i]
                .iter()
                .map(|&h| self.head_unit.to_kj_per_kg(h))
                .collect();
            let curve =
                ReferenceCurve::new(self.speeds[i], &self.flow[i], &head, &self.efficiency[i])?;
            let curve = match &self.efficiency_flow {
                Some(ef) => curve.with_efficiency_flow(&ef[i])?,
                None => curve,
            };
            curves.push(curve);
        }
        Ok(curves)
    }

    /// Minimum-flow point of every speed line, one point per flow,
    /// sorted by flow.
    pub fn surge_seed_points(&self) -> SurgeResult<Vec<BoundarySample>> {
        let points: Vec<BoundarySample> =
            self.curves()?.iter().map(|c| c.min_flow_point()).collect();
        unique_by_flow(&points)
    }

    /// Maximum-flow point of every speed line, one point per flow,
    /// sorted by flow.
    pub fn stonewall_seed_points(&self) -> SurgeResult<Vec<BoundarySample>> {
        let points: Vec<BoundarySample> =
            self.curves()?.iter().map(|c| c.max_flow_point()).collect();
        unique_by_flow(&points)
    }
}

/// Sort samples by flow and keep the last head seen for each flow.
pub fn unique_by_flow(points: &[BoundarySample]) -> SurgeResult<Vec<BoundarySample>> {
    let flows: Vec<f64> = points.iter().map(|p| p.flow).collect();
    let heads: Vec<f64> = points.iter().map(|p| p.head).collect();
    let (flow, head, _) = sort_dedup_pairs(&flows, &heads)?;
    Ok(flow
        .into_iter()
        .zip(head)
        .map(|(flow, head)| BoundarySample { flow, head })
        .collect())
}
