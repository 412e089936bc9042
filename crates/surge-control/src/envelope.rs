// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Operating Envelope
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Surge and stonewall lines plus scalar limits, reduced to normalized
//! margins. A margin is positive inside the envelope and negative once
//! the constraint is violated.

use serde::{Deserialize, Serialize};
use surge_map::boundary::{
    BoundaryKind, BoundaryLine, PolynomialBoundaryCurve, SplineBoundaryCurve,
};
use surge_map::corrections::multistage_surge_correction;
use surge_map::map::PerformanceMap;
use surge_types::config::EnvelopeLimits;
use surge_types::error::{SurgeError, SurgeResult};

const LIMIT_FLOOR: f64 = 1e-12;

/// Boundary line from discrete points or a fitted polynomial.
#[derive(Debug, Clone)]
pub enum EnvelopeBoundary {
    Points(SplineBoundaryCurve),
    Polynomial(PolynomialBoundaryCurve),
}

impl BoundaryLine for EnvelopeBoundary {
    fn kind(&self) -> BoundaryKind {
        match self {
            EnvelopeBoundary::Points(c) => c.kind(),
            EnvelopeBoundary::Polynomial(c) => c.kind(),
        }
    }

    fn flow_at_head(&self, head: f64) -> f64 {
        match self {
            EnvelopeBoundary::Points(c) => c.flow_at_head(head),
            EnvelopeBoundary::Polynomial(c) => c.flow_at_head(head),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Surge,
    Stonewall,
    MaxSpeed,
    MinSpeed,
    MaxPower,
    MinPower,
    MaxHead,
    MaxDischargeTemperature,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Surge => "surge",
            ConstraintKind::Stonewall => "stonewall",
            ConstraintKind::MaxSpeed => "maximum speed",
            ConstraintKind::MinSpeed => "minimum speed",
            ConstraintKind::MaxPower => "maximum power",
            ConstraintKind::MinPower => "minimum power",
            ConstraintKind::MaxHead => "maximum head",
            ConstraintKind::MaxDischargeTemperature => "maximum discharge temperature",
        }
    }
}

/// Normalized margin to one constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintMargin {
    pub kind: ConstraintKind,
    pub margin: f64,
    /// Operating value compared against the limit (flow for the boundary
    /// lines).
    pub value: f64,
    pub limit: f64,
}

/// Operating point queried against the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatingQuery {
    pub flow: f64,
    pub head: f64,
    pub speed: f64,
    pub power: Option<f64>,
    pub discharge_temperature: Option<f64>,
}

impl OperatingQuery {
    pub fn new(flow: f64, head: f64, speed: f64) -> Self {
        OperatingQuery {
            flow,
            head,
            speed,
            power: None,
            discharge_temperature: None,
        }
    }
}

fn max_limit(kind: ConstraintKind, value: f64, limit: f64) -> ConstraintMargin {
    ConstraintMargin {
        kind,
        margin: (limit - value) / limit.abs().max(LIMIT_FLOOR),
        value,
        limit,
    }
}

fn min_limit(kind: ConstraintKind, value: f64, limit: f64) -> ConstraintMargin {
    ConstraintMargin {
        kind,
        margin: (value - limit) / limit.abs().max(LIMIT_FLOOR),
        value,
        limit,
    }
}

#[derive(Debug, Clone)]
pub struct OperatingEnvelope {
    surge: Option<EnvelopeBoundary>,
    stonewall: Option<EnvelopeBoundary>,
    limits: EnvelopeLimits,
    stages: u32,
}

impl OperatingEnvelope {
    pub fn new(limits: EnvelopeLimits) -> SurgeResult<Self> {
        limits.validate()?;
        Ok(OperatingEnvelope {
            surge: None,
            stonewall: None,
            limits,
            stages: 1,
        })
    }

    /// Envelope bounded by the surge and stonewall lines generated from
    /// a performance map.
    pub fn from_map(map: &PerformanceMap, limits: EnvelopeLimits) -> SurgeResult<Self> {
        Self::new(limits)?
            .with_surge(EnvelopeBoundary::Points(map.generate_surge_curve()?))?
            .with_stonewall(EnvelopeBoundary::Points(map.generate_stonewall_curve()?))
    }

    pub fn with_surge(mut self, boundary: EnvelopeBoundary) -> SurgeResult<Self> {
        self.set_surge(boundary)?;
        Ok(self)
    }

    pub fn with_stonewall(mut self, boundary: EnvelopeBoundary) -> SurgeResult<Self> {
        self.set_stonewall(boundary)?;
        Ok(self)
    }

    /// Number of compression stages sharing the surge line. Above one,
    /// the surge flow shifts up below rated speed.
    pub fn with_stages(mut self, stages: u32) -> SurgeResult<Self> {
        if stages == 0 {
            return Err(SurgeError::ConfigError("stage count must be >= 1".to_string()));
        }
        self.stages = stages;
        Ok(self)
    }

    pub fn set_surge(&mut self, boundary: EnvelopeBoundary) -> SurgeResult<()> {
        if boundary.kind() != BoundaryKind::Surge {
            return Err(SurgeError::ConfigError(
                "surge boundary must be fitted as a surge line".to_string(),
            ));
        }
        self.surge = Some(boundary);
        Ok(())
    }

    pub fn set_stonewall(&mut self, boundary: EnvelopeBoundary) -> SurgeResult<()> {
        if boundary.kind() != BoundaryKind::Stonewall {
            return Err(SurgeError::ConfigError(
                "stonewall boundary must be fitted as a stonewall line".to_string(),
            ));
        }
        self.stonewall = Some(boundary);
        Ok(())
    }

    pub fn set_limits(&mut self, limits: EnvelopeLimits) -> SurgeResult<()> {
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    pub fn limits(&self) -> &EnvelopeLimits {
        &self.limits
    }

    pub fn surge_boundary(&self) -> Option<&EnvelopeBoundary> {
        self.surge.as_ref()
    }

    pub fn stonewall_boundary(&self) -> Option<&EnvelopeBoundary> {
        self.stonewall.as_ref()
    }

    pub fn has_surge(&self) -> bool {
        self.surge.is_some()
    }

    /// `speed / rated_speed`, when a rated speed is configured.
    pub fn speed_ratio(&self, speed: f64) -> Option<f64> {
        self.limits
            .rated_speed
            .filter(|&rated| rated > 0.0)
            .map(|rated| speed / rated)
    }

    /// Surge flow at `head`, shifted for multistage machines below rated
    /// speed.
    pub fn surge_flow(&self, head: f64, speed: f64) -> Option<f64> {
        let base = self.surge.as_ref()?.flow_at_head(head);
        Some(match self.speed_ratio(speed) {
            Some(ratio) => multistage_surge_correction(base, ratio, self.stages),
            None => base,
        })
    }

    pub fn stonewall_flow(&self, head: f64) -> Option<f64> {
        Some(self.stonewall.as_ref()?.flow_at_head(head))
    }

    pub fn surge_margin(&self, query: &OperatingQuery) -> Option<f64> {
        self.surge_constraint(query).map(|c| c.margin)
    }

    pub fn stonewall_margin(&self, query: &OperatingQuery) -> Option<f64> {
        self.stonewall_constraint(query).map(|c| c.margin)
    }

    fn surge_constraint(&self, q: &OperatingQuery) -> Option<ConstraintMargin> {
        let limit = self.surge_flow(q.head, q.speed)?;
        Some(ConstraintMargin {
            kind: ConstraintKind::Surge,
            margin: BoundaryKind::Surge.margin(q.flow, limit),
            value: q.flow,
            limit,
        })
    }

    fn stonewall_constraint(&self, q: &OperatingQuery) -> Option<ConstraintMargin> {
        let limit = self.stonewall_flow(q.head)?;
        Some(ConstraintMargin {
            kind: ConstraintKind::Stonewall,
            margin: BoundaryKind::Stonewall.margin(q.flow, limit),
            value: q.flow,
            limit,
        })
    }

    fn speed_constraints(&self, q: &OperatingQuery) -> Vec<ConstraintMargin> {
        let l = &self.limits;
        let mut out = Vec::with_capacity(2);
        if let Some(max) = l.max_speed {
            out.push(max_limit(ConstraintKind::MaxSpeed, q.speed, max));
        }
        if let Some(min) = l.min_speed {
            out.push(min_limit(ConstraintKind::MinSpeed, q.speed, min));
        }
        out
    }

    /// Every configured constraint the query carries a value for.
    pub fn margins(&self, query: &OperatingQuery) -> Vec<ConstraintMargin> {
        let l = &self.limits;
        let mut out = Vec::with_capacity(8);
        out.extend(self.surge_constraint(query));
        out.extend(self.stonewall_constraint(query));
        out.extend(self.speed_constraints(query));
        if let Some(power) = query.power {
            if let Some(max) = l.max_power {
                out.push(max_limit(ConstraintKind::MaxPower, power, max));
            }
            if let Some(min) = l.min_power {
                out.push(min_limit(ConstraintKind::MinPower, power, min));
            }
        }
        if let Some(max) = l.max_head {
            out.push(max_limit(ConstraintKind::MaxHead, query.head, max));
        }
        if let (Some(t), Some(max)) = (query.discharge_temperature, l.max_discharge_temperature) {
            out.push(max_limit(ConstraintKind::MaxDischargeTemperature, t, max));
        }
        out
    }

    /// Constraint with the smallest margin. Ties go to the earlier entry
    /// of [`margins`](Self::margins).
    pub fn limiting_constraint(&self, query: &OperatingQuery) -> Option<ConstraintMargin> {
        self.margins(query)
            .into_iter()
            .reduce(|best, c| if c.margin < best.margin { c } else { best })
    }

    /// Smallest of the surge, stonewall and speed margins.
    pub fn distance_to_envelope(&self, query: &OperatingQuery) -> Option<f64> {
        self.surge_constraint(query)
            .into_iter()
            .chain(self.stonewall_constraint(query))
            .chain(self.speed_constraints(query))
            .map(|c| c.margin)
            .reduce(f64::min)
    }

    pub fn is_within_envelope(&self, query: &OperatingQuery) -> bool {
        self.margins(query).iter().all(|c| c.margin >= 0.0)
    }

    /// Description of the most violated constraint, if any is violated.
    pub fn violation(&self, query: &OperatingQuery) -> Option<String> {
        let worst = self.limiting_constraint(query)?;
        if worst.margin >= 0.0 {
            return None;
        }
        Some(format!(
            "{} exceeded: value {:.3}, limit {:.3}, margin {:.1}%",
            worst.kind.as_str(),
            worst.value,
            worst.limit,
            worst.margin * 100.0
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> OperatingEnvelope {
        let surge =
            SplineBoundaryCurve::surge(&[100.0, 200.0, 300.0], &[50.0, 40.0, 30.0]).unwrap();
        let stonewall =
            SplineBoundaryCurve::stonewall(&[500.0, 600.0, 700.0], &[50.0, 40.0, 30.0]).unwrap();
        let limits = EnvelopeLimits {
            min_speed: Some(5000.0),
            max_speed: Some(10000.0),
            rated_speed: Some(9000.0),
            max_power: Some(2000.0),
            min_power: Some(100.0),
            max_head: Some(60.0),
            max_discharge_temperature: Some(450.0),
        };
        OperatingEnvelope::new(limits)
            .unwrap()
            .with_surge(EnvelopeBoundary::Points(surge))
            .unwrap()
            .with_stonewall(EnvelopeBoundary::Points(stonewall))
            .unwrap()
    }

    #[test]
    fn test_surge_and_stonewall_margins() {
        let env = envelope();
        let q = OperatingQuery::new(300.0, 40.0, 9000.0);
        assert!((env.surge_margin(&q).unwrap() - 0.5).abs() < 1e-9);
        assert!((env.stonewall_margin(&q).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_margins_cover_configured_limits() {
        let env = envelope();
        let q = OperatingQuery {
            power: Some(1500.0),
            discharge_temperature: Some(400.0),
            ..OperatingQuery::new(300.0, 40.0, 9000.0)
        };
        let m = env.margins(&q);
        assert_eq!(m.len(), 8);
        let max_speed = m.iter().find(|c| c.kind == ConstraintKind::MaxSpeed).unwrap();
        assert!((max_speed.margin - 0.1).abs() < 1e-12);
        let min_power = m.iter().find(|c| c.kind == ConstraintKind::MinPower).unwrap();
        assert!((min_power.margin - 14.0).abs() < 1e-12);
        // Power and temperature omitted without measurements
        assert_eq!(env.margins(&OperatingQuery::new(300.0, 40.0, 9000.0)).len(), 5);
    }

    #[test]
    fn test_limiting_constraint_and_violation() {
        let env = envelope();
        let q = OperatingQuery::new(300.0, 40.0, 9800.0);
        let worst = env.limiting_constraint(&q).unwrap();
        assert_eq!(worst.kind, ConstraintKind::MaxSpeed);
        assert!(env.is_within_envelope(&q));
        assert!(env.violation(&q).is_none());

        let surging = OperatingQuery::new(150.0, 40.0, 9000.0);
        let worst = env.limiting_constraint(&surging).unwrap();
        assert_eq!(worst.kind, ConstraintKind::Surge);
        assert!(worst.margin < 0.0);
        assert!(!env.is_within_envelope(&surging));
        assert!(env.violation(&surging).unwrap().starts_with("surge exceeded"));
    }

    #[test]
    fn test_distance_to_envelope_ignores_power() {
        let env = envelope();
        let q = OperatingQuery {
            power: Some(2500.0),
            ..OperatingQuery::new(300.0, 40.0, 9000.0)
        };
        let d = env.distance_to_envelope(&q).unwrap();
        assert!((d - 0.1).abs() < 1e-12, "d = {d}");
        assert!(!env.is_within_envelope(&q));
    }

    #[test]
    fn test_empty_envelope() {
        let env = OperatingEnvelope::new(EnvelopeLimits::default()).unwrap();
        let q = OperatingQuery::new(300.0, 40.0, 9000.0);
        assert!(env.surge_margin(&q).is_none());
        assert!(env.limiting_constraint(&q).is_none());
        assert!(env.distance_to_envelope(&q).is_none());
        assert!(env.is_within_envelope(&q));
    }

    #[test]
    fn test_rejects_wrong_boundary_kind_and_limits() {
        let stonewall =
            SplineBoundaryCurve::stonewall(&[500.0, 600.0], &[50.0, 40.0]).unwrap();
        let env = OperatingEnvelope::new(EnvelopeLimits::default()).unwrap();
        assert!(env.with_surge(EnvelopeBoundary::Points(stonewall)).is_err());
        let bad = EnvelopeLimits {
            min_speed: Some(9000.0),
            max_speed: Some(8000.0),
            ..EnvelopeLimits::default()
        };
        assert!(OperatingEnvelope::new(bad).is_err());
    }

    #[test]
    fn test_polynomial_boundary() {
        let poly = PolynomialBoundaryCurve::fit(
            BoundaryKind::Surge,
            &[100.0, 200.0, 300.0],
            &[50.0, 40.0, 30.0],
        )
        .unwrap();
        let env = OperatingEnvelope::new(EnvelopeLimits::default())
            .unwrap()
            .with_surge(EnvelopeBoundary::Polynomial(poly))
            .unwrap();
        let q = OperatingQuery::new(400.0, 40.0, 9000.0);
        assert!((env.surge_margin(&q).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_multistage_shift_below_rated() {
        let env = envelope().with_stages(3).unwrap();
        // 80 % of rated speed: surge flow 200 shifted by 3 % · 0.4
        let flow = env.surge_flow(40.0, 7200.0).unwrap();
        assert!((flow - 200.0 * 1.012).abs() < 1e-6, "flow = {flow}");
        assert!((env.surge_flow(40.0, 9000.0).unwrap() - 200.0).abs() < 1e-9);
        assert!(envelope().with_stages(0).is_err());
    }
}
