// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Alarm Monitor
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Latched operating alarms.
//!
//! Each condition raises one event when it becomes active and re-arms
//! once the measurement recovers past its threshold. The surge approach
//! has two levels: warning, then critical.

use serde::{Deserialize, Serialize};
use surge_types::config::{EnvelopeLimits, MachineConfig};
use tracing::warn;

/// Event raised by the machine sequence or the alarm monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MachineEvent {
    SurgeApproach { margin: f64, critical: bool },
    SurgeOccurred { margin: f64 },
    StonewallApproach { margin: f64 },
    /// `ratio` is speed over the maximum speed.
    SpeedLimitExceeded { speed: f64, ratio: f64 },
    /// `ratio` is speed over the minimum speed.
    SpeedBelowMinimum { speed: f64, ratio: f64 },
    PowerLimitExceeded { power: f64, limit: f64 },
    StartupComplete,
    ShutdownComplete,
}

impl MachineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MachineEvent::SurgeApproach { critical: true, .. } => "surge approach critical",
            MachineEvent::SurgeApproach { .. } => "surge approach warning",
            MachineEvent::SurgeOccurred { .. } => "surge",
            MachineEvent::StonewallApproach { .. } => "stonewall approach",
            MachineEvent::SpeedLimitExceeded { .. } => "speed limit exceeded",
            MachineEvent::SpeedBelowMinimum { .. } => "speed below minimum",
            MachineEvent::PowerLimitExceeded { .. } => "power limit exceeded",
            MachineEvent::StartupComplete => "startup complete",
            MachineEvent::ShutdownComplete => "shutdown complete",
        }
    }

    /// Abnormal condition, as opposed to a sequence milestone.
    pub fn is_alarm(&self) -> bool {
        !matches!(
            self,
            MachineEvent::StartupComplete | MachineEvent::ShutdownComplete
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: f64,
    pub event: MachineEvent,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlarmThresholds {
    pub surge_warning: f64,
    pub surge_critical: f64,
    pub stonewall_warning: f64,
    pub max_speed: Option<f64>,
    pub min_speed: Option<f64>,
    pub max_power: Option<f64>,
}

impl AlarmThresholds {
    pub fn new(config: &MachineConfig, limits: &EnvelopeLimits) -> Self {
        AlarmThresholds {
            surge_warning: config.surge_warning_threshold,
            surge_critical: config.surge_critical_threshold,
            stonewall_warning: config.stonewall_warning_threshold,
            max_speed: limits.max_speed,
            min_speed: limits.min_speed,
            max_power: limits.max_power,
        }
    }
}

/// Measurements checked on one operational tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmSample {
    pub surge_margin: f64,
    pub stonewall_margin: Option<f64>,
    /// rpm
    pub speed: f64,
    /// kW
    pub power: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Latches {
    surge_warning: bool,
    surge_critical: bool,
    surge: bool,
    stonewall: bool,
    overspeed: bool,
    underspeed: bool,
    power: bool,
}

#[derive(Debug, Clone)]
pub struct AlarmMonitor {
    thresholds: AlarmThresholds,
    latches: Latches,
}

/// Raise `event` when `active` turns on; clear the latch when it turns off.
fn edge(
    latch: &mut bool,
    active: bool,
    event: impl FnOnce() -> MachineEvent,
    out: &mut Vec<MachineEvent>,
) {
    if active && !*latch {
        out.push(event());
    }
    *latch = active;
}

impl AlarmMonitor {
    pub fn new(thresholds: AlarmThresholds) -> Self {
        AlarmMonitor {
            thresholds,
            latches: Latches::default(),
        }
    }

    pub fn thresholds(&self) -> &AlarmThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: AlarmThresholds) {
        self.thresholds = thresholds;
    }

    pub fn surge_warning_active(&self) -> bool {
        self.latches.surge_warning
    }

    pub fn surge_critical_active(&self) -> bool {
        self.latches.surge_critical
    }

    /// Events that became active with this sample.
    pub fn check(&mut self, sample: &AlarmSample) -> Vec<MachineEvent> {
        let t = &self.thresholds;
        let l = &mut self.latches;
        let mut raised = Vec::new();
        let m = sample.surge_margin;

        let approach = |critical| MachineEvent::SurgeApproach {
            margin: m,
            critical,
        };
        if m <= t.surge_critical {
            edge(&mut l.surge_critical, true, || approach(true), &mut raised);
        } else if m <= t.surge_warning {
            l.surge_critical = false;
            edge(&mut l.surge_warning, true, || approach(false), &mut raised);
        } else {
            l.surge_warning = false;
            l.surge_critical = false;
        }
        edge(&mut l.surge, m < 0.0, || MachineEvent::SurgeOccurred { margin: m }, &mut raised);

        let stonewall = sample.stonewall_margin.filter(|&s| s <= t.stonewall_warning);
        edge(
            &mut l.stonewall,
            stonewall.is_some(),
            || MachineEvent::StonewallApproach { margin: stonewall.unwrap_or_default() },
            &mut raised,
        );

        let speed = sample.speed;
        let over = t.max_speed.filter(|&max| max > 0.0 && speed > max);
        edge(
            &mut l.overspeed,
            over.is_some(),
            || MachineEvent::SpeedLimitExceeded { speed, ratio: over.map_or(0.0, |max| speed / max) },
            &mut raised,
        );
        let under = t.min_speed.filter(|&min| min > 0.0 && speed < min);
        edge(
            &mut l.underspeed,
            under.is_some(),
            || MachineEvent::SpeedBelowMinimum { speed, ratio: under.map_or(0.0, |min| speed / min) },
            &mut raised,
        );

        let over_power = match (sample.power, t.max_power) {
            (Some(p), Some(limit)) if p > limit => Some((p, limit)),
            _ => None,
        };
        edge(
            &mut l.power,
            over_power.is_some(),
            || {
                let (power, limit) = over_power.unwrap_or_default();
                MachineEvent::PowerLimitExceeded { power, limit }
            },
            &mut raised,
        );

        for event in &raised {
            warn!(event = event.name(), margin = m, speed, "operating alarm");
        }
        raised
    }

    /// Clear every latch so the next check raises active conditions again.
    pub fn rearm(&mut self) {
        self.latches = Latches::default();
    }
}
