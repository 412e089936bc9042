// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Startup / Shutdown Profiles
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Time-indexed speed trajectories for starting and stopping the machine.

use serde::{Deserialize, Serialize};
use surge_math::interp::lerp;
use surge_types::config::{ShutdownRates, SpeedTarget, StartupStep};
use surge_types::constants::{SHUTDOWN_COMPLETE_FRACTION, STOPPED_SPEED_RPM};
use surge_types::error::{SurgeError, SurgeResult};

/// Ordered startup sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupProfile {
    steps: Vec<StartupStep>,
    requires_antisurge_open: bool,
}

impl Default for StartupProfile {
    fn default() -> Self {
        StartupProfile {
            steps: vec![
                StartupStep::new(
                    0.0,
                    SpeedTarget::Fixed(0.0),
                    5.0,
                    "Initiate start, open anti-surge valve",
                ),
                StartupStep::new(
                    30.0,
                    SpeedTarget::Fixed(1000.0),
                    60.0,
                    "Minimum idle speed, warm-up hold",
                ),
                StartupStep::new(
                    120.0,
                    SpeedTarget::Fixed(3000.0),
                    30.0,
                    "Intermediate speed check",
                ),
                StartupStep::new(210.0, SpeedTarget::RampToFinal, 0.0, "Ramp to operating speed"),
            ],
            requires_antisurge_open: true,
        }
    }
}

impl StartupProfile {
    /// Build from configured steps. Steps are sorted by time; hold
    /// windows may not reach into the next step.
    pub fn from_steps(mut steps: Vec<StartupStep>, requires_antisurge_open: bool) -> SurgeResult<Self> {
        if steps.is_empty() {
            return Err(SurgeError::ConfigError(
                "startup profile needs at least one step".to_string(),
            ));
        }
        for step in &steps {
            if !(step.time.is_finite() && step.time >= 0.0) {
                return Err(SurgeError::ConfigError(format!(
                    "startup step time must be finite and >= 0, got {}",
                    step.time
                )));
            }
            if !(step.hold.is_finite() && step.hold >= 0.0) {
                return Err(SurgeError::ConfigError(format!(
                    "startup step hold must be finite and >= 0, got {}",
                    step.hold
                )));
            }
            if let SpeedTarget::Fixed(speed) = step.target {
                if !(speed.is_finite() && speed >= 0.0) {
                    return Err(SurgeError::ConfigError(format!(
                        "startup step speed must be finite and >= 0, got {speed}"
                    )));
                }
            }
        }
        steps.sort_by(|a, b| a.time.total_cmp(&b.time));
        for pair in steps.windows(2) {
            if pair[0].time + pair[0].hold > pair[1].time {
                return Err(SurgeError::ConfigError(format!(
                    "hold at t={} runs past the next step at t={}",
                    pair[0].time, pair[1].time
                )));
            }
        }
        Ok(StartupProfile {
            steps,
            requires_antisurge_open,
        })
    }

    pub fn steps(&self) -> &[StartupStep] {
        &self.steps
    }

    fn step_index(&self, elapsed: f64) -> usize {
        self.steps
            .partition_point(|s| s.time <= elapsed)
            .saturating_sub(1)
    }

    /// Target speed at `elapsed` seconds after the start command.
    pub fn target_speed_at(&self, elapsed: f64, final_speed: f64) -> f64 {
        let i = self.step_index(elapsed);
        let step = &self.steps[i];
        let speed = step.target.resolve(final_speed);
        let hold_end = step.time + step.hold;
        if elapsed <= hold_end || i + 1 == self.steps.len() {
            return speed;
        }
        let next = &self.steps[i + 1];
        lerp(hold_end, speed, next.time, next.target.resolve(final_speed), elapsed)
    }

    pub fn current_step(&self, elapsed: f64) -> &StartupStep {
        &self.steps[self.step_index(elapsed)]
    }

    pub fn phase_description(&self, elapsed: f64) -> &str {
        if elapsed >= self.total_duration() {
            "Startup complete"
        } else {
            &self.current_step(elapsed).description
        }
    }

    /// Time of the last step plus its hold.
    pub fn total_duration(&self) -> f64 {
        self.steps
            .last()
            .map(|s| s.time + s.hold)
            .unwrap_or(0.0)
    }

    /// Fraction of the sequence elapsed, in [0, 1].
    pub fn progress(&self, elapsed: f64) -> f64 {
        let total = self.total_duration();
        if total <= 0.0 {
            return 1.0;
        }
        (elapsed / total).clamp(0.0, 1.0)
    }

    pub fn requires_antisurge_open(&self) -> bool {
        self.requires_antisurge_open
    }

    pub fn is_startup_complete(&self, elapsed: f64, actual_speed: f64, final_speed: f64, tolerance: f64) -> bool {
        elapsed >= self.total_duration() && (actual_speed - final_speed).abs() <= tolerance
    }
}

/// Shutdown archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownType {
    /// Unload, then ramp down at the normal rate.
    Normal,
    /// Short unload, then ramp down at the rapid rate.
    Rapid,
    /// Immediate ramp down at the emergency rate.
    Emergency,
    /// Driver de-energized, rotor coasts down.
    Coastdown,
}

impl ShutdownType {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownType::Normal => "normal",
            ShutdownType::Rapid => "rapid",
            ShutdownType::Emergency => "emergency",
            ShutdownType::Coastdown => "coastdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownPoint {
    pub time: f64,
    pub speed: f64,
    pub label: String,
}

impl ShutdownPoint {
    fn new(time: f64, speed: f64, label: &str) -> Self {
        ShutdownPoint {
            time,
            speed,
            label: label.to_string(),
        }
    }
}

/// Deceleration trajectory generated when a stop is commanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownProfile {
    kind: ShutdownType,
    start_speed: f64,
    points: Vec<ShutdownPoint>,
    /// Exponential time constant, coastdown only.
    decay_time: f64,
}

impl ShutdownProfile {
    pub fn new(kind: ShutdownType, start_speed: f64, rates: &ShutdownRates) -> SurgeResult<Self> {
        rates.validate()?;
        if !(start_speed.is_finite() && start_speed >= 0.0) {
            return Err(SurgeError::InvalidInput(format!(
                "shutdown start speed must be finite and >= 0, got {start_speed}"
            )));
        }
        let s0 = start_speed;
        let points = match kind {
            ShutdownType::Normal => unload_then_ramp(s0, rates.unload_time, rates.normal_ramp_rate),
            ShutdownType::Rapid => {
                unload_then_ramp(s0, rates.rapid_unload_time, rates.rapid_ramp_rate)
            }
            ShutdownType::Emergency => vec![
                ShutdownPoint::new(0.0, s0, "Emergency stop, driver tripped"),
                ShutdownPoint::new(s0 / rates.emergency_ramp_rate, 0.0, "Stopped"),
            ],
            ShutdownType::Coastdown => vec![
                ShutdownPoint::new(0.0, s0, "Driver de-energized, coasting down"),
                ShutdownPoint::new(rates.coastdown_time, 0.0, "Stopped"),
            ],
        };
        Ok(ShutdownProfile {
            kind,
            start_speed: s0,
            points,
            decay_time: rates.coastdown_time / 3.0,
        })
    }

    pub fn kind(&self) -> ShutdownType {
        self.kind
    }

    pub fn start_speed(&self) -> f64 {
        self.start_speed
    }

    pub fn points(&self) -> &[ShutdownPoint] {
        &self.points
    }

    fn point_index(&self, elapsed: f64) -> usize {
        self.points
            .partition_point(|p| p.time <= elapsed)
            .saturating_sub(1)
    }

    /// Target speed at `elapsed` seconds after the stop command.
    pub fn target_speed_at(&self, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            return self.start_speed;
        }
        let total = self.total_duration();
        if elapsed >= total {
            return 0.0;
        }
        if self.kind == ShutdownType::Coastdown {
            return self.start_speed * (-elapsed / self.decay_time).exp();
        }
        let i = self.point_index(elapsed);
        let (a, b) = (&self.points[i], &self.points[i + 1]);
        lerp(a.time, a.speed, b.time, b.speed, elapsed)
    }

    pub fn phase_description(&self, elapsed: f64) -> &str {
        &self.points[self.point_index(elapsed)].label
    }

    pub fn total_duration(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }

    /// Every archetype recycles from the moment the stop is commanded.
    pub fn should_open_antisurge(&self, elapsed: f64) -> bool {
        elapsed >= 0.0
    }

    pub fn is_shutdown_complete(&self, elapsed: f64, actual_speed: f64) -> bool {
        elapsed >= SHUTDOWN_COMPLETE_FRACTION * self.total_duration()
            && actual_speed < STOPPED_SPEED_RPM
    }
}

fn unload_then_ramp(start_speed: f64, unload_time: f64, ramp_rate: f64) -> Vec<ShutdownPoint> {
    vec![
        ShutdownPoint::new(0.0, start_speed, "Unloading, opening anti-surge valve"),
        ShutdownPoint::new(unload_time, start_speed, "Decelerating"),
        ShutdownPoint::new(unload_time + start_speed / ramp_rate, 0.0, "Stopped"),
    ]
}
