// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Valve Actuator Constraints
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Physical constraints on the recycle valve.
//! Enforces travel limits, a first-order lag and a slew rate.

/// Fully closed and fully open valve positions.
pub const VALVE_CLOSED: f64 = 0.0;
pub const VALVE_OPEN: f64 = 1.0;

/// Recycle valve actuator model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValveActuator {
    /// Maximum travel per second (fraction/s). Non-positive disables it.
    pub max_slew_rate: f64,
    /// First-order time constant (s). Non-positive disables it.
    pub response_time: f64,
}

impl ValveActuator {
    pub fn new(max_slew_rate: f64, response_time: f64) -> Self {
        Self {
            max_slew_rate,
            response_time,
        }
    }

    /// Position reached after `dt` when `requested` is commanded from
    /// `current`.
    pub fn enforce(&self, requested: f64, current: f64, dt: f64) -> f64 {
        let requested = requested.clamp(VALVE_CLOSED, VALVE_OPEN);
        let mut delta = requested - current;

        // 1. Actuator lag
        if self.response_time > 0.0 {
            delta *= 1.0 - (-dt / self.response_time).exp();
        }

        // 2. Slew rate
        if self.max_slew_rate > 0.0 {
            let max_delta = self.max_slew_rate * dt;
            delta = delta.clamp(-max_delta, max_delta);
        }

        // 3. Travel limits
        (current + delta).clamp(VALVE_CLOSED, VALVE_OPEN)
    }

    /// Largest move allowed in one step of length `dt`.
    pub fn max_step(&self, dt: f64) -> f64 {
        if self.max_slew_rate > 0.0 {
            self.max_slew_rate * dt
        } else {
            VALVE_OPEN - VALVE_CLOSED
        }
    }
}
