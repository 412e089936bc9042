// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Anti-Surge Controller
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Recycle valve controller.
//!
//! Each strategy maps the surge margin to a target valve position in
//! [0, 1]. The target then passes through the valve actuator (lag and
//! slew rate) before it becomes the applied position. Surge cycles are
//! counted on the rising edge of the surge flag and latch a trip request
//! once the configured count is reached.

use crate::constraints::{ValveActuator, VALVE_CLOSED, VALVE_OPEN};
use crate::pid::PidLoop;
use surge_types::config::{AntiSurgeConfig, ControlStrategy};
use surge_types::constants::{ANTI_WINDUP_HIGH, ANTI_WINDUP_LOW};
use surge_types::error::{require_positive_dt, SurgeError, SurgeResult};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct AntiSurgeController {
    config: AntiSurgeConfig,
    strategy: ControlStrategy,
    active: bool,
    in_surge: bool,
    actuator: ValveActuator,
    valve_position: f64,
    target_valve_position: f64,
    pid: PidLoop,
    surge_cycles: u32,
    time_since_last_surge: f64,
    trip_latched: bool,
    previous_margin: Option<f64>,
    current_surge_fraction: f64,
    previous_surge_fraction: f64,
}

impl AntiSurgeController {
    pub fn new(config: AntiSurgeConfig) -> SurgeResult<Self> {
        config.validate()?;
        Ok(AntiSurgeController {
            strategy: config.strategy,
            active: true,
            in_surge: false,
            actuator: ValveActuator::new(config.valve_rate_limit, config.valve_response_time),
            valve_position: VALVE_CLOSED,
            target_valve_position: VALVE_CLOSED,
            pid: PidLoop::new(config.kp, config.ki, config.kd),
            surge_cycles: 0,
            time_since_last_surge: 0.0,
            trip_latched: false,
            previous_margin: None,
            current_surge_fraction: 0.0,
            previous_surge_fraction: 0.0,
            config,
        })
    }

    /// Advance the controller by `dt` seconds at the given surge margin.
    /// Returns the applied valve position.
    pub fn update(&mut self, surge_margin: f64, dt: f64) -> SurgeResult<f64> {
        require_positive_dt(dt)?;
        if !surge_margin.is_finite() {
            return Err(SurgeError::Precondition(format!(
                "surge margin must be finite, got {surge_margin}"
            )));
        }

        self.track_surge_cycles(surge_margin, dt);

        let target = if self.active {
            self.strategy_target(surge_margin, dt)
        } else {
            VALVE_CLOSED
        };
        self.target_valve_position = target.clamp(VALVE_CLOSED, VALVE_OPEN);
        self.valve_position =
            self.actuator
                .enforce(self.target_valve_position, self.valve_position, dt);
        self.previous_margin = Some(surge_margin);

        debug!(
            strategy = ?self.strategy,
            margin = surge_margin,
            target = self.target_valve_position,
            valve = self.valve_position,
            "anti-surge update"
        );
        Ok(self.valve_position)
    }

    fn track_surge_cycles(&mut self, margin: f64, dt: f64) {
        let was_in_surge = self.in_surge;
        self.in_surge = margin < 0.0;

        if self.in_surge && !was_in_surge {
            self.surge_cycles += 1;
            self.time_since_last_surge = 0.0;
            if !self.trip_latched && self.surge_cycles >= self.config.surge_cycle_trip_count {
                self.trip_latched = true;
                warn!(
                    cycles = self.surge_cycles,
                    threshold = self.config.surge_cycle_trip_count,
                    "surge cycle limit reached, trip requested"
                );
            }
        } else {
            self.time_since_last_surge += dt;
            if self.surge_cycles > 0 && self.time_since_last_surge > self.config.surge_cycle_reset_time {
                debug!(cycles = self.surge_cycles, "surge cycle counter reset");
                self.surge_cycles = 0;
            }
        }
    }

    fn strategy_target(&mut self, margin: f64, dt: f64) -> f64 {
        match self.strategy {
            ControlStrategy::OnOff => {
                if margin <= self.config.control_line_offset {
                    VALVE_OPEN
                } else {
                    VALVE_CLOSED
                }
            }
            ControlStrategy::Proportional => self.proportional(margin),
            ControlStrategy::Pid => {
                let error = self.config.pid_setpoint - margin;
                let integrate = self.valve_position > ANTI_WINDUP_LOW
                    && self.valve_position < ANTI_WINDUP_HIGH;
                self.pid.step(error, dt, integrate)
            }
            ControlStrategy::Predictive => {
                let approach_rate = match self.previous_margin {
                    Some(prev) => (prev - margin) / dt,
                    None => 0.0,
                };
                let predicted = margin - approach_rate * self.config.prediction_horizon;
                let gain = self.config.prediction_gain;
                (1.0 - gain) * self.proportional(margin) + gain * self.proportional(predicted)
            }
            // Capacity loop not implemented, the surge loop drives the valve alone.
            ControlStrategy::DualLoop => self.proportional(margin),
        }
    }

    /// Linear ramp: closed at twice the control line, open at the surge line.
    fn proportional(&self, margin: f64) -> f64 {
        let upper = 2.0 * self.config.control_line_offset * self.config.safety_factor;
        if margin >= upper {
            VALVE_CLOSED
        } else if margin <= 0.0 {
            VALVE_OPEN
        } else {
            1.0 - margin / upper
        }
    }

    /// Recycle fraction needed to keep `flow` at the control line.
    pub fn required_recycle_fraction(&mut self, flow: f64, surge_flow: f64) -> f64 {
        let fraction = if flow <= 0.0 || !flow.is_finite() {
            0.0
        } else {
            (self.config.surge_control_factor * surge_flow / flow - 1.0).max(0.0)
        };
        self.previous_surge_fraction = self.current_surge_fraction;
        self.current_surge_fraction = fraction;
        fraction
    }

    pub fn config(&self) -> &AntiSurgeConfig {
        &self.config
    }

    pub fn strategy(&self) -> ControlStrategy {
        self.strategy
    }

    /// Switch strategy. PID state is cleared.
    pub fn set_strategy(&mut self, strategy: ControlStrategy) {
        if strategy != self.strategy {
            debug!(from = ?self.strategy, to = ?strategy, "control strategy changed");
        }
        self.strategy = strategy;
        self.pid.reset();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_in_surge(&self) -> bool {
        self.in_surge
    }

    pub fn valve_position(&self) -> f64 {
        self.valve_position
    }

    pub fn target_valve_position(&self) -> f64 {
        self.target_valve_position
    }

    pub fn surge_cycle_count(&self) -> u32 {
        self.surge_cycles
    }

    pub fn time_since_last_surge(&self) -> f64 {
        self.time_since_last_surge
    }

    /// Sticky once the surge cycle count reaches the trip threshold.
    pub fn should_trip(&self) -> bool {
        self.trip_latched
    }

    pub fn pid_integral(&self) -> f64 {
        self.pid.integral()
    }

    pub fn pid_last_error(&self) -> Option<f64> {
        self.pid.last_error()
    }

    pub fn current_surge_fraction(&self) -> f64 {
        self.current_surge_fraction
    }

    pub fn previous_surge_fraction(&self) -> f64 {
        self.previous_surge_fraction
    }

    /// Clear a latched trip and the cycle counter.
    pub fn acknowledge_trip(&mut self) -> SurgeResult<()> {
        if !self.trip_latched {
            return Err(SurgeError::Precondition(
                "no surge trip is latched".to_string(),
            ));
        }
        self.trip_latched = false;
        self.surge_cycles = 0;
        self.time_since_last_surge = 0.0;
        Ok(())
    }

    /// Drop the margin history and PID state when the controller stops
    /// being stepped. The next update starts without an approach rate.
    /// Valve position, cycle count and trip latch are kept.
    pub fn disengage(&mut self) {
        self.previous_margin = None;
        self.pid.reset();
    }

    /// Margin seen by the last update since construction, reset or
    /// disengagement.
    pub fn last_margin(&self) -> Option<f64> {
        self.previous_margin
    }

    /// Return to the freshly constructed state, keeping strategy and
    /// configuration.
    pub fn reset(&mut self) {
        self.in_surge = false;
        self.valve_position = VALVE_CLOSED;
        self.target_valve_position = VALVE_CLOSED;
        self.pid.reset();
        self.surge_cycles = 0;
        self.time_since_last_surge = 0.0;
        self.trip_latched = false;
        self.previous_margin = None;
        self.current_surge_fraction = 0.0;
        self.previous_surge_fraction = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(strategy: ControlStrategy) -> AntiSurgeController {
        let config = AntiSurgeConfig {
            strategy,
            valve_rate_limit: 0.0,
            ..AntiSurgeConfig::default()
        };
        AntiSurgeController::new(config).unwrap()
    }

    #[test]
    fn test_on_off_threshold() {
        let mut c = controller(ControlStrategy::OnOff);
        assert_eq!(c.update(0.10, 1.0).unwrap(), 1.0);
        assert_eq!(c.update(0.11, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn test_proportional_ramp() {
        let mut c = controller(ControlStrategy::Proportional);
        assert_eq!(c.update(0.25, 1.0).unwrap(), 0.0);
        assert!((c.update(0.10, 1.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((c.update(0.05, 1.0).unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(c.update(-0.1, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_pid_trace_and_saturation() {
        let mut c = controller(ControlStrategy::Pid);
        let first = c.update(0.05, 1.0).unwrap();
        assert!((first - 0.1).abs() < 1e-12, "first tick = {first}");
        let second = c.update(0.05, 1.0).unwrap();
        assert!((second - 0.125).abs() < 1e-12, "second tick = {second}");
        let mut last = second;
        for _ in 0..98 {
            last = c.update(0.05, 1.0).unwrap();
        }
        assert!((last - 1.0).abs() < 1e-9, "saturated output = {last}");
    }

    #[test]
    fn test_pid_anti_windup_freezes_integral() {
        let mut c = controller(ControlStrategy::Pid);
        for _ in 0..100 {
            c.update(0.05, 1.0).unwrap();
        }
        let frozen = c.pid_integral();
        c.update(0.05, 1.0).unwrap();
        assert_eq!(c.pid_integral(), frozen, "integral must not grow at saturation");
    }

    #[test]
    fn test_predictive_uses_approach_rate() {
        let mut c = controller(ControlStrategy::Predictive);
        let steady = c.update(0.2, 1.0).unwrap();
        assert_eq!(steady, 0.0);
        // rate 0.05/s, horizon 5 s: predicted margin -0.1
        let v = c.update(0.15, 1.0).unwrap();
        assert!((v - (0.5 * 0.25 + 0.5 * 1.0)).abs() < 1e-12, "v = {v}");
    }

    #[test]
    fn test_disengage_forgets_approach_rate() {
        let mut c = controller(ControlStrategy::Predictive);
        c.update(0.3, 1.0).unwrap();
        c.disengage();
        assert_eq!(c.last_margin(), None);
        // Without history the prediction equals the current margin.
        let v = c.update(0.15, 1.0).unwrap();
        assert!((v - 0.25).abs() < 1e-12, "v = {v}");
        assert_eq!(c.last_margin(), Some(0.15));
    }

    #[test]
    fn test_dual_loop_matches_proportional() {
        let mut dual = controller(ControlStrategy::DualLoop);
        let mut prop = controller(ControlStrategy::Proportional);
        for m in [0.3, 0.12, 0.04, -0.02] {
            assert_eq!(dual.update(m, 0.5).unwrap(), prop.update(m, 0.5).unwrap());
        }
    }

    #[test]
    fn test_rate_limit_applied() {
        let mut c = AntiSurgeController::new(AntiSurgeConfig {
            strategy: ControlStrategy::OnOff,
            valve_rate_limit: 0.2,
            ..AntiSurgeConfig::default()
        })
        .unwrap();
        let v = c.update(-0.5, 0.5).unwrap();
        assert!((v - 0.1).abs() < 1e-12);
        assert_eq!(c.target_valve_position(), 1.0);
    }

    #[test]
    fn test_inactive_closes_valve() {
        let mut c = controller(ControlStrategy::OnOff);
        c.update(-0.1, 1.0).unwrap();
        c.set_active(false);
        assert_eq!(c.update(-0.1, 1.0).unwrap(), 0.0);
        assert!(c.is_in_surge());
    }

    #[test]
    fn test_rejects_bad_step() {
        let mut c = controller(ControlStrategy::Pid);
        assert!(matches!(c.update(0.1, 0.0), Err(SurgeError::Precondition(_))));
        assert!(matches!(c.update(0.1, f64::NAN), Err(SurgeError::Precondition(_))));
        assert!(matches!(c.update(f64::INFINITY, 1.0), Err(SurgeError::Precondition(_))));
        assert_eq!(c.valve_position(), 0.0);
    }

    #[test]
    fn test_surge_cycles_latch_trip() {
        let mut c = controller(ControlStrategy::Proportional);
        for cycle in 1..=3u32 {
            c.update(-0.05, 1.0).unwrap();
            assert_eq!(c.surge_cycle_count(), cycle);
            c.update(0.2, 1.0).unwrap();
        }
        assert!(c.should_trip());
        // Sticky across the idle reset
        for _ in 0..400 {
            c.update(0.3, 1.0).unwrap();
        }
        assert_eq!(c.surge_cycle_count(), 0);
        assert!(c.should_trip());
        c.acknowledge_trip().unwrap();
        assert!(!c.should_trip());
        assert!(c.acknowledge_trip().is_err());
    }

    #[test]
    fn test_cycle_counter_idle_reset() {
        let mut c = controller(ControlStrategy::Proportional);
        c.update(-0.05, 1.0).unwrap();
        c.update(0.2, 1.0).unwrap();
        for _ in 0..300 {
            c.update(0.2, 1.0).unwrap();
        }
        assert_eq!(c.surge_cycle_count(), 0);
        assert!(!c.should_trip());
    }

    #[test]
    fn test_required_recycle_fraction() {
        let mut c = controller(ControlStrategy::Proportional);
        assert!((c.required_recycle_fraction(1000.0, 1000.0) - 0.05).abs() < 1e-12);
        assert_eq!(c.required_recycle_fraction(2000.0, 1000.0), 0.0);
        assert!((c.previous_surge_fraction() - 0.05).abs() < 1e-12);
        assert_eq!(c.required_recycle_fraction(0.0, 1000.0), 0.0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut c = controller(ControlStrategy::Pid);
        c.update(-0.1, 1.0).unwrap();
        c.reset();
        assert_eq!(c.valve_position(), 0.0);
        assert_eq!(c.surge_cycle_count(), 0);
        assert_eq!(c.pid_last_error(), None);
        assert_eq!(c.last_margin(), None);
        assert_eq!(c.strategy(), ControlStrategy::Pid);
    }
}
