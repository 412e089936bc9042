// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — PID
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! PID loop on surge margin.
//!
//! Integral is accumulated in error·seconds and only when the caller
//! allows it (anti-windup). The derivative is taken over the time step
//! and is zero on the first step after a reset.

/// Generic PID loop with time-step aware integral and derivative.
#[derive(Debug, Clone)]
pub struct PidLoop {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    err_sum: f64,
    last_err: Option<f64>,
}

impl PidLoop {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        PidLoop {
            kp,
            ki,
            kd,
            err_sum: 0.0,
            last_err: None,
        }
    }

    /// One PID step. Returns the unclamped control output.
    pub fn step(&mut self, error: f64, dt: f64, integrate: bool) -> f64 {
        if integrate {
            self.err_sum += error * dt;
        }
        let d_err = match self.last_err {
            Some(last) => (error - last) / dt,
            None => 0.0,
        };
        self.last_err = Some(error);
        self.kp * error + self.ki * self.err_sum + self.kd * d_err
    }

    pub fn integral(&self) -> f64 {
        self.err_sum
    }

    pub fn last_error(&self) -> Option<f64> {
        self.last_err
    }

    /// Reset accumulated state.
    pub fn reset(&mut self) {
        self.err_sum = 0.0;
        self.last_err = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_zero_error() {
        let mut pid = PidLoop::new(1.0, 0.1, 0.5);
        let out = pid.step(0.0, 1.0, true);
        assert!(out.abs() < 1e-10, "Zero error → zero output: {out}");
    }

    #[test]
    fn test_pid_proportional() {
        let mut pid = PidLoop::new(2.0, 0.0, 0.0);
        let out = pid.step(5.0, 0.1, true);
        assert!((out - 10.0).abs() < 1e-10, "P-only: 2*5 = 10, got {out}");
    }

    #[test]
    fn test_pid_integral_scales_with_dt() {
        let mut pid = PidLoop::new(0.0, 1.0, 0.0);
        pid.step(1.0, 0.5, true);
        let out = pid.step(1.0, 0.5, true);
        assert!((out - 1.0).abs() < 1e-12, "∫ 1 dt over 1 s = 1, got {out}");
    }

    #[test]
    fn test_pid_integral_frozen() {
        let mut pid = PidLoop::new(0.0, 1.0, 0.0);
        pid.step(1.0, 1.0, false);
        pid.step(1.0, 1.0, false);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_pid_derivative_no_first_kick() {
        let mut pid = PidLoop::new(0.0, 0.0, 1.0);
        assert_eq!(pid.step(3.0, 0.1, true), 0.0);
        let out = pid.step(4.0, 0.1, true);
        assert!((out - 10.0).abs() < 1e-9, "(4-3)/0.1 = 10, got {out}");
    }

    #[test]
    fn test_pid_reset() {
        let mut pid = PidLoop::new(1.0, 1.0, 1.0);
        pid.step(10.0, 1.0, true);
        pid.step(10.0, 1.0, true);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert!(pid.last_error().is_none());
    }
}
