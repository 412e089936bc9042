// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{SurgeError, SurgeResult};
use serde::{Deserialize, Serialize};

/// Top-level compressor protection configuration.
/// Maps 1:1 to `configs/default_compressor.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorConfig {
    pub name: String,
    #[serde(default)]
    pub controller: AntiSurgeConfig,
    #[serde(default)]
    pub limits: EnvelopeLimits,
    #[serde(default)]
    pub machine: MachineConfig,
    #[serde(default)]
    pub shutdown: ShutdownRates,
    /// Custom startup sequence. When absent the default sequence is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Vec<StartupStep>>,
}

impl CompressorConfig {
    /// Load from JSON file and validate every section.
    pub fn from_file(path: &str) -> SurgeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SurgeResult<()> {
        self.controller.validate()?;
        self.limits.validate()?;
        self.machine.validate()?;
        self.shutdown.validate()?;
        if let Some(steps) = &self.startup {
            if steps.is_empty() {
                return Err(SurgeError::ConfigError(
                    "startup sequence must contain at least one step".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Anti-surge control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlStrategy {
    OnOff,
    #[default]
    Proportional,
    Pid,
    Predictive,
    DualLoop,
}

/// Anti-surge controller tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiSurgeConfig {
    #[serde(default)]
    pub strategy: ControlStrategy,
    /// Surge margin at which the control line sits (fraction of surge flow).
    #[serde(default = "default_control_line_offset")]
    pub control_line_offset: f64,
    #[serde(default = "default_safety_factor")]
    pub safety_factor: f64,
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default = "default_ki")]
    pub ki: f64,
    #[serde(default = "default_kd")]
    pub kd: f64,
    #[serde(default = "default_pid_setpoint")]
    pub pid_setpoint: f64,
    /// Look-ahead for the predictive strategy (s).
    #[serde(default = "default_prediction_horizon")]
    pub prediction_horizon: f64,
    /// Weight of the predicted margin in [0, 1].
    #[serde(default = "default_prediction_gain")]
    pub prediction_gain: f64,
    /// Maximum valve travel per second (fraction/s). Zero disables the cap.
    #[serde(default = "default_valve_rate_limit")]
    pub valve_rate_limit: f64,
    /// First-order actuator lag (s). Zero disables the lag.
    #[serde(default)]
    pub valve_response_time: f64,
    #[serde(default = "default_surge_cycle_trip_count")]
    pub surge_cycle_trip_count: u32,
    /// Idle time after which the surge-cycle counter is cleared (s).
    #[serde(default = "default_surge_cycle_reset_time")]
    pub surge_cycle_reset_time: f64,
    /// Multiplier on surge flow used for the recycle fraction.
    #[serde(default = "default_surge_control_factor")]
    pub surge_control_factor: f64,
}

fn default_control_line_offset() -> f64 {
    0.10
}
fn default_safety_factor() -> f64 {
    1.0
}
fn default_kp() -> f64 {
    2.0
}
fn default_ki() -> f64 {
    0.5
}
fn default_kd() -> f64 {
    0.1
}
fn default_pid_setpoint() -> f64 {
    0.10
}
fn default_prediction_horizon() -> f64 {
    5.0
}
fn default_prediction_gain() -> f64 {
    0.5
}
fn default_valve_rate_limit() -> f64 {
    0.5
}
fn default_surge_cycle_trip_count() -> u32 {
    3
}
fn default_surge_cycle_reset_time() -> f64 {
    300.0
}
fn default_surge_control_factor() -> f64 {
    1.05
}

impl Default for AntiSurgeConfig {
    fn default() -> Self {
        AntiSurgeConfig {
            strategy: ControlStrategy::default(),
            control_line_offset: default_control_line_offset(),
            safety_factor: default_safety_factor(),
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
            pid_setpoint: default_pid_setpoint(),
            prediction_horizon: default_prediction_horizon(),
            prediction_gain: default_prediction_gain(),
            valve_rate_limit: default_valve_rate_limit(),
            valve_response_time: 0.0,
            surge_cycle_trip_count: default_surge_cycle_trip_count(),
            surge_cycle_reset_time: default_surge_cycle_reset_time(),
            surge_control_factor: default_surge_control_factor(),
        }
    }
}

impl AntiSurgeConfig {
    pub fn validate(&self) -> SurgeResult<()> {
        let finite = [
            ("control_line_offset", self.control_line_offset),
            ("safety_factor", self.safety_factor),
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("pid_setpoint", self.pid_setpoint),
            ("prediction_horizon", self.prediction_horizon),
            ("prediction_gain", self.prediction_gain),
            ("valve_rate_limit", self.valve_rate_limit),
            ("valve_response_time", self.valve_response_time),
            ("surge_cycle_reset_time", self.surge_cycle_reset_time),
            ("surge_control_factor", self.surge_control_factor),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(SurgeError::ConfigError(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.control_line_offset <= 0.0 || self.safety_factor <= 0.0 {
            return Err(SurgeError::ConfigError(format!(
                "control_line_offset ({}) and safety_factor ({}) must be > 0",
                self.control_line_offset, self.safety_factor
            )));
        }
        if self.valve_rate_limit < 0.0 || self.valve_response_time < 0.0 {
            return Err(SurgeError::ConfigError(
                "valve rate limit and response time must be >= 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prediction_gain) {
            return Err(SurgeError::ConfigError(format!(
                "prediction_gain must lie in [0, 1], got {}",
                self.prediction_gain
            )));
        }
        if self.prediction_horizon < 0.0 || self.surge_cycle_reset_time < 0.0 {
            return Err(SurgeError::ConfigError(
                "prediction horizon and surge-cycle reset time must be >= 0".to_string(),
            ));
        }
        if self.surge_cycle_trip_count == 0 {
            return Err(SurgeError::ConfigError(
                "surge_cycle_trip_count must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Speed, power, head and temperature limits of the operating envelope.
/// `None` means the limit is not configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_head: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discharge_temperature: Option<f64>,
}

impl EnvelopeLimits {
    /// Check every configured value is finite and that min/max pairs are ordered.
    pub fn validate(&self) -> SurgeResult<()> {
        let all = [
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
            ("rated_speed", self.rated_speed),
            ("max_power", self.max_power),
            ("min_power", self.min_power),
            ("max_head", self.max_head),
            ("max_discharge_temperature", self.max_discharge_temperature),
        ];
        for (name, value) in all {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(SurgeError::ConfigError(format!(
                        "{name} must be finite, got {v}"
                    )));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_speed, self.max_speed) {
            if lo > hi {
                return Err(SurgeError::ConfigError(format!(
                    "min_speed ({lo}) exceeds max_speed ({hi})"
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_power, self.max_power) {
            if lo > hi {
                return Err(SurgeError::ConfigError(format!(
                    "min_power ({lo}) exceeds max_power ({hi})"
                )));
            }
        }
        Ok(())
    }
}

/// Rotor dynamics and sequencing parameters of the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// rpm/s
    #[serde(default = "default_acceleration_rate")]
    pub acceleration_rate: f64,
    /// rpm/s
    #[serde(default = "default_deceleration_rate")]
    pub deceleration_rate: f64,
    /// Speed tolerance for startup completion (rpm).
    #[serde(default = "default_speed_tolerance")]
    pub speed_tolerance: f64,
    /// Time with positive surge margin before leaving surge protection (s).
    #[serde(default = "default_surge_exit_delay")]
    pub surge_exit_delay: f64,
    /// Duration of the depressurizing phase after shutdown (s).
    #[serde(default = "default_depressurize_time")]
    pub depressurize_time: f64,
    #[serde(default = "default_stopped_speed_threshold")]
    pub stopped_speed_threshold: f64,
    /// Surge margin at or below which an approach warning is raised.
    #[serde(default = "default_surge_warning_threshold")]
    pub surge_warning_threshold: f64,
    /// Surge margin at or below which the approach becomes critical.
    #[serde(default = "default_surge_critical_threshold")]
    pub surge_critical_threshold: f64,
    /// Stonewall margin at or below which an approach warning is raised.
    #[serde(default = "default_stonewall_warning_threshold")]
    pub stonewall_warning_threshold: f64,
}

fn default_acceleration_rate() -> f64 {
    100.0
}
fn default_deceleration_rate() -> f64 {
    200.0
}
fn default_speed_tolerance() -> f64 {
    10.0
}
fn default_surge_exit_delay() -> f64 {
    5.0
}
fn default_depressurize_time() -> f64 {
    30.0
}
fn default_stopped_speed_threshold() -> f64 {
    crate::constants::STOPPED_SPEED_RPM
}
fn default_surge_warning_threshold() -> f64 {
    0.15
}
fn default_surge_critical_threshold() -> f64 {
    0.05
}
fn default_stonewall_warning_threshold() -> f64 {
    0.10
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            acceleration_rate: default_acceleration_rate(),
            deceleration_rate: default_deceleration_rate(),
            speed_tolerance: default_speed_tolerance(),
            surge_exit_delay: default_surge_exit_delay(),
            depressurize_time: default_depressurize_time(),
            stopped_speed_threshold: default_stopped_speed_threshold(),
            surge_warning_threshold: default_surge_warning_threshold(),
            surge_critical_threshold: default_surge_critical_threshold(),
            stonewall_warning_threshold: default_stonewall_warning_threshold(),
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> SurgeResult<()> {
        if !(self.acceleration_rate.is_finite() && self.acceleration_rate > 0.0)
            || !(self.deceleration_rate.is_finite() && self.deceleration_rate > 0.0)
        {
            return Err(SurgeError::ConfigError(
                "acceleration and deceleration rates must be finite and > 0".to_string(),
            ));
        }
        let non_negative = [
            ("speed_tolerance", self.speed_tolerance),
            ("surge_exit_delay", self.surge_exit_delay),
            ("depressurize_time", self.depressurize_time),
            ("stopped_speed_threshold", self.stopped_speed_threshold),
            ("surge_warning_threshold", self.surge_warning_threshold),
            ("surge_critical_threshold", self.surge_critical_threshold),
            ("stonewall_warning_threshold", self.stonewall_warning_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SurgeError::ConfigError(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if self.surge_critical_threshold > self.surge_warning_threshold {
            return Err(SurgeError::ConfigError(format!(
                "surge_critical_threshold ({}) exceeds surge_warning_threshold ({})",
                self.surge_critical_threshold, self.surge_warning_threshold
            )));
        }
        Ok(())
    }
}

/// Ramp rates and durations used to generate shutdown trajectories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownRates {
    /// rpm/s
    #[serde(default = "default_normal_ramp_rate")]
    pub normal_ramp_rate: f64,
    /// rpm/s
    #[serde(default = "default_rapid_ramp_rate")]
    pub rapid_ramp_rate: f64,
    /// rpm/s
    #[serde(default = "default_emergency_ramp_rate")]
    pub emergency_ramp_rate: f64,
    /// Time for an unpowered rotor to come to rest (s).
    #[serde(default = "default_coastdown_time")]
    pub coastdown_time: f64,
    /// Hold at speed while the recycle valve opens, normal shutdown (s).
    #[serde(default = "default_unload_time")]
    pub unload_time: f64,
    /// Hold at speed while the recycle valve opens, rapid shutdown (s).
    #[serde(default = "default_rapid_unload_time")]
    pub rapid_unload_time: f64,
}

fn default_normal_ramp_rate() -> f64 {
    100.0
}
fn default_rapid_ramp_rate() -> f64 {
    300.0
}
fn default_emergency_ramp_rate() -> f64 {
    1000.0
}
fn default_coastdown_time() -> f64 {
    120.0
}
fn default_unload_time() -> f64 {
    10.0
}
fn default_rapid_unload_time() -> f64 {
    2.0
}

impl Default for ShutdownRates {
    fn default() -> Self {
        ShutdownRates {
            normal_ramp_rate: default_normal_ramp_rate(),
            rapid_ramp_rate: default_rapid_ramp_rate(),
            emergency_ramp_rate: default_emergency_ramp_rate(),
            coastdown_time: default_coastdown_time(),
            unload_time: default_unload_time(),
            rapid_unload_time: default_rapid_unload_time(),
        }
    }
}

impl ShutdownRates {
    pub fn validate(&self) -> SurgeResult<()> {
        let positive = [
            ("normal_ramp_rate", self.normal_ramp_rate),
            ("rapid_ramp_rate", self.rapid_ramp_rate),
            ("emergency_ramp_rate", self.emergency_ramp_rate),
            ("coastdown_time", self.coastdown_time),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SurgeError::ConfigError(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        if !(self.unload_time.is_finite() && self.unload_time >= 0.0)
            || !(self.rapid_unload_time.is_finite() && self.rapid_unload_time >= 0.0)
        {
            return Err(SurgeError::ConfigError(
                "unload times must be finite and >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Speed target of a startup step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTarget {
    /// Fixed speed (rpm).
    Fixed(f64),
    /// Ramp to the final operating speed given at start.
    RampToFinal,
}

impl SpeedTarget {
    pub fn resolve(self, final_speed: f64) -> f64 {
        match self {
            SpeedTarget::Fixed(speed) => speed,
            SpeedTarget::RampToFinal => final_speed,
        }
    }
}

/// One point of a startup sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupStep {
    /// Time since start command (s).
    pub time: f64,
    pub target: SpeedTarget,
    /// Time the target is held before ramping on (s).
    #[serde(default)]
    pub hold: f64,
    pub description: String,
}

impl StartupStep {
    pub fn new(time: f64, target: SpeedTarget, hold: f64, description: &str) -> Self {
        StartupStep {
            time,
            target,
            hold,
            description: description.to_string(),
        }
    }
}
