// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Compressor State Machine
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Machine state sequencing.
//!
//! Commands (`start`, `stop`, `trip`, `acknowledge_trip`) change state
//! immediately; `update` advances rotor speed and performs the
//! condition-driven transitions. Every transition is kept in an audit
//! log with the time and reason, every raised alarm or sequence
//! milestone in an event log.

use crate::alarm::{AlarmMonitor, AlarmSample, AlarmThresholds, EventRecord, MachineEvent};
use crate::profile::{ShutdownProfile, ShutdownType, StartupProfile};
use serde::{Deserialize, Serialize};
use surge_types::config::{CompressorConfig, EnvelopeLimits, MachineConfig, ShutdownRates};
use surge_types::constants::SECONDS_PER_HOUR;
use surge_types::error::{require_positive_dt, SurgeError, SurgeResult};
use surge_types::state::MachineState;
use tracing::{info, warn};

/// One entry of the transition audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub time: f64,
    pub from: MachineState,
    pub to: MachineState,
    pub reason: String,
}

/// Per-tick input from the process driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineInput {
    pub dt: f64,
    pub surge_margin: f64,
    /// Protective trip condition, e.g. surge cycle limit reached.
    pub trip_requested: bool,
    /// Driver or mechanical speed ceiling (rpm).
    pub speed_ceiling: Option<f64>,
    /// New operating speed setpoint (rpm). Keeps the last one when `None`.
    pub requested_speed: Option<f64>,
    pub stonewall_margin: Option<f64>,
    /// Shaft power (kW) checked against the power limit.
    pub power: Option<f64>,
}

impl MachineInput {
    pub fn new(dt: f64, surge_margin: f64) -> Self {
        MachineInput {
            dt,
            surge_margin,
            trip_requested: false,
            speed_ceiling: None,
            requested_speed: None,
            stonewall_margin: None,
            power: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MachineOutput {
    pub state: MachineState,
    pub speed: f64,
    pub target_speed: f64,
    pub phase: String,
    /// The sequence needs the anti-surge valve fully open.
    pub valve_open_request: bool,
    /// Events raised during this tick.
    pub events: Vec<MachineEvent>,
}

#[derive(Debug, Clone)]
pub struct CompressorStateMachine {
    config: MachineConfig,
    startup: StartupProfile,
    shutdown_rates: ShutdownRates,
    shutdown: Option<ShutdownProfile>,
    state: MachineState,
    speed: f64,
    target_speed: f64,
    operating_speed: f64,
    clock: f64,
    state_entered_at: f64,
    positive_margin_time: f64,
    operating_hours: f64,
    speed_limit: Option<f64>,
    alarms: AlarmMonitor,
    transitions: Vec<StateTransition>,
    events: Vec<EventRecord>,
    pending: Vec<MachineEvent>,
}

impl CompressorStateMachine {
    pub fn new(
        config: MachineConfig,
        startup: StartupProfile,
        shutdown_rates: ShutdownRates,
    ) -> SurgeResult<Self> {
        config.validate()?;
        shutdown_rates.validate()?;
        let alarms = AlarmMonitor::new(AlarmThresholds::new(&config, &EnvelopeLimits::default()));
        Ok(CompressorStateMachine {
            config,
            startup,
            shutdown_rates,
            shutdown: None,
            state: MachineState::Stopped,
            speed: 0.0,
            target_speed: 0.0,
            operating_speed: 0.0,
            clock: 0.0,
            state_entered_at: 0.0,
            positive_margin_time: 0.0,
            operating_hours: 0.0,
            speed_limit: None,
            alarms,
            transitions: Vec::new(),
            events: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// Speed and power limits for the alarm checks. A maximum speed also
    /// caps the operating speed, as a speed ceiling does.
    pub fn with_limits(mut self, limits: &EnvelopeLimits) -> SurgeResult<Self> {
        limits.validate()?;
        self.alarms
            .set_thresholds(AlarmThresholds::new(&self.config, limits));
        self.speed_limit = limits.max_speed;
        Ok(self)
    }

    pub fn from_config(config: &CompressorConfig) -> SurgeResult<Self> {
        let startup = match &config.startup {
            Some(steps) => StartupProfile::from_steps(steps.clone(), true)?,
            None => StartupProfile::default(),
        };
        Self::new(config.machine.clone(), startup, config.shutdown.clone())?
            .with_limits(&config.limits)
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// Operating setpoint the startup ramps to and running tracks.
    pub fn operating_speed(&self) -> f64 {
        self.operating_speed
    }

    /// Seconds of `update` time since construction.
    pub fn elapsed(&self) -> f64 {
        self.clock
    }

    pub fn time_in_state(&self) -> f64 {
        self.clock - self.state_entered_at
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Alarms and sequence milestones, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn alarms(&self) -> &AlarmMonitor {
        &self.alarms
    }

    /// Hours accumulated in operational states.
    pub fn operating_hours(&self) -> f64 {
        self.operating_hours
    }

    /// Restore the hour counter, e.g. from a maintenance record.
    pub fn set_operating_hours(&mut self, hours: f64) -> SurgeResult<()> {
        if !(hours.is_finite() && hours >= 0.0) {
            return Err(SurgeError::InvalidInput(format!(
                "operating hours must be finite and >= 0, got {hours}"
            )));
        }
        self.operating_hours = hours;
        Ok(())
    }

    pub fn startup_profile(&self) -> &StartupProfile {
        &self.startup
    }

    pub fn shutdown_profile(&self) -> Option<&ShutdownProfile> {
        self.shutdown.as_ref()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    fn transition(&mut self, to: MachineState, reason: &str) {
        if to == self.state {
            return;
        }
        info!(
            time = self.clock,
            from = %self.state,
            to = %to,
            speed = self.speed,
            reason,
            "machine state transition"
        );
        self.transitions.push(StateTransition {
            time: self.clock,
            from: self.state,
            to,
            reason: reason.to_string(),
        });
        self.state = to;
        self.state_entered_at = self.clock;
        self.positive_margin_time = 0.0;
    }

    fn raise(&mut self, event: MachineEvent) {
        self.events.push(EventRecord {
            time: self.clock,
            event,
        });
        self.pending.push(event);
    }

    /// Start command toward `operating_speed` (rpm).
    pub fn start(&mut self, operating_speed: f64) -> SurgeResult<()> {
        if !self.state.can_start() {
            return Err(SurgeError::Precondition(format!(
                "cannot start from state {}",
                self.state
            )));
        }
        if !(operating_speed.is_finite() && operating_speed > 0.0) {
            return Err(SurgeError::InvalidInput(format!(
                "operating speed must be finite and > 0, got {operating_speed}"
            )));
        }
        self.operating_speed = operating_speed;
        self.shutdown = None;
        self.transition(MachineState::Starting, "start command");
        Ok(())
    }

    /// Stop command. Builds the shutdown trajectory from the current speed.
    pub fn stop(&mut self, kind: ShutdownType) -> SurgeResult<()> {
        if !self.state.can_shutdown() {
            return Err(SurgeError::Precondition(format!(
                "cannot shut down from state {}",
                self.state
            )));
        }
        self.shutdown = Some(ShutdownProfile::new(kind, self.speed, &self.shutdown_rates)?);
        let reason = format!("{} shutdown command", kind.as_str());
        self.transition(MachineState::Shutdown, &reason);
        Ok(())
    }

    /// Protective trip: emergency deceleration, valve open, latched until
    /// acknowledged. Tripping an already tripped machine does nothing.
    pub fn trip(&mut self, reason: &str) -> SurgeResult<()> {
        if self.state == MachineState::Tripped {
            return Ok(());
        }
        self.shutdown = Some(ShutdownProfile::new(
            ShutdownType::Emergency,
            self.speed,
            &self.shutdown_rates,
        )?);
        warn!(reason, speed = self.speed, "compressor trip");
        self.transition(MachineState::Tripped, reason);
        Ok(())
    }

    pub fn emergency_shutdown(&mut self) -> SurgeResult<()> {
        self.trip("emergency shutdown")
    }

    /// Operator acknowledgment of a trip once the rotor has stopped.
    pub fn acknowledge_trip(&mut self) -> SurgeResult<()> {
        if self.state != MachineState::Tripped {
            return Err(SurgeError::Precondition(format!(
                "no trip to acknowledge in state {}",
                self.state
            )));
        }
        if self.speed >= self.config.stopped_speed_threshold {
            return Err(SurgeError::Precondition(format!(
                "rotor still turning at {:.1} rpm",
                self.speed
            )));
        }
        self.speed = 0.0;
        self.shutdown = None;
        self.transition(MachineState::Standby, "trip acknowledged");
        Ok(())
    }

    pub fn enter_standby(&mut self) -> SurgeResult<()> {
        if self.state != MachineState::Stopped {
            return Err(SurgeError::Precondition(format!(
                "standby is only reachable from Stopped, not {}",
                self.state
            )));
        }
        self.transition(MachineState::Standby, "standby command");
        Ok(())
    }

    /// Rate-limited approach of the rotor speed to `target`.
    fn approach(&self, target: f64, dt: f64) -> f64 {
        if target > self.speed {
            (self.speed + self.config.acceleration_rate * dt).min(target)
        } else {
            (self.speed - self.config.deceleration_rate * dt).max(target)
        }
    }

    fn active_shutdown(&self) -> SurgeResult<&ShutdownProfile> {
        self.shutdown.as_ref().ok_or_else(|| {
            SurgeError::Precondition(format!("no shutdown profile in state {}", self.state))
        })
    }

    /// Advance by one tick.
    pub fn update(&mut self, input: MachineInput) -> SurgeResult<MachineOutput> {
        require_positive_dt(input.dt)?;
        if !input.surge_margin.is_finite() {
            return Err(SurgeError::Precondition(format!(
                "surge margin must be finite, got {}",
                input.surge_margin
            )));
        }
        if let Some(requested) = input.requested_speed {
            if !(requested.is_finite() && requested >= 0.0) {
                return Err(SurgeError::InvalidInput(format!(
                    "requested speed must be finite and >= 0, got {requested}"
                )));
            }
            self.operating_speed = requested;
        }

        self.clock += input.dt;
        self.pending.clear();
        if self.state.is_operational() {
            self.operating_hours += input.dt / SECONDS_PER_HOUR;
        }
        if input.trip_requested {
            self.trip("surge cycle limit reached")?;
        }

        let dt = input.dt;
        let margin = input.surge_margin;
        let mut valve_open_request = false;

        match self.state {
            MachineState::Stopped | MachineState::Standby => {
                self.target_speed = 0.0;
                self.speed = self.approach(0.0, dt);
            }
            MachineState::Starting => {
                let elapsed = self.time_in_state();
                self.target_speed = self
                    .startup
                    .target_speed_at(elapsed, self.operating_speed);
                self.speed = self.approach(self.target_speed, dt);
                valve_open_request = self.startup.requires_antisurge_open();
                if self.startup.is_startup_complete(
                    elapsed,
                    self.speed,
                    self.operating_speed,
                    self.config.speed_tolerance,
                ) {
                    self.transition(MachineState::Running, "startup complete");
                    self.raise(MachineEvent::StartupComplete);
                }
            }
            MachineState::Running | MachineState::SurgeProtection | MachineState::SpeedLimited => {
                self.update_operational(margin, dt, input.speed_ceiling);
                valve_open_request = self.state == MachineState::SurgeProtection;
                let raised = self.alarms.check(&AlarmSample {
                    surge_margin: margin,
                    stonewall_margin: input.stonewall_margin,
                    speed: self.speed,
                    power: input.power,
                });
                for event in raised {
                    self.raise(event);
                }
            }
            MachineState::Shutdown => {
                let elapsed = self.time_in_state();
                let target = self.active_shutdown()?.target_speed_at(elapsed);
                self.target_speed = target;
                self.speed = target;
                let profile = self.active_shutdown()?;
                valve_open_request = profile.should_open_antisurge(elapsed);
                if profile.is_shutdown_complete(elapsed, self.speed) {
                    self.speed = 0.0;
                    self.target_speed = 0.0;
                    self.transition(MachineState::Depressurizing, "rotor stopped");
                }
            }
            MachineState::Depressurizing => {
                self.speed = 0.0;
                self.target_speed = 0.0;
                valve_open_request = true;
                if self.time_in_state() >= self.config.depressurize_time {
                    self.transition(MachineState::Stopped, "depressurized");
                    self.raise(MachineEvent::ShutdownComplete);
                }
            }
            MachineState::Tripped => {
                let elapsed = self.time_in_state();
                let target = self.active_shutdown()?.target_speed_at(elapsed);
                self.target_speed = target;
                self.speed = target;
                valve_open_request = true;
            }
        }

        if !self.state.is_operational() {
            self.alarms.rearm();
        }
        Ok(MachineOutput {
            state: self.state,
            speed: self.speed,
            target_speed: self.target_speed,
            phase: self.phase_description(),
            valve_open_request,
            events: self.pending.clone(),
        })
    }

    fn update_operational(&mut self, margin: f64, dt: f64, ceiling: Option<f64>) {
        if margin < 0.0 && self.state != MachineState::SurgeProtection {
            self.transition(MachineState::SurgeProtection, "surge event detected");
        } else if self.state == MachineState::SurgeProtection {
            if margin > 0.0 {
                self.positive_margin_time += dt;
                if self.positive_margin_time >= self.config.surge_exit_delay {
                    self.transition(MachineState::Running, "surge margin restored");
                }
            } else {
                self.positive_margin_time = 0.0;
            }
        }

        let requested = self.operating_speed;
        let ceiling = match (ceiling, self.speed_limit) {
            (Some(c), Some(max)) => Some(c.min(max)),
            (c, max) => c.or(max),
        };
        let limited = matches!(ceiling, Some(c) if requested >= c);
        match self.state {
            MachineState::Running if limited => {
                self.transition(MachineState::SpeedLimited, "speed ceiling reached");
            }
            MachineState::SpeedLimited if !limited => {
                self.transition(MachineState::Running, "speed demand below ceiling");
            }
            _ => {}
        }

        self.target_speed = match ceiling {
            Some(c) if limited => c,
            _ => requested,
        };
        self.speed = self.approach(self.target_speed, dt);
    }

    /// Human-readable phase for the current state.
    pub fn phase_description(&self) -> String {
        let elapsed = self.time_in_state();
        match (self.state, &self.shutdown) {
            (MachineState::Starting, _) => self.startup.phase_description(elapsed).to_string(),
            (MachineState::Shutdown | MachineState::Tripped, Some(profile)) => {
                profile.phase_description(elapsed).to_string()
            }
            (state, _) => state.as_str().to_string(),
        }
    }
}
