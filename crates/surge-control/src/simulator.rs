// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Compressor Simulator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// ─────────────────────────────────────────────────────────────────────
//! Per-tick protection loop driven by an external process simulation.
//!
//! Each tick evaluates the map at the current rotor speed, measures the
//! margins against the envelope, steps the anti-surge controller while
//! the machine is operational and advances the state machine. The valve
//! handed back is the larger of the controller output and the sequence's
//! open request. In auto-speed mode the speed setpoint is solved from the
//! map for the head the process requires.

use crate::antisurge::AntiSurgeController;
use crate::constraints::{VALVE_CLOSED, VALVE_OPEN};
use crate::envelope::{ConstraintMargin, OperatingEnvelope, OperatingQuery};
use crate::history::{is_surging, OperatingHistoryRecorder, OperatingRecord};
use crate::machine::{CompressorStateMachine, MachineInput, MachineOutput};
use crate::profile::ShutdownType;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use surge_map::map::{PerformanceMap, PerformanceModel};
use surge_types::config::CompressorConfig;
use surge_types::constants::SECONDS_PER_HOUR;
use surge_types::error::{require_positive_dt, SurgeError, SurgeResult};
use surge_types::state::{MachineState, OperatingPoint};
use tracing::{debug, info};

/// Process conditions measured around the machine.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasuredConditions {
    /// bara
    pub inlet_pressure: f64,
    /// bara
    pub outlet_pressure: f64,
    /// K
    pub inlet_temperature: f64,
    /// K
    pub outlet_temperature: f64,
    /// Inlet density (kg/m³). Used for shaft power when none is measured.
    pub density: f64,
    /// Measured shaft power (kW).
    pub power: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    /// Simulation time at the end of the tick (s).
    pub time: f64,
    pub dt: f64,
    /// Actual inlet flow (m³/h).
    pub flow: f64,
    pub requested_speed: Option<f64>,
    pub speed_ceiling: Option<f64>,
    /// Head the process requires (kJ/kg). Drives the speed setpoint in
    /// auto-speed mode.
    pub required_head: Option<f64>,
    pub measured: MeasuredConditions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// Point evaluated at the rotor speed entering the tick.
    pub point: OperatingPoint,
    pub surge_margin: f64,
    pub stonewall_margin: Option<f64>,
    pub limiting: Option<ConstraintMargin>,
    pub controller_valve: f64,
    /// Valve position handed to the process.
    pub valve_position: f64,
    pub trip_requested: bool,
    pub machine: MachineOutput,
}

/// Run result metrics.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub steps: usize,
    pub duration_s: f64,
    pub wall_time_ms: f64,
    pub final_state: MachineState,
    pub min_surge_margin: f64,
    pub max_valve_position: f64,
    pub surge_events: u32,
    pub time_in_surge: f64,
    pub tripped: bool,
}

pub struct CompressorSimulator {
    model: Box<dyn PerformanceModel>,
    envelope: OperatingEnvelope,
    controller: AntiSurgeController,
    machine: CompressorStateMachine,
    recorder: Option<OperatingHistoryRecorder>,
    conditions: MeasuredConditions,
    auto_speed: bool,
    clock: f64,
}

impl CompressorSimulator {
    pub fn new(
        model: Box<dyn PerformanceModel>,
        envelope: OperatingEnvelope,
        controller: AntiSurgeController,
        machine: CompressorStateMachine,
    ) -> SurgeResult<Self> {
        if !envelope.has_surge() {
            return Err(SurgeError::ConfigError(
                "operating envelope needs a surge line".to_string(),
            ));
        }
        Ok(CompressorSimulator {
            model,
            envelope,
            controller,
            machine,
            recorder: None,
            conditions: MeasuredConditions::default(),
            auto_speed: false,
            clock: 0.0,
        })
    }

    /// Simulator around `map` with surge and stonewall lines generated
    /// from its reference curves.
    pub fn from_config(config: &CompressorConfig, map: PerformanceMap) -> SurgeResult<Self> {
        config.validate()?;
        let envelope = OperatingEnvelope::from_map(&map, config.limits.clone())?;
        let controller = AntiSurgeController::new(config.controller.clone())?;
        let machine = CompressorStateMachine::from_config(config)?;
        Self::new(Box::new(map), envelope, controller, machine)
    }

    pub fn with_recorder(mut self, recorder: OperatingHistoryRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Conditions used by [`run`](Self::run).
    pub fn set_conditions(&mut self, conditions: MeasuredConditions) {
        self.conditions = conditions;
    }

    pub fn auto_speed(&self) -> bool {
        self.auto_speed
    }

    /// Solve the speed setpoint from the map whenever a tick carries a
    /// required head and no explicit speed request.
    pub fn set_auto_speed(&mut self, enabled: bool) {
        self.auto_speed = enabled;
    }

    pub fn controller(&self) -> &AntiSurgeController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AntiSurgeController {
        &mut self.controller
    }

    pub fn machine(&self) -> &CompressorStateMachine {
        &self.machine
    }

    pub fn envelope(&self) -> &OperatingEnvelope {
        &self.envelope
    }

    pub fn model(&self) -> &dyn PerformanceModel {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn PerformanceModel {
        self.model.as_mut()
    }

    pub fn recorder(&self) -> Option<&OperatingHistoryRecorder> {
        self.recorder.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn start(&mut self, operating_speed: f64) -> SurgeResult<()> {
        self.machine.start(operating_speed)
    }

    pub fn stop(&mut self, kind: ShutdownType) -> SurgeResult<()> {
        self.machine.stop(kind)
    }

    /// Acknowledge a machine trip and clear the controller's latch.
    pub fn acknowledge_trip(&mut self) -> SurgeResult<()> {
        self.machine.acknowledge_trip()?;
        if self.controller.should_trip() {
            self.controller.acknowledge_trip()?;
        }
        Ok(())
    }

    fn evaluate(&self, flow: f64, speed: f64, measured: &MeasuredConditions) -> OperatingPoint {
        if speed <= self.machine.config().stopped_speed_threshold {
            return OperatingPoint {
                flow,
                speed,
                power: measured.power.unwrap_or(0.0),
                ..OperatingPoint::default()
            };
        }
        let head = self.model.head(flow, speed);
        let efficiency = self.model.efficiency(flow, speed);
        let power = match measured.power {
            Some(p) => p,
            None if efficiency > 0.0 => {
                measured.density * flow / SECONDS_PER_HOUR * head / efficiency
            }
            None => 0.0,
        };
        OperatingPoint {
            flow,
            head,
            speed,
            power,
            efficiency,
        }
    }

    /// Map speed for the required head, while the machine is operational.
    fn auto_speed_setpoint(&self, input: &TickInput) -> Option<f64> {
        if !self.auto_speed || !self.machine.state().is_operational() {
            return None;
        }
        let head = input.required_head.filter(|h| h.is_finite() && *h > 0.0)?;
        let speed = self.model.speed_for(input.flow, head);
        (speed.is_finite() && speed > 0.0).then_some(speed)
    }

    pub fn tick(&mut self, input: TickInput) -> SurgeResult<TickOutput> {
        require_positive_dt(input.dt)?;
        if !(input.flow.is_finite() && input.flow >= 0.0) {
            return Err(SurgeError::InvalidInput(format!(
                "flow must be finite and >= 0, got {}",
                input.flow
            )));
        }
        if !input.time.is_finite() || input.time < self.clock {
            return Err(SurgeError::Precondition(format!(
                "tick time {} precedes simulator time {}",
                input.time, self.clock
            )));
        }

        let m = &input.measured;
        let point = self.evaluate(input.flow, self.machine.speed(), m);
        let has_power = m.power.is_some() || m.density > 0.0;
        let query = OperatingQuery {
            flow: point.flow,
            head: point.head,
            speed: point.speed,
            power: has_power.then_some(point.power),
            discharge_temperature: (m.outlet_temperature > 0.0).then_some(m.outlet_temperature),
        };
        let surge_margin = self.envelope.surge_margin(&query).ok_or_else(|| {
            SurgeError::ConfigError("operating envelope has no surge line".to_string())
        })?;
        let stonewall_margin = self.envelope.stonewall_margin(&query);
        let limiting = self.envelope.limiting_constraint(&query);

        if self.machine.state().is_operational() {
            self.controller.update(surge_margin, input.dt)?;
        } else {
            self.controller.disengage();
        }
        let trip_requested = self.controller.should_trip();
        let auto_speed = self.auto_speed_setpoint(&input);

        let machine = self.machine.update(MachineInput {
            dt: input.dt,
            surge_margin,
            trip_requested,
            speed_ceiling: input.speed_ceiling,
            requested_speed: input.requested_speed.or(auto_speed),
            stonewall_margin,
            power: query.power,
        })?;

        let controller_valve = self.controller.valve_position();
        let valve_position = if machine.valve_open_request {
            VALVE_OPEN
        } else {
            controller_valve
        }
        .clamp(VALVE_CLOSED, VALVE_OPEN);

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(OperatingRecord {
                time: input.time,
                flow: point.flow,
                head: point.head,
                speed: point.speed,
                power: point.power,
                efficiency: point.efficiency,
                surge_margin,
                stonewall_margin: stonewall_margin.unwrap_or(f64::INFINITY),
                state: machine.state,
                inlet_pressure: m.inlet_pressure,
                outlet_pressure: m.outlet_pressure,
                inlet_temperature: m.inlet_temperature,
                outlet_temperature: m.outlet_temperature,
            })?;
        }
        self.clock = input.time;

        debug!(
            time = input.time,
            state = %machine.state,
            margin = surge_margin,
            valve = valve_position,
            "protection tick"
        );
        Ok(TickOutput {
            point,
            surge_margin,
            stonewall_margin,
            limiting,
            controller_valve,
            valve_position,
            trip_requested,
            machine,
        })
    }

    /// Run for `duration_s` with flow supplied per tick by `flow_at(time)`.
    pub fn run<F>(&mut self, duration_s: f64, dt: f64, mut flow_at: F) -> SurgeResult<SimulationReport>
    where
        F: FnMut(f64) -> f64,
    {
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(SurgeError::ConfigError(
                "duration_s must be finite and > 0".to_string(),
            ));
        }
        require_positive_dt(dt)?;

        let t_start = Instant::now();
        let steps = (duration_s / dt).round().max(1.0) as usize;
        let t0 = self.clock;
        let mut min_margin = f64::INFINITY;
        let mut max_valve: f64 = 0.0;
        let mut surge_events = 0u32;
        let mut time_in_surge = 0.0;
        let mut tripped = false;
        let mut was_in_surge = false;

        for step in 1..=steps {
            let time = t0 + step as f64 * dt;
            let out = self.tick(TickInput {
                time,
                dt,
                flow: flow_at(time),
                requested_speed: None,
                speed_ceiling: None,
                required_head: None,
                measured: self.conditions,
            })?;
            let operational = out.machine.state.is_operational();
            let in_surge = is_surging(out.machine.state, out.surge_margin);
            if in_surge {
                min_margin = min_margin.min(out.surge_margin);
                time_in_surge += dt;
                if !was_in_surge {
                    surge_events += 1;
                }
            } else if operational {
                min_margin = min_margin.min(out.surge_margin);
            }
            was_in_surge = in_surge;
            max_valve = max_valve.max(out.valve_position);
            tripped |= out.machine.state == MachineState::Tripped;
        }

        let report = SimulationReport {
            steps,
            duration_s,
            wall_time_ms: t_start.elapsed().as_secs_f64() * 1000.0,
            final_state: self.machine.state(),
            min_surge_margin: min_margin,
            max_valve_position: max_valve,
            surge_events,
            time_in_surge,
            tripped,
        };
        info!(
            steps,
            state = %report.final_state,
            surge_events,
            tripped,
            wall_time_ms = report.wall_time_ms,
            "simulation run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::MachineEvent;
    use surge_map::curve::ReferenceCurve;
    use surge_types::config::{
        AntiSurgeConfig, ControlStrategy, EnvelopeLimits, SpeedTarget, StartupStep,
    };

    fn map() -> PerformanceMap {
        let base_flow = [5000.0, 6000.0, 7000.0, 8000.0, 9000.0];
        let base_head = [120.0, 117.0, 111.0, 101.0, 86.0];
        let eff = [0.72, 0.77, 0.79, 0.77, 0.71];
        let curves = [8000.0, 10000.0, 12000.0]
            .iter()
            .map(|&n| {
                let r = n / 10000.0;
                let flow: Vec<f64> = base_flow.iter().map(|q| q * r).collect();
                let head: Vec<f64> = base_head.iter().map(|h| h * r * r).collect();
                ReferenceCurve::new(n, &flow, &head, &eff).unwrap()
            })
            .collect();
        PerformanceMap::new(curves).unwrap()
    }

    fn config() -> CompressorConfig {
        CompressorConfig {
            name: "test".to_string(),
            controller: AntiSurgeConfig {
                strategy: ControlStrategy::Proportional,
                valve_rate_limit: 0.0,
                ..AntiSurgeConfig::default()
            },
            limits: EnvelopeLimits::default(),
            machine: Default::default(),
            shutdown: Default::default(),
            startup: Some(vec![
                StartupStep::new(0.0, SpeedTarget::Fixed(0.0), 0.0, "go"),
                StartupStep::new(10.0, SpeedTarget::RampToFinal, 0.0, "ramp"),
            ]),
        }
    }

    fn simulator() -> CompressorSimulator {
        CompressorSimulator::from_config(&config(), map())
            .unwrap()
            .with_recorder(OperatingHistoryRecorder::new())
    }

    fn input(sim: &CompressorSimulator, flow: f64) -> TickInput {
        TickInput {
            time: sim.time() + 1.0,
            dt: 1.0,
            flow,
            requested_speed: None,
            speed_ceiling: None,
            required_head: None,
            measured: MeasuredConditions {
                density: 40.0,
                ..MeasuredConditions::default()
            },
        }
    }

    fn tick(sim: &mut CompressorSimulator, flow: f64) -> TickOutput {
        let input = input(sim, flow);
        sim.tick(input).unwrap()
    }

    fn running(sim: &mut CompressorSimulator) {
        sim.start(10000.0).unwrap();
        for _ in 0..200 {
            if tick(sim, 7000.0).machine.state == MachineState::Running {
                return;
            }
        }
        panic!("startup did not complete, state {}", sim.machine().state());
    }

    #[test]
    fn test_requires_surge_line() {
        let env = OperatingEnvelope::new(EnvelopeLimits::default()).unwrap();
        let controller = AntiSurgeController::new(AntiSurgeConfig::default()).unwrap();
        let machine = CompressorStateMachine::from_config(&config()).unwrap();
        assert!(CompressorSimulator::new(Box::new(map()), env, controller, machine).is_err());
    }

    #[test]
    fn test_valve_open_during_startup() {
        let mut sim = simulator();
        sim.start(10000.0).unwrap();
        let out = tick(&mut sim, 7000.0);
        assert_eq!(out.machine.state, MachineState::Starting);
        assert_eq!(out.valve_position, 1.0);
        assert_eq!(out.controller_valve, 0.0);
    }

    #[test]
    fn test_healthy_operation_keeps_valve_closed() {
        let mut sim = simulator();
        running(&mut sim);
        let out = tick(&mut sim, 7000.0);
        assert!(out.surge_margin > 0.2, "margin = {}", out.surge_margin);
        assert_eq!(out.valve_position, 0.0);
        assert!(out.point.power > 0.0);
        assert!(out.stonewall_margin.unwrap() > 0.0);
    }

    #[test]
    fn test_low_flow_opens_valve_and_protects() {
        let mut sim = simulator();
        running(&mut sim);
        tick(&mut sim, 7000.0);
        let out = tick(&mut sim, 4000.0);
        assert!(out.surge_margin < 0.0, "margin = {}", out.surge_margin);
        assert_eq!(out.controller_valve, 1.0);
        assert_eq!(out.machine.state, MachineState::SurgeProtection);
        assert!(sim.controller().is_in_surge());
        assert!(out
            .machine
            .events
            .iter()
            .any(|e| matches!(e, MachineEvent::SurgeOccurred { .. })));
    }

    #[test]
    fn test_auto_speed_solves_setpoint_from_head() {
        let mut sim = simulator();
        running(&mut sim);
        let head = map().head(7000.0, 11000.0);
        let manual = TickInput {
            required_head: Some(head),
            ..input(&sim, 7000.0)
        };
        let out = sim.tick(manual).unwrap();
        assert_eq!(out.machine.target_speed, 10000.0);

        sim.set_auto_speed(true);
        let auto = TickInput {
            required_head: Some(head),
            ..input(&sim, 7000.0)
        };
        let out = sim.tick(auto).unwrap();
        assert!((out.machine.target_speed - 11000.0).abs() < 1.0, "target = {}", out.machine.target_speed);

        // An explicit request wins over the solved speed.
        let explicit = TickInput {
            required_head: Some(head),
            requested_speed: Some(9000.0),
            ..input(&sim, 7000.0)
        };
        assert_eq!(sim.tick(explicit).unwrap().machine.target_speed, 9000.0);
    }

    #[test]
    fn test_controller_disengaged_outside_operation() {
        let mut sim = simulator();
        running(&mut sim);
        tick(&mut sim, 7000.0);
        assert!(sim.controller().last_margin().is_some());
        sim.stop(ShutdownType::Normal).unwrap();
        tick(&mut sim, 7000.0);
        assert_eq!(sim.controller().last_margin(), None);
    }

    #[test]
    fn test_repeated_surge_trips_and_acknowledges() {
        let mut sim = simulator();
        running(&mut sim);
        for _ in 0..3 {
            tick(&mut sim, 7000.0);
            tick(&mut sim, 4000.0);
        }
        assert!(sim.controller().should_trip());
        assert_eq!(sim.machine().state(), MachineState::Tripped);
        assert!(sim.acknowledge_trip().is_err());

        for _ in 0..15 {
            let out = tick(&mut sim, 0.0);
            assert_eq!(out.valve_position, 1.0);
        }
        sim.acknowledge_trip().unwrap();
        assert_eq!(sim.machine().state(), MachineState::Standby);
        assert!(!sim.controller().should_trip());

        // The third surge trips in the same tick and is recorded as Tripped.
        let summary = sim.recorder().unwrap().summary();
        assert_eq!(summary.surge_events, 2);
        assert!((summary.time_in_surge - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_reports_shutdown_cycle() {
        let mut sim = simulator();
        running(&mut sim);
        sim.set_conditions(MeasuredConditions {
            density: 40.0,
            ..MeasuredConditions::default()
        });
        let report = sim.run(20.0, 0.5, |_| 7000.0).unwrap();
        assert_eq!(report.steps, 40);
        assert_eq!(report.final_state, MachineState::Running);
        assert_eq!(report.surge_events, 0);
        assert!(!report.tripped);

        sim.stop(ShutdownType::Emergency).unwrap();
        let report = sim.run(60.0, 1.0, |_| 7000.0).unwrap();
        assert_eq!(report.final_state, MachineState::Stopped);
        assert_eq!(report.max_valve_position, 1.0);
        assert!(sim.run(0.0, 1.0, |_| 7000.0).is_err());
    }

    #[test]
    fn test_tick_validation() {
        let mut sim = simulator();
        let bad_flow = TickInput {
            time: 1.0,
            dt: 1.0,
            flow: f64::NAN,
            requested_speed: None,
            speed_ceiling: None,
            required_head: None,
            measured: MeasuredConditions::default(),
        };
        assert!(sim.tick(bad_flow).is_err());
        tick(&mut sim, 100.0);
        let backwards = TickInput {
            time: 0.5,
            flow: 100.0,
            ..bad_flow
        };
        assert!(matches!(sim.tick(backwards), Err(SurgeError::Precondition(_))));
    }
}
