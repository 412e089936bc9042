// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating state of the compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    #[default]
    Stopped,
    Starting,
    Running,
    SurgeProtection,
    SpeedLimited,
    Shutdown,
    Depressurizing,
    Tripped,
    Standby,
}

impl MachineState {
    pub const ALL: [MachineState; 9] = [
        MachineState::Stopped,
        MachineState::Starting,
        MachineState::Running,
        MachineState::SurgeProtection,
        MachineState::SpeedLimited,
        MachineState::Shutdown,
        MachineState::Depressurizing,
        MachineState::Tripped,
        MachineState::Standby,
    ];

    /// A start command is accepted only from rest.
    pub fn can_start(self) -> bool {
        matches!(self, MachineState::Stopped | MachineState::Standby)
    }

    /// Compressor is delivering flow under load.
    pub fn is_operational(self) -> bool {
        matches!(
            self,
            MachineState::Running | MachineState::SurgeProtection | MachineState::SpeedLimited
        )
    }

    /// Speed follows a startup or shutdown trajectory.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            MachineState::Starting | MachineState::Shutdown | MachineState::Depressurizing
        )
    }

    pub fn requires_acknowledgment(self) -> bool {
        self == MachineState::Tripped
    }

    /// States from which a shutdown command is honoured.
    pub fn can_shutdown(self) -> bool {
        self.is_operational() || self == MachineState::Starting
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MachineState::Stopped => "Stopped",
            MachineState::Starting => "Starting",
            MachineState::Running => "Running",
            MachineState::SurgeProtection => "Surge Protection",
            MachineState::SpeedLimited => "Speed Limited",
            MachineState::Shutdown => "Shutdown",
            MachineState::Depressurizing => "Depressurizing",
            MachineState::Tripped => "Tripped",
            MachineState::Standby => "Standby",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flow, head and speed at which the compressor is evaluated.
/// Flow in m³/h (actual), head in kJ/kg, speed in rpm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub flow: f64,
    pub head: f64,
    pub speed: f64,
    /// kW
    pub power: f64,
    /// Polytropic efficiency, fraction.
    pub efficiency: f64,
}

impl OperatingPoint {
    pub fn is_finite(&self) -> bool {
        self.flow.is_finite()
            && self.head.is_finite()
            && self.speed.is_finite()
            && self.power.is_finite()
            && self.efficiency.is_finite()
    }
}
