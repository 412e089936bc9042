// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Dimensionless Map
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sound-speed corrected performance map.
//!
//! Reference curves measured with one gas are stored in corrected form:
//!
//! - flow:  `Q / 3600 / c / D²`
//! - head:  `H / c²`
//! - speed: machine Mach number `N / 60 · D / c`
//!
//! Queries for another gas map into corrected space with that gas's
//! sound speed and scale the head back by `c²`. Efficiency is taken
//! unchanged from the corrected map.

use crate::curve::ReferenceCurve;
use crate::map::{PerformanceMap, PerformanceModel, SpeedExtrapolation};
use crate::molecular::MolecularWeightSupport;
use serde::{Deserialize, Serialize};
use surge_types::constants::{R_UNIVERSAL, SECONDS_PER_HOUR, SECONDS_PER_MINUTE};
use surge_types::error::{SurgeError, SurgeResult};

/// Gas properties supplied by an external thermodynamic package.
pub trait FluidProperties {
    /// m/s
    fn sound_speed(&self) -> f64;
    /// kg/m³
    fn density(&self) -> f64;
    /// kg/kmol
    fn molar_mass(&self) -> f64;
    fn compressibility(&self) -> f64;
}

/// Fixed set of gas properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidState {
    pub sound_speed: f64,
    pub density: f64,
    pub molar_mass: f64,
    pub compressibility: f64,
}

impl FluidState {
    /// Real-gas state from isentropic exponent, temperature (K),
    /// molar mass (kg/kmol), compressibility and pressure (Pa).
    pub fn from_gas(kappa: f64, temperature: f64, molar_mass: f64, z: f64, pressure: f64) -> Self {
        let sound_speed =
            crate::corrections::sonic_velocity(kappa, temperature, molar_mass, z);
        let density = if z > 0.0 && temperature > 0.0 {
            pressure * molar_mass / (z * R_UNIVERSAL * temperature)
        } else {
            0.0
        };
        FluidState {
            sound_speed,
            density,
            molar_mass,
            compressibility: z,
        }
    }
}

impl FluidProperties for FluidState {
    fn sound_speed(&self) -> f64 {
        self.sound_speed
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    fn compressibility(&self) -> f64 {
        self.compressibility
    }
}

fn checked_sound_speed(fluid: &dyn FluidProperties) -> SurgeResult<f64> {
    let c = fluid.sound_speed();
    if !c.is_finite() || c <= 0.0 {
        return Err(SurgeError::InvalidInput(format!(
            "sound speed must be finite and > 0, got {c}"
        )));
    }
    Ok(c)
}

/// Performance map in Mach-corrected coordinates.
#[derive(Debug, Clone)]
pub struct DimensionlessMap {
    corrected: PerformanceMap,
    diameter: f64,
    reference_sound_speed: f64,
    operating_sound_speed: f64,
}

impl DimensionlessMap {
    pub fn new(
        curves: Vec<ReferenceCurve>,
        reference_fluid: &dyn FluidProperties,
        impeller_diameter: f64,
    ) -> SurgeResult<Self> {
        if !impeller_diameter.is_finite() || impeller_diameter <= 0.0 {
            return Err(SurgeError::InvalidInput(format!(
                "impeller diameter must be finite and > 0, got {impeller_diameter}"
            )));
        }
        let c = checked_sound_speed(reference_fluid)?;
        let d = impeller_diameter;
        let corrected_curves = curves
            .iter()
            .map(|curve| {
                curve.map_units(
                    |n| machine_mach(n, d, c),
                    |q| corrected_flow(q, d, c),
                    |h| h / (c * c),
                )
            })
            .collect::<SurgeResult<Vec<_>>>()?;
        let corrected = PerformanceMap::new(corrected_curves)?
            .with_speed_extrapolation(SpeedExtrapolation::Linear);
        Ok(DimensionlessMap {
            corrected,
            diameter: d,
            reference_sound_speed: c,
            operating_sound_speed: c,
        })
    }

    /// Switch queries to another gas.
    pub fn set_operating_fluid(&mut self, fluid: &dyn FluidProperties) -> SurgeResult<()> {
        self.operating_sound_speed = checked_sound_speed(fluid)?;
        Ok(())
    }

    pub fn reference_sound_speed(&self) -> f64 {
        self.reference_sound_speed
    }

    pub fn operating_sound_speed(&self) -> f64 {
        self.operating_sound_speed
    }

    pub fn impeller_diameter(&self) -> f64 {
        self.diameter
    }

    pub fn corrected_map(&self) -> &PerformanceMap {
        &self.corrected
    }

    pub fn head(&self, flow: f64, speed: f64) -> f64 {
        let c = self.operating_sound_speed;
        let d = self.diameter;
        self.corrected
            .head(corrected_flow(flow, d, c), machine_mach(speed, d, c))
            * c
            * c
    }

    pub fn efficiency(&self, flow: f64, speed: f64) -> f64 {
        let c = self.operating_sound_speed;
        let d = self.diameter;
        self.corrected
            .efficiency(corrected_flow(flow, d, c), machine_mach(speed, d, c))
    }
}

/// `Q / 3600 / c / D²` with Q in m³/h.
pub fn corrected_flow(flow: f64, diameter: f64, sound_speed: f64) -> f64 {
    flow / SECONDS_PER_HOUR / sound_speed / (diameter * diameter)
}

/// `N / 60 · D / c` with N in rpm.
pub fn machine_mach(speed: f64, diameter: f64, sound_speed: f64) -> f64 {
    speed / SECONDS_PER_MINUTE * diameter / sound_speed
}

impl PerformanceModel for DimensionlessMap {
    fn head(&self, flow: f64, speed: f64) -> f64 {
        DimensionlessMap::head(self, flow, speed)
    }

    fn efficiency(&self, flow: f64, speed: f64) -> f64 {
        DimensionlessMap::efficiency(self, flow, speed)
    }

    /// Reference speeds at the operating sound speed.
    fn speed_range(&self) -> (f64, f64) {
        let scale =
            SECONDS_PER_MINUTE * self.operating_sound_speed / self.diameter;
        (
            self.corrected.min_speed() * scale,
            self.corrected.max_speed() * scale,
        )
    }

    fn molecular_weight_support(&self) -> Option<&dyn MolecularWeightSupport> {
        None
    }

    fn molecular_weight_support_mut(&mut self) -> Option<&mut dyn MolecularWeightSupport> {
        None
    }
}
