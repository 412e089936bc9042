// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Curve Corrections
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Correction factors applied to compressor curves.
//!
//! Pure functions: Reynolds efficiency correction, Mach-limited
//! stonewall flow and the multistage surge shift at reduced speed.

use surge_types::constants::{R_UNIVERSAL, SECONDS_PER_MINUTE};

/// Exponent of the Reynolds-ratio efficiency correction.
pub const REYNOLDS_EXPONENT: f64 = 0.1;

/// Choke Mach number at the impeller eye.
pub const CHOKE_MACH: f64 = 0.95;

/// Bounds on the stonewall-to-design flow ratio.
pub const STONEWALL_RATIO_MIN: f64 = 1.05;
pub const STONEWALL_RATIO_MAX: f64 = 1.60;

/// Surge flow shift per additional stage per unit speed deficit.
pub const MULTISTAGE_FLOW_SHIFT: f64 = 0.03;

/// Surge head reduction per additional stage per unit speed deficit.
pub const MULTISTAGE_HEAD_SHIFT: f64 = 0.02;

/// Impeller tip speed (m/s).
pub fn tip_speed(speed_rpm: f64, diameter: f64) -> f64 {
    std::f64::consts::PI * diameter * speed_rpm / SECONDS_PER_MINUTE
}

/// Machine Reynolds number `u·D/ν`.
pub fn reynolds_number(tip_speed: f64, diameter: f64, kinematic_viscosity: f64) -> f64 {
    if kinematic_viscosity <= 0.0 {
        return 0.0;
    }
    tip_speed * diameter / kinematic_viscosity
}

/// Ideal-gas sound speed `sqrt(κ Z R T / M)` (m/s).
///
/// `molar_mass` in kg/kmol, `temperature` in K.
pub fn sonic_velocity(kappa: f64, temperature: f64, molar_mass: f64, z: f64) -> f64 {
    if molar_mass <= 0.0 {
        return 0.0;
    }
    (kappa * z * R_UNIVERSAL * temperature / molar_mass).max(0.0).sqrt()
}

pub fn mach_number(velocity: f64, sonic_velocity: f64) -> f64 {
    if sonic_velocity <= 0.0 {
        return 0.0;
    }
    velocity / sonic_velocity
}

/// Efficiency corrected from the reference to the actual Reynolds number.
///
/// `η = 1 − (1 − η_ref)·(Re_ref/Re)^0.1`, clamped to [0, 1]. Non-positive
/// Reynolds numbers leave the efficiency unchanged.
pub fn reynolds_efficiency_correction(efficiency: f64, reynolds: f64, reference: f64) -> f64 {
    if reynolds <= 0.0 || reference <= 0.0 {
        return efficiency;
    }
    let losses = (1.0 - efficiency) * (reference / reynolds).powf(REYNOLDS_EXPONENT);
    (1.0 - losses).clamp(0.0, 1.0)
}

/// Choke flow limited by the design Mach number.
pub fn stonewall_flow(design_flow: f64, design_mach: f64) -> f64 {
    if design_mach <= 0.0 {
        return design_flow * STONEWALL_RATIO_MAX;
    }
    let ratio = (CHOKE_MACH / design_mach).clamp(STONEWALL_RATIO_MIN, STONEWALL_RATIO_MAX);
    design_flow * ratio
}

fn speed_deficit(speed_ratio: f64, stages: u32) -> Option<f64> {
    if stages <= 1 || speed_ratio >= 1.0 {
        return None;
    }
    Some((1.0 - speed_ratio.max(0.0)) * (stages - 1) as f64)
}

/// Surge flow moved to higher flow below design speed on multistage
/// machines.
pub fn multistage_surge_correction(surge_flow: f64, speed_ratio: f64, stages: u32) -> f64 {
    match speed_deficit(speed_ratio, stages) {
        Some(d) => surge_flow * (1.0 + MULTISTAGE_FLOW_SHIFT * d),
        None => surge_flow,
    }
}

/// Surge head moved lower below design speed on multistage machines.
pub fn multistage_surge_head_correction(surge_head: f64, speed_ratio: f64, stages: u32) -> f64 {
    match speed_deficit(speed_ratio, stages) {
        Some(d) => surge_head * (1.0 - MULTISTAGE_HEAD_SHIFT * d).max(0.0),
        None => surge_head,
    }
}
