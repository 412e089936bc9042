// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Universal gas constant (J/(kmol·K)).
pub const R_UNIVERSAL: f64 = 8314.462618;

/// Standard gravity (m/s²), used to convert head in metres to kJ/kg.
pub const G_STANDARD: f64 = 9.80665;

/// Seconds per hour. Chart flows are in m³/h.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Seconds per minute. Chart speeds are in rpm.
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Speed below which the rotor is considered stopped (rpm).
pub const STOPPED_SPEED_RPM: f64 = 10.0;

/// Fraction of the shutdown profile that must elapse before shutdown can complete.
pub const SHUTDOWN_COMPLETE_FRACTION: f64 = 0.9;

/// Valve position band outside which the PID integrator is frozen.
pub const ANTI_WINDUP_LOW: f64 = 0.01;
pub const ANTI_WINDUP_HIGH: f64 = 0.99;
