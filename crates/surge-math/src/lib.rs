//! Numerical primitives for SCPN Surge Control.

pub mod interp;
pub mod polyfit;
pub mod spline;
pub mod tridiag;
