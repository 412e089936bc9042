// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Map Library
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Compressor performance maps and boundary curves.

pub mod boundary;
pub mod corrections;
pub mod curve;
pub mod dimensionless;
pub mod map;
pub mod molecular;
