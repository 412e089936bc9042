// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Control Library
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surge protection: anti-surge control, machine sequencing, operating
//! envelope and history.

pub mod alarm;
pub mod antisurge;
pub mod constraints;
pub mod envelope;
pub mod history;
pub mod machine;
pub mod pid;
pub mod profile;
pub mod simulator;
