// ─────────────────────────────────────────────────────────────────────
// SCPN Surge Control — Property-Based Tests (proptest) for surge-control
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for surge-control using proptest.
//!
//! Covers: valve bounds and slew limit, surge-cycle counting, profile
//! monotonicity, envelope aggregation.

use proptest::prelude::*;
use surge_control::antisurge::AntiSurgeController;
use surge_control::envelope::{EnvelopeBoundary, OperatingEnvelope, OperatingQuery};
use surge_control::history::{OperatingHistoryRecorder, OperatingRecord};
use surge_control::profile::{ShutdownProfile, ShutdownType, StartupProfile};
use surge_map::boundary::SplineBoundaryCurve;
use surge_types::config::{AntiSurgeConfig, ControlStrategy, EnvelopeLimits, ShutdownRates};
use surge_types::state::MachineState;

fn strategy() -> impl Strategy<Value = ControlStrategy> {
    prop_oneof![
        Just(ControlStrategy::OnOff),
        Just(ControlStrategy::Proportional),
        Just(ControlStrategy::Pid),
        Just(ControlStrategy::Predictive),
        Just(ControlStrategy::DualLoop),
    ]
}

fn shutdown_type() -> impl Strategy<Value = ShutdownType> {
    prop_oneof![
        Just(ShutdownType::Normal),
        Just(ShutdownType::Rapid),
        Just(ShutdownType::Emergency),
        Just(ShutdownType::Coastdown),
    ]
}

// ── Anti-surge controller ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valve_stays_in_unit_interval(
        strategy in strategy(),
        margins in prop::collection::vec(-1.0f64..1.0, 1..80),
        dt in 0.01f64..5.0,
        response_time in 0.0f64..3.0,
    ) {
        let mut c = AntiSurgeController::new(AntiSurgeConfig {
            strategy,
            valve_response_time: response_time,
            ..AntiSurgeConfig::default()
        }).unwrap();
        for m in margins {
            let v = c.update(m, dt).unwrap();
            prop_assert!((0.0..=1.0).contains(&v), "valve {v} out of range");
            prop_assert!((0.0..=1.0).contains(&c.target_valve_position()));
        }
    }

    #[test]
    fn valve_moves_at_most_rate_times_dt(
        strategy in strategy(),
        margins in prop::collection::vec(-1.0f64..1.0, 1..80),
        dt in 0.01f64..2.0,
        rate in 0.01f64..1.0,
    ) {
        let mut c = AntiSurgeController::new(AntiSurgeConfig {
            strategy,
            valve_rate_limit: rate,
            ..AntiSurgeConfig::default()
        }).unwrap();
        let mut prev = c.valve_position();
        for m in margins {
            let v = c.update(m, dt).unwrap();
            prop_assert!((v - prev).abs() <= rate * dt + 1e-12,
                "step {} exceeds {}", (v - prev).abs(), rate * dt);
            prev = v;
        }
    }

    #[test]
    fn surge_entries_counted_exactly(
        entries in 1u32..8,
        threshold in 1u32..8,
        dwell in 1usize..4,
    ) {
        let mut c = AntiSurgeController::new(AntiSurgeConfig {
            surge_cycle_trip_count: threshold,
            ..AntiSurgeConfig::default()
        }).unwrap();
        for i in 0..entries {
            for _ in 0..dwell {
                c.update(-0.05, 0.1).unwrap();
            }
            prop_assert_eq!(c.surge_cycle_count(), i + 1);
            prop_assert_eq!(c.should_trip(), i + 1 >= threshold);
            for _ in 0..dwell {
                c.update(0.2, 0.1).unwrap();
            }
        }
        prop_assert_eq!(c.surge_cycle_count(), entries);
    }
}

// ── Profiles ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn startup_target_bounded_and_final(
        final_speed in 3500.0f64..15000.0,
        t in -10.0f64..400.0,
    ) {
        let p = StartupProfile::default();
        let target = p.target_speed_at(t, final_speed);
        prop_assert!(target >= 0.0 && target <= final_speed + 1e-9, "target {target}");
        if t >= p.total_duration() {
            prop_assert_eq!(target, final_speed);
        }
    }

    #[test]
    fn shutdown_target_never_rises(
        kind in shutdown_type(),
        start in 0.0f64..15000.0,
        times in prop::collection::vec(0.0f64..200.0, 2..40),
    ) {
        let p = ShutdownProfile::new(kind, start, &ShutdownRates::default()).unwrap();
        let mut times = times;
        times.sort_by(f64::total_cmp);
        let mut prev = p.target_speed_at(0.0);
        prop_assert_eq!(prev, start);
        for t in times {
            let s = p.target_speed_at(t);
            prop_assert!(s <= prev + 1e-9, "speed rose from {prev} to {s} at t={t}");
            prop_assert!(s >= 0.0);
            prev = s;
        }
        prop_assert_eq!(p.target_speed_at(p.total_duration() + 1.0), 0.0);
    }
}

// ── Envelope and history ─────────────────────────────────────────────

fn envelope() -> OperatingEnvelope {
    let head = [60.0, 90.0, 130.0, 180.0];
    let surge = SplineBoundaryCurve::surge(&[3000.0, 4000.0, 5000.0, 6000.0], &head).unwrap();
    let stonewall =
        SplineBoundaryCurve::stonewall(&[7000.0, 8500.0, 10000.0, 11500.0], &head).unwrap();
    OperatingEnvelope::new(EnvelopeLimits {
        min_speed: Some(6000.0),
        max_speed: Some(12000.0),
        max_power: Some(15000.0),
        min_power: Some(500.0),
        max_head: Some(200.0),
        ..EnvelopeLimits::default()
    })
    .unwrap()
    .with_surge(EnvelopeBoundary::Points(surge))
    .unwrap()
    .with_stonewall(EnvelopeBoundary::Points(stonewall))
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn limiting_constraint_is_minimum(
        flow in 1000.0f64..14000.0,
        head in 40.0f64..220.0,
        speed in 4000.0f64..14000.0,
        power in 0.0f64..20000.0,
    ) {
        let env = envelope();
        let q = OperatingQuery { power: Some(power), ..OperatingQuery::new(flow, head, speed) };
        let margins = env.margins(&q);
        let worst = env.limiting_constraint(&q).unwrap();
        prop_assert!(margins.iter().all(|c| worst.margin <= c.margin));
        prop_assert_eq!(env.is_within_envelope(&q), worst.margin >= 0.0);
        prop_assert_eq!(env.violation(&q).is_some(), worst.margin < 0.0);
        let d = env.distance_to_envelope(&q).unwrap();
        prop_assert!(d >= worst.margin);
    }

    #[test]
    fn history_counts_surge_crossings(margins in prop::collection::vec(-0.5f64..0.5, 1..60)) {
        let mut h = OperatingHistoryRecorder::new();
        let mut expected = 0u32;
        let mut prev = 0.0f64;
        for (i, &m) in margins.iter().enumerate() {
            if m < 0.0 && (i == 0 || prev >= 0.0) {
                expected += 1;
            }
            prev = m;
            h.record(OperatingRecord {
                time: i as f64,
                flow: 5000.0,
                head: 100.0,
                speed: 9000.0,
                power: 1000.0,
                efficiency: 0.75,
                surge_margin: m,
                stonewall_margin: 0.3,
                state: MachineState::Running,
                inlet_pressure: 20.0,
                outlet_pressure: 50.0,
                inlet_temperature: 300.0,
                outlet_temperature: 380.0,
            }).unwrap();
        }
        prop_assert_eq!(h.summary().surge_events, expected);
        prop_assert_eq!(h.summary().samples, margins.len());
    }
}
