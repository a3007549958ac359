//! Scenario 4 (spec §8): hotspot generation is deterministic from the seed
//! and hotspots drift over time.

use planet_core::sphere::great_circle_distance_rad;
use planet_core::{PlanetEngine, SimulationParameters};

fn params() -> SimulationParameters {
    SimulationParameters {
        seed: 42,
        enable_hotspots: true,
        major_hotspot_count: 3,
        minor_hotspot_count: 5,
        hotspot_drift_speed: 0.01,
        ..Default::default()
    }
}

#[test]
fn hotspot_count_and_unit_length_on_reset() {
    let engine = PlanetEngine::new(params());
    assert_eq!(engine.hotspots().len(), 8);
    for hotspot in engine.hotspots() {
        assert!((hotspot.position.length() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn reseeding_with_same_parameters_reproduces_positions() {
    let a = PlanetEngine::new(params());
    let b = PlanetEngine::new(params());
    assert_eq!(a.hotspots().len(), b.hotspots().len());
    for (ha, hb) in a.hotspots().iter().zip(b.hotspots().iter()) {
        assert!(great_circle_distance_rad(ha.position, hb.position) < 1e-3);
    }
}

#[test]
fn hotspots_drift_after_advancing() {
    let mut engine = PlanetEngine::new(params());
    let before: Vec<_> = engine.hotspots().iter().map(|h| h.position).collect();
    engine.advance_steps(10).unwrap();
    let after: Vec<_> = engine.hotspots().iter().map(|h| h.position).collect();

    let total_displacement: f64 = before.iter().zip(after.iter()).map(|(p, q)| great_circle_distance_rad(*p, *q)).sum();
    let average_displacement = total_displacement / before.len() as f64;
    assert!(average_displacement > 0.0, "hotspots should have drifted after 10 steps");
}
