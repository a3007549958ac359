//! Scenario 1 (spec §8): boundary census on the 20-plate baseline, plus the
//! universal "exactly three boundary types" and "30 boundaries at
//! subdivision 0" boundary laws.

use planet_core::boundary::BoundaryType;
use planet_core::{PlanetEngine, SimulationParameters};

fn baseline_params() -> SimulationParameters {
    SimulationParameters {
        seed: 12345,
        subdivision_level: 0,
        render_subdivision_level: 0,
        lloyd_iterations: 0,
        ..Default::default()
    }
}

#[test]
fn icosahedron_dual_has_thirty_boundaries_at_subdivision_zero() {
    let engine = PlanetEngine::new(baseline_params());
    assert_eq!(engine.boundaries().len(), 30);
}

#[test]
fn boundary_count_is_stable_across_five_steps_and_deterministic() {
    let mut a = PlanetEngine::new(baseline_params());
    let mut b = PlanetEngine::new(baseline_params());
    a.advance_steps(5).unwrap();
    b.advance_steps(5).unwrap();

    assert_eq!(a.boundaries().len(), 30);
    assert_eq!(a.boundaries().len(), b.boundaries().len());

    let has_divergent = a.boundaries().values().any(|bd| bd.boundary_type == BoundaryType::Divergent);
    let has_convergent = a.boundaries().values().any(|bd| bd.boundary_type == BoundaryType::Convergent);
    assert!(has_divergent, "a 20-plate icosahedral dual should have at least one divergent boundary");
    assert!(has_convergent, "a 20-plate icosahedral dual should have at least one convergent boundary");
}

#[test]
fn every_boundary_falls_into_exactly_one_of_three_types() {
    let mut engine = PlanetEngine::new(baseline_params());
    engine.advance_steps(5).unwrap();
    for boundary in engine.boundaries().values() {
        assert!(matches!(boundary.boundary_type, BoundaryType::Divergent | BoundaryType::Convergent | BoundaryType::Transform));
    }
}
