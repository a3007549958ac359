//! Scenario 2 (spec §8): switching the render LOD mid-simulation preserves
//! plate count, clock, centroids, and per-boundary stress, and the triangle
//! count matches the requested subdivision level exactly.

use planet_core::icosphere::IcosphereMesh;
use planet_core::{PlanetEngine, SimulationParameters};

fn params() -> SimulationParameters {
    SimulationParameters { seed: 12345, subdivision_level: 0, render_subdivision_level: 2, ..Default::default() }
}

#[test]
fn switching_lod_preserves_simulation_state_and_resizes_the_mesh() {
    let mut engine = PlanetEngine::new(params());
    engine.advance_steps(10).unwrap();

    let plate_count_before = engine.plates().len();
    let time_before = engine.current_time_my();
    let centroids_before: Vec<_> = engine.plates().iter().map(|p| p.centroid).collect();
    let stress_before: Vec<(u32, u32, f64)> =
        engine.boundaries().iter().map(|(&(a, b), bd)| (a, b, bd.accumulated_stress_mpa)).collect();

    engine.set_render_subdivision_level(4).unwrap();

    assert_eq!(engine.mesh().faces.len(), IcosphereMesh::expected_face_count(4));
    assert_eq!(engine.mesh().faces.len(), 5120);
    assert_eq!(engine.plates().len(), plate_count_before);
    assert_eq!(engine.current_time_my(), time_before);
    for (before, plate) in centroids_before.iter().zip(engine.plates().iter()) {
        assert_eq!(before.x, plate.centroid.x);
        assert_eq!(before.y, plate.centroid.y);
        assert_eq!(before.z, plate.centroid.z);
    }
    for (a, b, stress) in &stress_before {
        let after = engine.boundaries().get(&(*a, *b)).expect("boundary keys are LOD-independent").accumulated_stress_mpa;
        assert!((after - stress).abs() < 1e-9);
    }

    engine.set_render_subdivision_level(2).unwrap();
    assert_eq!(engine.mesh().faces.len(), IcosphereMesh::expected_face_count(2));

    // The simulation must remain continuable after the round trip.
    engine.advance_steps(1).unwrap();
    assert!(engine.current_time_my() > time_before);
}
