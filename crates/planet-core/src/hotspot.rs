//! Mantle hotspots: seeded positions that drift and contribute to the
//! thermal field and, indirectly, to stress (spec §4.8).

use crate::sphere::{rotate_about_axis, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotspotKind {
    Major,
    Minor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub hotspot_id: u32,
    pub kind: HotspotKind,
    pub position: Vec3,
    pub influence_radius_rad: f64,
    pub thermal_output: f64,
    drift_axis: Vec3,
}

impl Hotspot {
    #[cfg(test)]
    pub(crate) fn for_test(kind: HotspotKind, position: Vec3, influence_radius_rad: f64, thermal_output: f64) -> Self {
        Self { hotspot_id: 0, kind, position, influence_radius_rad, thermal_output, drift_axis: Vec3::new(0.0, 0.0, 1.0) }
    }
}

const MAJOR_RADIUS_RAD: f64 = 0.15;
const MINOR_RADIUS_RAD: f64 = 0.10;

/// Sample a uniformly-distributed direction on the unit sphere:
/// `θ = U(0, 2π)`, `φ = acos(2U − 1)`.
fn uniform_sphere_sample(rng: &mut StdRng) -> Vec3 {
    let theta = rng.gen_range(0.0..std::f64::consts::TAU);
    let u: f64 = rng.gen_range(-1.0..1.0);
    let phi = u.acos();
    Vec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
}

/// Generate hotspots deterministically. Seeded with `seed + 1000` so hotspot
/// placement is decorrelated from plate generation (which uses `seed` for its
/// crust-type shuffle and `seed + 1` for Euler poles) while staying a pure
/// function of the simulation seed.
pub fn generate_hotspots(
    major_count: u32,
    minor_count: u32,
    major_thermal_output: f64,
    minor_thermal_output: f64,
    seed: u64,
) -> Vec<Hotspot> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1000));
    let mut hotspots = Vec::with_capacity((major_count + minor_count) as usize);
    let mut next_id = 0u32;

    for _ in 0..major_count {
        hotspots.push(Hotspot {
            hotspot_id: next_id,
            kind: HotspotKind::Major,
            position: uniform_sphere_sample(&mut rng),
            influence_radius_rad: MAJOR_RADIUS_RAD,
            thermal_output: major_thermal_output,
            drift_axis: uniform_sphere_sample(&mut rng),
        });
        next_id += 1;
    }
    for _ in 0..minor_count {
        hotspots.push(Hotspot {
            hotspot_id: next_id,
            kind: HotspotKind::Minor,
            position: uniform_sphere_sample(&mut rng),
            influence_radius_rad: MINOR_RADIUS_RAD,
            thermal_output: minor_thermal_output,
            drift_axis: uniform_sphere_sample(&mut rng),
        });
        next_id += 1;
    }
    hotspots
}

/// Drift a hotspot along its (fixed, per-hotspot) drift axis by
/// `drift_speed · delta_my` radians, via Rodrigues rotation.
pub fn update_drift(hotspot: &mut Hotspot, drift_speed: f64, delta_my: f64) {
    let axis = hotspot.position.cross(hotspot.drift_axis).normalize();
    let angle = drift_speed * delta_my;
    hotspot.position = rotate_about_axis(hotspot.position, axis, angle).normalize();
}

/// Thermal-to-stress contribution at `position`: `10 · ThermalOutput ·
/// exp(-d²/σ²)` MPa, clamped to `[0, 100]`, summed across all hotspots.
pub fn hotspot_stress_contribution(hotspots: &[Hotspot], position: Vec3) -> f64 {
    let mut total = 0.0;
    for h in hotspots {
        let d = crate::sphere::great_circle_distance_rad(position, h.position);
        let sigma = h.influence_radius_rad;
        total += 10.0 * h.thermal_output * (-(d * d) / (sigma * sigma)).exp();
    }
    total.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_counts() {
        let hotspots = generate_hotspots(3, 5, 1.0, 0.5, 42);
        assert_eq!(hotspots.len(), 8);
        assert_eq!(hotspots.iter().filter(|h| h.kind == HotspotKind::Major).count(), 3);
        assert_eq!(hotspots.iter().filter(|h| h.kind == HotspotKind::Minor).count(), 5);
    }

    #[test]
    fn positions_are_unit_vectors() {
        let hotspots = generate_hotspots(3, 5, 1.0, 0.5, 42);
        for h in &hotspots {
            assert!((h.position.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn same_seed_reproduces_positions() {
        let a = generate_hotspots(3, 5, 1.0, 0.5, 42);
        let b = generate_hotspots(3, 5, 1.0, 0.5, 42);
        for (ha, hb) in a.iter().zip(b.iter()) {
            let d = crate::sphere::great_circle_distance_rad(ha.position, hb.position);
            assert!(d < 1e-3);
        }
    }

    #[test]
    fn drift_accumulates_nonzero_displacement() {
        let mut hotspots = generate_hotspots(1, 0, 1.0, 0.0, 7);
        let start = hotspots[0].position;
        for _ in 0..10 {
            update_drift(&mut hotspots[0], 0.01, 1.0);
        }
        let displacement = crate::sphere::great_circle_distance_rad(start, hotspots[0].position);
        assert!(displacement > 0.0);
    }

    #[test]
    fn stress_contribution_clamped_to_100() {
        let hotspots = generate_hotspots(20, 0, 100.0, 0.0, 1);
        // Evaluate at every hotspot's own position: contribution should saturate.
        for h in &hotspots {
            let stress = hotspot_stress_contribution(&hotspots, h.position);
            assert!(stress <= 100.0);
        }
    }
}
