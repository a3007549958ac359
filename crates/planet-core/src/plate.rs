//! Rigid tectonic plates: one per base-mesh face, each carrying an Euler
//! pole (rigid-rotation axis + angular velocity) and a crust type.

use crate::icosphere::IcosphereMesh;
use crate::sphere::{rotate_by_euler_pole, Vec3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrustType {
    Continental,
    Oceanic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TectonicPlate {
    pub plate_id: u32,
    pub crust_type: CrustType,
    /// Current centroid direction (rigid-rotated each step).
    pub centroid: Vec3,
    /// Centroid at generation time; used to detect retessellation-worthy drift.
    pub initial_centroid: Vec3,
    pub euler_pole_axis: Vec3,
    pub angular_velocity_rad_per_my: f64,
    /// Vertex indices (into the generating low-LOD icosphere) of this
    /// plate's originating face, retained for Voronoi seeding continuity.
    pub seed_face: [u32; 3],
    /// Nominal crust thickness (spec §3: ~7km oceanic / ~35km continental).
    pub crust_thickness_m: f64,
}

/// Nominal crust thickness by type (spec §3).
pub const OCEANIC_CRUST_THICKNESS_M: f64 = 7_000.0;
pub const CONTINENTAL_CRUST_THICKNESS_M: f64 = 35_000.0;

pub fn default_crust_thickness_m(crust_type: CrustType) -> f64 {
    match crust_type {
        CrustType::Oceanic => OCEANIC_CRUST_THICKNESS_M,
        CrustType::Continental => CONTINENTAL_CRUST_THICKNESS_M,
    }
}

impl TectonicPlate {
    /// Rigid-rotate this plate's centroid forward by `delta_my` million years.
    pub fn migrate(&mut self, delta_my: f64) {
        self.centroid = rotate_by_euler_pole(self.centroid, self.euler_pole_axis, self.angular_velocity_rad_per_my, delta_my)
            .normalize();
    }

    /// Tangential velocity (m/My) of a point co-rotating with this plate.
    pub fn velocity_at(&self, position: Vec3, planet_radius_m: f64) -> Vec3 {
        // v = ω (axis × r), scaled to this plate's angular rate and the planet's radius.
        self.euler_pole_axis.cross(position).scale(self.angular_velocity_rad_per_my * planet_radius_m)
    }
}

/// Generate one rigid plate per face of an icosphere at `subdivision_level`,
/// seeding Euler poles and crust types deterministically from `seed`.
/// At level 0 this yields the canonical 20-plate baseline (spec §8, scenario 1).
pub fn generate_plates(subdivision_level: u32, seed: u64) -> Vec<TectonicPlate> {
    let mesh = IcosphereMesh::generate(subdivision_level);
    let mut rng = StdRng::seed_from_u64(seed);
    // Poles and angular velocities are drawn from a separately-seeded stream
    // (`seed + 1`) so they're decorrelated from the crust-type shuffle above,
    // matching the `seed + 1000` offset hotspot generation uses to decorrelate
    // from plate generation.
    let mut pole_rng = StdRng::seed_from_u64(seed.wrapping_add(1));

    // Roughly Earth-like continental fraction (~30%): shuffle the plate
    // indices and label the first 70% oceanic, rather than flipping an
    // independent coin per plate, so the overall mix is guaranteed rather
    // than merely expected.
    let mut shuffled_indices: Vec<usize> = (0..mesh.faces.len()).collect();
    shuffled_indices.shuffle(&mut rng);
    let oceanic_count = ((mesh.faces.len() as f64) * 0.7).round() as usize;
    let mut crust_types = vec![CrustType::Continental; mesh.faces.len()];
    for &idx in shuffled_indices.iter().take(oceanic_count) {
        crust_types[idx] = CrustType::Oceanic;
    }

    mesh.faces
        .iter()
        .enumerate()
        .map(|(i, face)| {
            let [a, b, c] = *face;
            let centroid = Vec3 {
                x: (mesh.vertices[a as usize].x + mesh.vertices[b as usize].x + mesh.vertices[c as usize].x) / 3.0,
                y: (mesh.vertices[a as usize].y + mesh.vertices[b as usize].y + mesh.vertices[c as usize].y) / 3.0,
                z: (mesh.vertices[a as usize].z + mesh.vertices[b as usize].z + mesh.vertices[c as usize].z) / 3.0,
            }
            .normalize();

            let axis = Vec3::new(
                pole_rng.gen_range(-1.0..1.0),
                pole_rng.gen_range(-1.0..1.0),
                pole_rng.gen_range(-1.0..1.0),
            )
            .normalize();
            let angular_velocity = pole_rng.gen_range(0.01..0.1);
            let crust_type = crust_types[i];

            TectonicPlate {
                plate_id: i as u32,
                crust_type,
                centroid,
                initial_centroid: centroid,
                euler_pole_axis: axis,
                angular_velocity_rad_per_my: angular_velocity,
                seed_face: [a, b, c],
                crust_thickness_m: default_crust_thickness_m(crust_type),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdivision_zero_yields_twenty_plates() {
        let plates = generate_plates(0, 12345);
        assert_eq!(plates.len(), 20);
    }

    #[test]
    fn all_centroids_are_unit_vectors() {
        let plates = generate_plates(0, 1);
        for p in &plates {
            assert!((p.centroid.length() - 1.0).abs() < 1e-9);
            assert!((p.euler_pole_axis.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let a = generate_plates(1, 777);
        let b = generate_plates(1, 777);
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.crust_type, pb.crust_type);
            assert!((pa.euler_pole_axis.x - pb.euler_pole_axis.x).abs() < 1e-15);
        }
    }

    #[test]
    fn crust_type_mix_matches_seventy_percent_oceanic() {
        let plates = generate_plates(1, 314);
        let oceanic = plates.iter().filter(|p| p.crust_type == CrustType::Oceanic).count();
        let expected = ((plates.len() as f64) * 0.7).round() as usize;
        assert_eq!(oceanic, expected);
    }

    #[test]
    fn angular_velocity_is_within_spec_range() {
        let plates = generate_plates(1, 99);
        for p in &plates {
            assert!((0.01..0.1).contains(&p.angular_velocity_rad_per_my));
        }
    }

    #[test]
    fn crust_thickness_matches_crust_type() {
        let plates = generate_plates(1, 99);
        for p in &plates {
            let expected = default_crust_thickness_m(p.crust_type);
            assert_eq!(p.crust_thickness_m, expected);
        }
    }

    #[test]
    fn migrate_preserves_unit_length() {
        let mut plates = generate_plates(0, 5);
        for p in &mut plates {
            p.migrate(2.0);
            assert!((p.centroid.length() - 1.0).abs() < 1e-9);
        }
    }
}
