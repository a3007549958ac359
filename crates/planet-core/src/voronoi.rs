//! Voronoi assignment: map every render-mesh vertex to the nearest plate
//! centroid, with optional Lloyd relaxation and domain warping of the query
//! direction (spec §4.5).

use crate::kdtree::SphericalKdTree;
use crate::plate::TectonicPlate;
use crate::sphere::Vec3;
use noise::{NoiseFn, Perlin};

pub const UNASSIGNED: u32 = u32::MAX;

/// Assign every vertex in `vertices` to the nearest plate centroid. When
/// `warping_amplitude > 0`, the query direction is perturbed by Perlin noise
/// before the nearest lookup (breaks up perfectly straight Voronoi cell
/// boundaries).
pub fn assign_vertices(
    vertices: &[Vec3],
    plates: &[TectonicPlate],
    warping_amplitude: f64,
    warping_frequency: f64,
    seed: u64,
) -> Vec<u32> {
    if plates.is_empty() {
        return vec![UNASSIGNED; vertices.len()];
    }
    let centroids: Vec<Vec3> = plates.iter().map(|p| p.centroid).collect();
    let ids: Vec<u32> = plates.iter().map(|p| p.plate_id).collect();
    let tree = SphericalKdTree::build(&centroids, &ids);

    let warp = if warping_amplitude > 0.0 { Some(Perlin::new(seed as u32)) } else { None };

    vertices
        .iter()
        .map(|&v| {
            let query = match &warp {
                Some(noise) => warp_direction(v, noise, warping_amplitude, warping_frequency),
                None => v,
            };
            tree.find_nearest(query).map(|(id, _)| id).unwrap_or(UNASSIGNED)
        })
        .collect()
}

fn warp_direction(v: Vec3, noise: &Perlin, amplitude: f64, frequency: f64) -> Vec3 {
    let dx = noise.get([v.x * frequency, v.y * frequency, v.z * frequency]);
    let dy = noise.get([v.y * frequency + 7.3, v.z * frequency + 1.1, v.x * frequency + 4.2]);
    let dz = noise.get([v.z * frequency + 2.9, v.x * frequency + 8.8, v.y * frequency + 5.5]);
    Vec3 {
        x: v.x + amplitude * dx,
        y: v.y + amplitude * dy,
        z: v.z + amplitude * dz,
    }
    .normalize()
}

/// One Lloyd relaxation pass: move each plate's centroid toward the mean
/// direction of its currently-assigned vertices, then reassign. Returns the
/// new assignment.
pub fn lloyd_relax(
    vertices: &[Vec3],
    plates: &mut [TectonicPlate],
    iterations: u32,
    warping_amplitude: f64,
    warping_frequency: f64,
    seed: u64,
) -> Vec<u32> {
    let mut assignment = assign_vertices(vertices, plates, warping_amplitude, warping_frequency, seed);
    for _ in 0..iterations {
        let mut sums = vec![Vec3::new(0.0, 0.0, 0.0); plates.len()];
        let mut counts = vec![0u32; plates.len()];
        let id_to_index: std::collections::HashMap<u32, usize> =
            plates.iter().enumerate().map(|(i, p)| (p.plate_id, i)).collect();

        for (&pid, &v) in assignment.iter().zip(vertices.iter()) {
            if pid == UNASSIGNED {
                continue;
            }
            if let Some(&idx) = id_to_index.get(&pid) {
                sums[idx] = sums[idx].add(v);
                counts[idx] += 1;
            }
        }

        for (plate, (sum, count)) in plates.iter_mut().zip(sums.into_iter().zip(counts.into_iter())) {
            if count > 0 {
                plate.centroid = sum.normalize();
            }
        }

        assignment = assign_vertices(vertices, plates, warping_amplitude, warping_frequency, seed);
    }
    assignment
}
