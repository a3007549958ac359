//! Terrane extraction/reattachment: a contiguous patch of continental crust
//! can be cut from its carrier plate, ride the carrier's rigid rotation
//! independently of the surrounding mesh, and later be spliced onto a
//! different target plate.

use crate::error::EngineWarning;
use crate::plate::TectonicPlate;
use crate::sphere::{rotate_by_euler_pole, Vec3};
use crate::voronoi::UNASSIGNED;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Minimum spherical area (in steradians, planet-radius-independent) a
/// candidate patch must cover to be worth extracting as a terrane —
/// corresponds to spec's 100 km² floor at Earth radius.
pub fn min_terrane_area_steradians(planet_radius_m: f64) -> f64 {
    let min_area_m2 = 100.0e6; // 100 km^2 in m^2
    min_area_m2 / (planet_radius_m * planet_radius_m)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerranePayload {
    pub source_plate_id: u32,
    pub vertex_ids: Vec<u32>,
    pub positions: Vec<Vec3>,
    pub elevations: Vec<f64>,
    pub ages: Vec<f64>,
    /// Render-mesh faces removed because every vertex fell inside the
    /// extracted patch, recorded so reattachment can restore them exactly
    /// (spec §4.10's patch-closure surgery).
    pub extracted_triangles: Vec<[u32; 3]>,
    /// Fan-triangulated cap faces added to close the hole `extracted_triangles`
    /// left behind, built only from rim vertices bordering the patch.
    pub patch_triangles: Vec<[u32; 3]>,
}

/// Classify `faces` against `vertex_ids` and build the patch-closure surgery
/// for extracting them: faces wholly inside the patch are removed
/// (`extracted_triangles`), and the hole they leave is re-capped by walking
/// the boundary ring of rim edges (edges of an interior face not shared with
/// another interior face) into a cycle and fan-triangulating from its first
/// vertex. Returns `None` if the patch has no interior faces, or its
/// boundary isn't a single simple cycle — callers must reject extraction
/// rather than commit a torn mesh.
pub fn patch_closure(faces: &[[u32; 3]], vertex_ids: &[u32]) -> Option<(Vec<[u32; 3]>, Vec<[u32; 3]>)> {
    let patch: HashSet<u32> = vertex_ids.iter().copied().collect();
    let interior: Vec<[u32; 3]> = faces.iter().copied().filter(|f| f.iter().all(|v| patch.contains(v))).collect();
    if interior.is_empty() {
        return None;
    }

    let mut edge_count: HashMap<(u32, u32), u32> = HashMap::new();
    for f in &interior {
        for i in 0..3 {
            let a = f[i];
            let b = f[(i + 1) % 3];
            let key = if a < b { (a, b) } else { (b, a) };
            *edge_count.entry(key).or_insert(0) += 1;
        }
    }
    let rim_edges: Vec<(u32, u32)> = edge_count.into_iter().filter(|&(_, count)| count == 1).map(|(edge, _)| edge).collect();
    if rim_edges.len() < 3 {
        return None;
    }

    let mut ring_adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in &rim_edges {
        ring_adjacency.entry(a).or_default().push(b);
        ring_adjacency.entry(b).or_default().push(a);
    }
    if ring_adjacency.values().any(|neighbors| neighbors.len() != 2) {
        return None; // rim isn't a single simple cycle
    }

    let start = rim_edges[0].0;
    let mut ring = vec![start];
    let mut prev = start;
    let mut current = ring_adjacency[&start][0];
    while current != start {
        ring.push(current);
        let candidates = &ring_adjacency[&current];
        let next = if candidates[0] == prev { candidates[1] } else { candidates[0] };
        prev = current;
        current = next;
        if ring.len() > rim_edges.len() {
            return None; // walked past the expected cycle length without closing
        }
    }
    if ring.len() < 3 {
        return None;
    }

    let apex = ring[0];
    let cap: Vec<[u32; 3]> = (1..ring.len() - 1).map(|i| [apex, ring[i], ring[i + 1]]).collect();

    Some((interior, cap))
}

/// Remove each face in `to_remove` from `faces` by exact value match
/// (order-sensitive, since both lists come from the same source faces).
pub fn remove_faces(faces: &mut Vec<[u32; 3]>, to_remove: &[[u32; 3]]) {
    for f in to_remove {
        if let Some(pos) = faces.iter().position(|x| x == f) {
            faces.swap_remove(pos);
        }
    }
}

/// Reject a candidate patch before any mutation: empty, containing a
/// duplicate or out-of-range vertex, or a vertex not currently owned by
/// `carrier_plate_id` all fail extraction outright (spec §7's
/// validate-before-commit rule applied to terrane surgery).
pub fn validate_extraction(vertex_ids: &[u32], assignment: &[u32], carrier_plate_id: u32) -> Result<(), EngineWarning> {
    if vertex_ids.is_empty() {
        return Err(EngineWarning::TopologySurgerySkipped { reason: "terrane patch is empty".to_string() });
    }
    let mut seen = std::collections::HashSet::new();
    for &v in vertex_ids {
        if !seen.insert(v) {
            return Err(EngineWarning::TopologySurgerySkipped { reason: format!("vertex {v} listed more than once in terrane patch") });
        }
        let Some(&owner) = assignment.get(v as usize) else {
            return Err(EngineWarning::TopologySurgerySkipped { reason: format!("vertex {v} is out of range") });
        };
        if owner != carrier_plate_id {
            return Err(EngineWarning::TopologySurgerySkipped {
                reason: format!("vertex {v} is owned by plate {owner}, not carrier plate {carrier_plate_id}"),
            });
        }
    }
    Ok(())
}

/// Extract `vertex_ids` (a contiguous patch owned by `carrier_plate_id`,
/// already checked by [`validate_extraction`]) into a terrane payload.
/// Captures positions/elevations/ages, marks the vertices unassigned in
/// `assignment`, and records the patch-closure surgery (`extracted_triangles`,
/// `patch_triangles`, from [`patch_closure`]) so the caller can apply it to
/// `mesh.faces` and reverse it exactly on reattachment. Per-vertex
/// ownership, position, elevation, and age move; `assignment` is the only
/// array this function itself mutates — the caller is responsible for
/// committing the face-list surgery once [`crate::topology::validate_topology`]
/// has accepted the candidate.
pub fn extract(
    vertices: &[Vec3],
    assignment: &mut [u32],
    elevations: &[f64],
    ages: &[f64],
    carrier_plate_id: u32,
    vertex_ids: &[u32],
    extracted_triangles: Vec<[u32; 3]>,
    patch_triangles: Vec<[u32; 3]>,
) -> TerranePayload {
    let positions: Vec<Vec3> = vertex_ids.iter().map(|&v| vertices[v as usize]).collect();
    let payload_elevations: Vec<f64> = vertex_ids.iter().map(|&v| elevations[v as usize]).collect();
    let payload_ages: Vec<f64> = vertex_ids.iter().map(|&v| ages[v as usize]).collect();

    for &v in vertex_ids {
        assignment[v as usize] = UNASSIGNED;
    }

    TerranePayload {
        source_plate_id: carrier_plate_id,
        vertex_ids: vertex_ids.to_vec(),
        positions,
        elevations: payload_elevations,
        ages: payload_ages,
        extracted_triangles,
        patch_triangles,
    }
}

/// Normalized mean of a payload's carried positions: the terrane's current
/// drifted centroid, used to detect re-entry into a neighboring plate's
/// territory (spec §4.10 "terrane collisions").
pub fn payload_centroid(payload: &TerranePayload) -> Vec3 {
    let sum = payload.positions.iter().fold(Vec3::new(0.0, 0.0, 0.0), |acc, &p| acc.add(p));
    if sum.length() > 1e-9 {
        sum.normalize()
    } else {
        payload.positions.first().copied().unwrap_or(Vec3::new(1.0, 0.0, 0.0))
    }
}

/// Advance a terrane's carried positions by the carrier plate's rigid
/// rotation over `delta_my`. Elevations/ages are untouched in transit.
pub fn transport(payload: &mut TerranePayload, carrier: &TectonicPlate, delta_my: f64) {
    for p in &mut payload.positions {
        *p = rotate_by_euler_pole(*p, carrier.euler_pole_axis, carrier.angular_velocity_rad_per_my, delta_my).normalize();
    }
}

/// Splice a terrane payload back onto `target_plate_id`, restoring
/// ownership, positions, elevations, and ages. The face-list half of the
/// inverse (removing `patch_triangles`, restoring `extracted_triangles`) is
/// the caller's responsibility, same as `extract`'s face-list surgery.
/// Reattaching to the source plate with no intervening `transport` call is a
/// bit-identical inverse of `extract` (spec §8 determinism laws).
pub fn reattach(
    payload: &TerranePayload,
    vertices: &mut [Vec3],
    assignment: &mut [u32],
    elevations: &mut [f64],
    ages: &mut [f64],
    target_plate_id: u32,
) {
    for (i, &v) in payload.vertex_ids.iter().enumerate() {
        vertices[v as usize] = payload.positions[i];
        elevations[v as usize] = payload.elevations[i];
        ages[v as usize] = payload.ages[i];
        assignment[v as usize] = target_plate_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RenderMesh;

    #[test]
    fn extract_marks_vertices_unassigned() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut assignment = vec![0u32; n];
        let elevations = vec![100.0; n];
        let ages = vec![5.0; n];
        let patch = vec![0u32, 1, 2];
        let payload = extract(&mesh.vertices, &mut assignment, &elevations, &ages, 0, &patch, Vec::new(), Vec::new());

        assert_eq!(payload.vertex_ids, patch);
        for &v in &patch {
            assert_eq!(assignment[v as usize], UNASSIGNED);
        }
    }

    #[test]
    fn extract_then_reattach_to_source_is_identity() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut assignment = vec![3u32; n];
        let mut elevations: Vec<f64> = (0..n).map(|i| i as f64 * 1.5).collect();
        let mut ages: Vec<f64> = (0..n).map(|i| i as f64 * 0.25).collect();
        let mut vertices = mesh.vertices.clone();

        let original_assignment = assignment.clone();
        let original_elevations = elevations.clone();
        let original_ages = ages.clone();
        let original_vertices = vertices.clone();

        let patch = vec![4u32, 5, 6];
        let payload = extract(&mesh.vertices, &mut assignment, &elevations, &ages, 3, &patch, Vec::new(), Vec::new());
        reattach(&payload, &mut vertices, &mut assignment, &mut elevations, &mut ages, 3);

        assert_eq!(assignment, original_assignment);
        assert_eq!(elevations, original_elevations);
        assert_eq!(ages, original_ages);
        for (a, b) in vertices.iter().zip(original_vertices.iter()) {
            assert_eq!(a.x, b.x);
            assert_eq!(a.y, b.y);
            assert_eq!(a.z, b.z);
        }
    }

    #[test]
    fn transport_preserves_unit_length() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut assignment = vec![0u32; n];
        let elevations = vec![0.0; n];
        let ages = vec![0.0; n];
        let patch = vec![0u32, 1, 2];
        let mut payload = extract(&mesh.vertices, &mut assignment, &elevations, &ages, 0, &patch, Vec::new(), Vec::new());

        let carrier = &crate::plate::generate_plates(0, 9)[0];
        transport(&mut payload, carrier, 5.0);
        for p in &payload.positions {
            assert!((p.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn reattach_to_different_plate_changes_ownership() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut assignment = vec![0u32; n];
        let elevations = vec![0.0; n];
        let ages = vec![0.0; n];
        let patch = vec![0u32, 1, 2];
        let payload = extract(&mesh.vertices, &mut assignment, &elevations, &ages, 0, &patch, Vec::new(), Vec::new());

        let mut vertices = mesh.vertices.clone();
        let mut elevations = elevations;
        let mut ages = ages;
        reattach(&payload, &mut vertices, &mut assignment, &mut elevations, &mut ages, 7);
        for &v in &patch {
            assert_eq!(assignment[v as usize], 7);
        }
    }

    #[test]
    fn validate_extraction_rejects_patch_owned_by_another_plate() {
        let assignment = vec![0u32, 0, 1];
        assert!(validate_extraction(&[0, 1, 2], &assignment, 0).is_err());
        assert!(validate_extraction(&[0, 1], &assignment, 0).is_ok());
    }

    #[test]
    fn validate_extraction_rejects_empty_and_duplicate_patches() {
        let assignment = vec![0u32; 4];
        assert!(validate_extraction(&[], &assignment, 0).is_err());
        assert!(validate_extraction(&[0, 0], &assignment, 0).is_err());
    }

    #[test]
    fn payload_centroid_is_unit_length() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut assignment = vec![0u32; n];
        let elevations = vec![0.0; n];
        let ages = vec![0.0; n];
        let patch = vec![0u32, 1, 2];
        let payload = extract(&mesh.vertices, &mut assignment, &elevations, &ages, 0, &patch, Vec::new(), Vec::new());
        let centroid = payload_centroid(&payload);
        assert!((centroid.length() - 1.0).abs() < 1e-9);
    }

    /// A single face's 3 vertices as the patch: exactly that one face is
    /// interior, its 3 edges form the rim, and the fan-triangulated cap for a
    /// 3-vertex ring is a single triangle (reconstructing the removed face).
    #[test]
    fn patch_closure_caps_a_single_face_hole() {
        let mesh = RenderMesh::from_icosphere(1);
        let face = mesh.faces[0];
        let patch = vec![face[0], face[1], face[2]];
        let (interior, cap) = patch_closure(&mesh.faces, &patch).expect("a lone face is a valid interior patch");
        assert_eq!(interior.len(), 1);
        assert_eq!(interior[0], face);
        assert_eq!(cap.len(), 1, "a 3-vertex rim caps with exactly one triangle");
    }

    #[test]
    fn patch_closure_rejects_a_patch_with_no_interior_faces() {
        let mesh = RenderMesh::from_icosphere(1);
        // A single vertex can't bound any face entirely within the patch.
        assert!(patch_closure(&mesh.faces, &[0]).is_none());
    }
}
