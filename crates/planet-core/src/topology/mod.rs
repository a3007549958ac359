//! Topology surgery: plate splits, merges, dynamic re-tessellation, and
//! terrane extraction/reattachment (spec §4.10).
//!
//! Every mutation here follows the same two-phase shape: build a candidate
//! result from immutable inputs, validate it, then either commit by
//! returning it or report why it was rejected. No SPEC_FULL operation
//! mutates plate/mesh state in place before validation succeeds.

pub mod merge;
pub mod retessellation;
pub mod split;
pub mod terrane;

use crate::error::EngineWarning;

/// Shared validation for any candidate topology mutation: the render mesh
/// must remain a closed 2-manifold (Euler characteristic 2), and every
/// vertex must be assigned to exactly one plate — except a vertex listed in
/// `allowed_unassigned`, which is legitimately unassigned for the duration
/// of an in-flight terrane's Extracted/Transporting/Colliding lifecycle
/// (spec §4.10).
pub fn validate_topology(vertex_count: usize, face_count: usize, assignment: &[u32], allowed_unassigned: &[u32]) -> Result<(), EngineWarning> {
    let edge_count = 3 * face_count / 2;
    let euler = vertex_count as i64 - edge_count as i64 + face_count as i64;
    if euler != 2 {
        return Err(EngineWarning::TopologySurgerySkipped { reason: format!("Euler characteristic {euler} != 2") });
    }
    let allowed: std::collections::HashSet<u32> = allowed_unassigned.iter().copied().collect();
    if assignment
        .iter()
        .enumerate()
        .any(|(v, &a)| a == crate::voronoi::UNASSIGNED && !allowed.contains(&(v as u32)))
    {
        return Err(EngineWarning::TopologySurgerySkipped { reason: "unassigned vertices after surgery".to_string() });
    }
    Ok(())
}
