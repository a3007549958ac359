//! Dynamic re-tessellation: rebuild the render mesh at a new level of
//! detail and transfer every per-vertex field from the old mesh using C1
//! k-nearest (k=3) inverse-distance weighting.

use crate::kdtree::SphericalKdTree;
use crate::mesh::RenderMesh;

const TRANSFER_K: usize = 3;
const EXACT_MATCH_DIST_SQ: f64 = 1e-18;

/// Transfer a scalar per-vertex field from `old_mesh` to `new_mesh`. Exact
/// position matches (distance² below `EXACT_MATCH_DIST_SQ`) short-circuit to
/// the old value; otherwise the k=3 nearest old vertices are blended with
/// inverse-distance weights.
pub fn transfer_field(old_mesh: &RenderMesh, old_values: &[f64], new_mesh: &RenderMesh) -> Vec<f64> {
    let ids: Vec<u32> = (0..old_mesh.vertex_count() as u32).collect();
    let tree = SphericalKdTree::build(&old_mesh.vertices, &ids);

    new_mesh
        .vertices
        .iter()
        .map(|&v| {
            let neighbors = tree.find_k_nearest(v, TRANSFER_K);
            if let Some(&(id, d)) = neighbors.first() {
                if d < EXACT_MATCH_DIST_SQ {
                    return old_values[id as usize];
                }
            }
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for (id, dist_sq) in neighbors {
                let w = 1.0 / dist_sq.sqrt().max(1e-9);
                weighted_sum += w * old_values[id as usize];
                weight_total += w;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                0.0
            }
        })
        .collect()
}

/// Rebuild the render mesh at `new_level` and transfer every supplied field.
/// Returns the new mesh and the transferred fields in the same order.
pub fn retessellate(old_mesh: &RenderMesh, new_level: u32, fields: &[&[f64]]) -> (RenderMesh, Vec<Vec<f64>>) {
    let new_mesh = RenderMesh::from_icosphere(new_level);
    let transferred = fields.iter().map(|f| transfer_field(old_mesh, f, &new_mesh)).collect();
    (new_mesh, transferred)
}
