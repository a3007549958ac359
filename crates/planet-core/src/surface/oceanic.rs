//! Oceanic dampening: age-subsidence target depth, adjacency-weighted
//! smoothing, and crust-age bookkeeping for oceanic vertices below sea
//! level (spec §4.9).
//!
//! Grounded on the richer `StageB/OceanicDampening.cpp` variant: adjacency
//! weights/weight-totals are precomputed once (`mesh::Adjacency`), and the
//! smoothing pass writes into a fresh buffer before an atomic swap — a
//! disjoint-output parallel-for with no shared-write reduction, per spec §5.

use crate::boundary::{BoundaryType, PlateBoundary};
use crate::mesh::RenderMesh;
use crate::plate::CrustType;
use crate::sphere::great_circle_distance_rad;
use rayon::prelude::*;

/// Mid-ocean-ridge depth: new oceanic crust starts here (meters, negative).
const RIDGE_DEPTH_M: f64 = -1000.0;
/// Abyssal-plain floor depth: subsidence never drops crust below this.
const ABYSSAL_DEPTH_M: f64 = -6000.0;
const DIVERGENT_RESET_RADIUS_RAD: f64 = 0.01;

/// Adjacency-weighted Gaussian smoothing of `elevations`, using the mesh's
/// precomputed weights/weight-totals. Writes into a disjoint `next` buffer.
fn smooth_elevations(mesh: &RenderMesh, elevations: &[f64]) -> Vec<f64> {
    (0..mesh.vertex_count())
        .into_par_iter()
        .map(|v| {
            let neighbors = mesh.adjacency.neighbors(v as u32);
            let weights = mesh.adjacency.neighbor_weights(v as u32);
            let mut acc = elevations[v]; // self-weight 1.0
            for (&n, &w) in neighbors.iter().zip(weights.iter()) {
                acc += w * elevations[n as usize];
            }
            acc / mesh.adjacency.weight_totals[v]
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
pub fn apply_oceanic_dampening(
    mesh: &RenderMesh,
    elevations: &mut [f64],
    crust_age_my: &mut [f64],
    boundaries: &[&PlateBoundary],
    crust_type_of: impl Fn(usize) -> Option<CrustType>,
    sea_level_m: f64,
    dampening_constant: f64,
    age_subsidence_coeff: f64,
    delta_my: f64,
) {
    let smoothed = smooth_elevations(mesh, elevations);

    for v in 0..mesh.vertex_count() {
        if !matches!(crust_type_of(v), Some(CrustType::Oceanic)) {
            continue;
        }
        if elevations[v] > sea_level_m {
            continue;
        }

        crust_age_my[v] += delta_my;

        let target_depth = (RIDGE_DEPTH_M - age_subsidence_coeff * crust_age_my[v].sqrt()).max(ABYSSAL_DEPTH_M);

        let damped = lerp(elevations[v], smoothed[v], (dampening_constant * delta_my).min(1.0));
        let pulled = lerp(damped, target_depth, (0.01 * delta_my).min(1.0));
        elevations[v] = pulled.min(sea_level_m - 1.0);

        let vertex_pos = mesh.vertices[v];
        let near_divergent_ridge = boundaries.iter().any(|b| {
            b.boundary_type == BoundaryType::Divergent
                && b.edges.iter().any(|&(e0, _)| great_circle_distance_rad(vertex_pos, mesh.vertices[e0 as usize]) < DIVERGENT_RESET_RADIUS_RAD)
        });
        if near_divergent_ridge {
            crust_age_my[v] = 0.0;
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oceanic_elevation_stays_below_sea_level() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![-100.0; n];
        let mut ages = vec![0.0; n];
        for _ in 0..20 {
            apply_oceanic_dampening(&mesh, &mut elevations, &mut ages, &[], |_| Some(CrustType::Oceanic), 0.0, 0.1, 350.0, 1.0);
        }
        assert!(elevations.iter().all(|&e| e <= -1.0));
    }

    #[test]
    fn continental_vertices_are_untouched() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![500.0; n];
        let mut ages = vec![0.0; n];
        apply_oceanic_dampening(&mesh, &mut elevations, &mut ages, &[], |_| Some(CrustType::Continental), 0.0, 0.1, 350.0, 1.0);
        assert!(elevations.iter().all(|&e| e == 500.0));
    }

    #[test]
    fn crust_age_increases_over_time() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![-500.0; n];
        let mut ages = vec![0.0; n];
        apply_oceanic_dampening(&mesh, &mut elevations, &mut ages, &[], |_| Some(CrustType::Oceanic), 0.0, 0.1, 350.0, 2.0);
        assert!(ages.iter().all(|&a| a == 2.0));
    }

    #[test]
    fn older_crust_subsides_deeper_than_young_crust() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut young_elev = vec![-2500.0; n];
        let mut young_age = vec![0.0; n];
        let mut old_elev = vec![-2500.0; n];
        let mut old_age = vec![100.0; n];

        for _ in 0..5 {
            apply_oceanic_dampening(&mesh, &mut young_elev, &mut young_age, &[], |_| Some(CrustType::Oceanic), 0.0, 0.1, 350.0, 1.0);
            apply_oceanic_dampening(&mesh, &mut old_elev, &mut old_age, &[], |_| Some(CrustType::Oceanic), 0.0, 0.1, 350.0, 1.0);
        }
        assert!(old_elev[0] < young_elev[0]);
    }
}
