//! Sediment transport: a bounded diffusion relaxation that moves
//! continental-origin sediment thickness downhill to lower-elevation
//! neighbors, conserving total sediment mass per continent.
//!
//! No `SedimentTransport.cpp` implementation exists in the filtered
//! original-source corpus (only test expectations are implied by spec
//! prose) — this kernel is authored directly from the specification's
//! description of the pass, using the same disjoint-output-then-swap
//! update shape as the oceanic dampening pass.

use crate::mesh::RenderMesh;
use crate::plate::CrustType;

/// Relaxation iterations per step; small numbers suffice at typical LODs
/// per spec §4.9 ("a small number of relaxation iterations per step").
pub const ITERATIONS_PER_STEP: u32 = 3;

/// Run `ITERATIONS_PER_STEP` diffusion passes over `sediment_thickness_m`.
/// Each pass moves a `diffusion_rate` fraction of each continental vertex's
/// sediment downhill, split across lower-elevation neighbors in proportion
/// to the elevation drop; oceanic/unassigned vertices neither emit nor
/// receive (sediment reaching the coast is left in place, not lost).
pub fn diffuse_sediment(
    mesh: &RenderMesh,
    sediment_thickness_m: &mut [f64],
    elevations: &[f64],
    crust_type_of: impl Fn(usize) -> Option<CrustType>,
    diffusion_rate: f64,
) {
    for _ in 0..ITERATIONS_PER_STEP {
        let mut next = sediment_thickness_m.to_vec();

        for v in 0..mesh.vertex_count() {
            if !matches!(crust_type_of(v), Some(CrustType::Continental)) {
                continue;
            }
            let elevation_here = elevations[v];
            let neighbors = mesh.adjacency.neighbors(v as u32);

            let drops: Vec<(u32, f64)> = neighbors
                .iter()
                .filter_map(|&n| {
                    if !matches!(crust_type_of(n as usize), Some(CrustType::Continental)) {
                        return None;
                    }
                    let drop = elevation_here - elevations[n as usize];
                    (drop > 0.0).then_some((n, drop))
                })
                .collect();

            if drops.is_empty() {
                continue;
            }
            let total_drop: f64 = drops.iter().map(|(_, d)| d).sum();
            let outflow = (diffusion_rate * sediment_thickness_m[v]).min(sediment_thickness_m[v]);
            if outflow <= 0.0 {
                continue;
            }

            next[v] -= outflow;
            for (n, drop) in drops {
                next[n as usize] += outflow * (drop / total_drop);
            }
        }

        sediment_thickness_m.copy_from_slice(&next);
    }
}
