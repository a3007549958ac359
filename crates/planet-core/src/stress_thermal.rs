//! Thermal field: an analytic temperature estimate combining a mantle
//! baseline, hotspot Gaussian contributions, and convergent-boundary
//! subduction heating (spec §4.7, grounded on `ThermalField.cpp`).

use crate::boundary::{BoundaryType, PlateBoundary};
use crate::hotspot::Hotspot;
use crate::mesh::RenderMesh;
use crate::sphere::{great_circle_distance_rad, Vec3};

const BASELINE_MANTLE_K: f64 = 1600.0;
const SUBDUCTION_STRESS_THRESHOLD_MPA: f64 = 50.0;
const SUBDUCTION_RADIUS_RAD: f64 = 0.1;

/// Thermal contribution of a single hotspot at `position`:
/// Gaussian with peak `400 · ThermalOutput` and `σ = InfluenceRadius / 2`.
fn hotspot_contribution(hotspot: &Hotspot, position: Vec3) -> f64 {
    let d = great_circle_distance_rad(position, hotspot.position);
    let sigma = hotspot.influence_radius_rad / 2.0;
    let peak = 400.0 * hotspot.thermal_output;
    peak * (-(d * d) / (2.0 * sigma * sigma)).exp()
}

/// Linear-falloff contribution of a convergent boundary whose accumulated
/// stress exceeds the subduction threshold: peak `2 · AccumulatedStress`,
/// zero beyond `SUBDUCTION_RADIUS_RAD`.
fn subduction_contribution(boundary: &PlateBoundary, mesh: &RenderMesh, position: Vec3) -> f64 {
    if boundary.boundary_type != BoundaryType::Convergent || boundary.accumulated_stress_mpa <= SUBDUCTION_STRESS_THRESHOLD_MPA {
        return 0.0;
    }
    let peak = 2.0 * boundary.accumulated_stress_mpa;
    let mut best = 0.0_f64;
    for &(v0, _v1) in &boundary.edges {
        let d = great_circle_distance_rad(position, mesh.vertices[v0 as usize]);
        if d < SUBDUCTION_RADIUS_RAD {
            let falloff = 1.0 - d / SUBDUCTION_RADIUS_RAD;
            best = best.max(peak * falloff);
        }
    }
    best
}

const STRESS_INTERPOLATION_SIGMA_RAD: f64 = 10.0 * std::f64::consts::PI / 180.0;

/// Interpolate each boundary's accumulated stress onto every render-mesh
/// vertex: Gaussian-weight (`σ = 10°` of arc distance to the boundary
/// midpoint) contributions from every boundary, normalized by total weight.
/// A vertex farther than a few σ from any boundary ends up near zero, which
/// is the intended behavior for interior-plate vertices.
pub fn interpolate_stress_to_vertices(mesh: &RenderMesh, boundaries: &[&PlateBoundary]) -> Vec<f64> {
    let midpoints: Vec<Option<Vec3>> = boundaries
        .iter()
        .map(|b| {
            b.edges.first().map(|&(v0, v1)| mesh.vertices[v0 as usize].add(mesh.vertices[v1 as usize]).normalize())
        })
        .collect();

    let mut field = vec![0.0f64; mesh.vertex_count()];
    let two_sigma_sq = 2.0 * STRESS_INTERPOLATION_SIGMA_RAD * STRESS_INTERPOLATION_SIGMA_RAD;

    for (i, value) in field.iter_mut().enumerate() {
        let position = mesh.vertices[i];
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (b, mid) in boundaries.iter().zip(midpoints.iter()) {
            let Some(mid) = mid else { continue };
            let d = great_circle_distance_rad(position, *mid);
            let w = (-(d * d) / two_sigma_sq).exp();
            weighted_sum += w * b.accumulated_stress_mpa;
            weight_total += w;
        }
        *value = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };
    }

    field
}

/// Compute the thermal field over every render-mesh vertex, clamped to
/// `[0, 3000]` K.
pub fn compute_thermal_field(
    mesh: &RenderMesh,
    boundaries: &[&PlateBoundary],
    hotspots: &[Hotspot],
) -> Vec<f64> {
    let mut field = vec![BASELINE_MANTLE_K; mesh.vertex_count()];

    for (i, t) in field.iter_mut().enumerate() {
        let position = mesh.vertices[i];
        let mut value = *t;
        for h in hotspots {
            value += hotspot_contribution(h, position);
        }
        for b in boundaries {
            value += subduction_contribution(b, mesh, position);
        }
        *t = value.clamp(0.0, 3000.0);
    }

    field
}
