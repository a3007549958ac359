//! Plate boundary graph: classification (Divergent/Convergent/Transform),
//! lifecycle state machine (Nascent/Active/Dormant/Rifting), stress
//! accumulation, and rift widening (spec §4.6, §4.9, §4.10).

use crate::mesh::RenderMesh;
use crate::plate::TectonicPlate;
use crate::sphere::Vec3;
use crate::voronoi::UNASSIGNED;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryType {
    Divergent,
    Convergent,
    Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryState {
    Nascent,
    Active,
    Dormant,
    Rifting,
}

/// Ordered plate-id pair; always `a < b`, used as the canonical boundary key
/// so iteration order is deterministic (spec §5 ordering guarantee 3).
pub type BoundaryKey = (u32, u32);

pub fn boundary_key(a: u32, b: u32) -> BoundaryKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateBoundary {
    pub key: BoundaryKey,
    pub boundary_type: BoundaryType,
    pub state: BoundaryState,
    pub accumulated_stress_mpa: f64,
    pub rift_width_meters: f64,
    pub active_duration_my: f64,
    /// Consecutive time (My) this boundary has held `BoundaryType::Divergent`
    /// classification; reset to zero the instant it reclassifies away from
    /// Divergent. Gates the Active→Rifting transition (spec §3, §4.6).
    pub divergent_duration_my: f64,
    pub relative_velocity_rad_per_my: f64,
    /// Render-mesh edges (vertex index pairs) straddling this boundary.
    pub edges: Vec<(u32, u32)>,
}

const DIVERGENT_CONVERGENT_THRESHOLD: f64 = 0.001;

/// Below this relative velocity, an Active Convergent/Transform boundary is
/// considered quiescent and falls to Dormant (spec §4.6).
const DORMANCY_VELOCITY_THRESHOLD_RAD_PER_MY: f64 = 0.0005;
/// Below this accumulated stress, an Active Convergent/Transform boundary is
/// considered quiescent and falls to Dormant (spec §4.6).
const DORMANCY_STRESS_THRESHOLD_MPA: f64 = 1.0;

/// Build the boundary graph from a Voronoi assignment: every render-mesh
/// edge whose endpoints carry different plate ids becomes a boundary edge,
/// grouped by the ordered plate-id pair it separates.
pub fn build_boundaries(mesh: &RenderMesh, assignment: &[u32]) -> BTreeMap<BoundaryKey, PlateBoundary> {
    let mut grouped: BTreeMap<BoundaryKey, Vec<(u32, u32)>> = BTreeMap::new();

    for v in 0..mesh.vertex_count() as u32 {
        let pa = assignment[v as usize];
        if pa == UNASSIGNED {
            continue;
        }
        for &n in mesh.adjacency.neighbors(v) {
            if n <= v {
                continue; // each undirected edge visited once
            }
            let pb = assignment[n as usize];
            if pb == UNASSIGNED || pb == pa {
                continue;
            }
            grouped.entry(boundary_key(pa, pb)).or_default().push((v, n));
        }
    }

    grouped
        .into_iter()
        .map(|(key, edges)| {
            (
                key,
                PlateBoundary {
                    key,
                    boundary_type: BoundaryType::Transform,
                    state: BoundaryState::Nascent,
                    accumulated_stress_mpa: 0.0,
                    rift_width_meters: 0.0,
                    active_duration_my: 0.0,
                    divergent_duration_my: 0.0,
                    relative_velocity_rad_per_my: 0.0,
                    edges,
                },
            )
        })
        .collect()
}

/// Re-classify a boundary's type from current plate kinematics. Mirrors
/// `UpdateBoundaryClassifications`: rotate both endpoints to current time via
/// each plate's own Euler pole, average for a midpoint, build the tangent
/// normal from `cross(midpoint, edge_vector)` oriented toward plate A's
/// tangential centroid direction, and take the sign of
/// `dot(relative_velocity, normal)`.
pub fn classify_boundary(
    boundary: &mut PlateBoundary,
    plate_a: &TectonicPlate,
    plate_b: &TectonicPlate,
    mesh: &RenderMesh,
    planet_radius_m: f64,
) {
    let Some(&(v0, v1)) = boundary.edges.first() else {
        return;
    };
    let p0 = mesh.vertices[v0 as usize];
    let p1 = mesh.vertices[v1 as usize];
    let midpoint = Vec3 { x: (p0.x + p1.x) * 0.5, y: (p0.y + p1.y) * 0.5, z: (p0.z + p1.z) * 0.5 }.normalize();
    let edge_vector = p1.sub(p0);

    let normal_raw = midpoint.cross(edge_vector);
    let normal = if normal_raw.length() > 1e-12 { normal_raw.normalize() } else { midpoint };

    // Orient toward plate A: the normal should point away from A's tangential
    // centroid direction at the midpoint.
    let a_tangent = plate_a.centroid.tangential_component(midpoint);
    let normal = if normal.dot(a_tangent) < 0.0 { normal } else { Vec3 { x: -normal.x, y: -normal.y, z: -normal.z } };

    let vel_a = plate_a.velocity_at(midpoint, planet_radius_m);
    let vel_b = plate_b.velocity_at(midpoint, planet_radius_m);
    let relative_velocity = vel_a.sub(vel_b);

    let signed = relative_velocity.dot(normal) / planet_radius_m.max(1.0);
    boundary.relative_velocity_rad_per_my = signed;

    boundary.boundary_type = if signed > DIVERGENT_CONVERGENT_THRESHOLD {
        BoundaryType::Divergent
    } else if signed < -DIVERGENT_CONVERGENT_THRESHOLD {
        BoundaryType::Convergent
    } else {
        BoundaryType::Transform
    };
}

/// Per-type stress accumulation (spec §9.6 / `UpdateBoundaryStress`):
/// convergent accumulates linearly (capped 100 MPa), divergent decays
/// exponentially (τ=10 My), transform accumulates at a tenth the convergent
/// rate (capped 50 MPa).
pub fn update_stress(boundary: &mut PlateBoundary, delta_my: f64) {
    const CONVERGENT_CAP_MPA: f64 = 100.0;
    const TRANSFORM_CAP_MPA: f64 = 50.0;
    const DIVERGENT_TAU_MY: f64 = 10.0;

    let rel_speed = boundary.relative_velocity_rad_per_my.abs();
    match boundary.boundary_type {
        BoundaryType::Convergent => {
            boundary.accumulated_stress_mpa = (boundary.accumulated_stress_mpa + rel_speed * 1000.0 * delta_my).min(CONVERGENT_CAP_MPA);
        }
        BoundaryType::Transform => {
            boundary.accumulated_stress_mpa = (boundary.accumulated_stress_mpa + rel_speed * 100.0 * delta_my).min(TRANSFORM_CAP_MPA);
        }
        BoundaryType::Divergent => {
            boundary.accumulated_stress_mpa *= (-delta_my / DIVERGENT_TAU_MY).exp();
        }
    }
}

/// Boundary lifecycle state machine with hysteresis (spec §3 / §4.6): only
/// Divergent boundaries may enter Rifting, and only after holding Divergent
/// classification with velocity above `split_velocity_threshold` for more
/// than half of `split_duration_threshold_my` (`RiftPropagation.cpp`:
/// `RelativeVelocity > SplitVelocityThreshold && DivergentDurationMy >
/// SplitDurationThreshold * 0.5`).
pub fn update_state(boundary: &mut PlateBoundary, split_velocity_threshold: f64, split_duration_threshold_my: f64, delta_my: f64) {
    let rel_speed = boundary.relative_velocity_rad_per_my.abs();
    boundary.active_duration_my += delta_my;

    if boundary.boundary_type == BoundaryType::Divergent {
        boundary.divergent_duration_my += delta_my;
    } else {
        boundary.divergent_duration_my = 0.0;
    }

    match (boundary.boundary_type, boundary.state) {
        (BoundaryType::Divergent, BoundaryState::Nascent | BoundaryState::Active) => {
            if rel_speed > split_velocity_threshold && boundary.divergent_duration_my > split_duration_threshold_my * 0.5 {
                boundary.state = BoundaryState::Rifting;
            } else if boundary.state == BoundaryState::Nascent {
                boundary.state = BoundaryState::Active;
            }
        }
        (BoundaryType::Divergent, BoundaryState::Rifting) => {
            // Hysteresis: velocity dropping below half the split threshold
            // de-rifts the boundary back to Active (not Dormant), preserving
            // `RiftWidthMeters` so a later re-acceleration resumes widening
            // from where it left off (`RiftPropagation.cpp`: "dormant rift"
            // sets `EBoundaryState::Active`).
            if rel_speed < split_velocity_threshold * 0.5 {
                boundary.state = BoundaryState::Active;
            }
        }
        (BoundaryType::Convergent | BoundaryType::Transform, BoundaryState::Active) => {
            if rel_speed < DORMANCY_VELOCITY_THRESHOLD_RAD_PER_MY && boundary.accumulated_stress_mpa < DORMANCY_STRESS_THRESHOLD_MPA {
                boundary.state = BoundaryState::Dormant;
            }
        }
        (_, BoundaryState::Nascent) => {
            boundary.state = BoundaryState::Active;
        }
        (_, BoundaryState::Rifting) => {
            // Only Divergent boundaries may be Rifting; reclassification away
            // from Divergent drops straight to Active.
            boundary.state = BoundaryState::Active;
        }
        _ => {}
    }
}

/// Grow `RiftWidthMeters` for a Rifting boundary: `ΔWidth = rate · |relvel| · Δt`.
pub fn propagate_rift(boundary: &mut PlateBoundary, rift_progression_rate: f64, delta_my: f64) {
    if boundary.state != BoundaryState::Rifting {
        return;
    }
    boundary.rift_width_meters += rift_progression_rate * boundary.relative_velocity_rad_per_my.abs() * delta_my;
}
