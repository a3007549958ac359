//! Triangle-walk equirectangular heightmap sampling (spec §4.13): given a
//! `(U, V)` in `[0,1]²`, resolve the containing render-mesh triangle by
//! seeding from the KD-tree-nearest triangle centroid and walking across
//! whichever edge carries the most negative barycentric weight, then
//! interpolate baseline or amplified elevation with the resulting
//! barycentrics.
//!
//! Grounded verbatim on `HeightmapSampling.cpp`'s `FHeightmapSampler`: the
//! edge-owner map for triangle adjacency, the plane-projected barycentric
//! computation, and the bounded 32-step walk with a best-candidate fallback.

use crate::kdtree::{MemoryUsage, SphericalKdTree};
use crate::mesh::RenderMesh;
use crate::sphere::Vec3;

/// Margin kept away from the poles so `lat = ±π/2` never produces a
/// degenerate longitude.
const POLE_AVOIDANCE_EPSILON: f64 = 1.0e-6;

const INSIDE_TOLERANCE: f64 = -1.0e-6;
const ACCEPTANCE_TOLERANCE: f64 = -1.0e-3;
const MAX_TRAVERSAL_STEPS: usize = 32;

/// Convert an equirectangular `(U, V) ∈ [0,1]²` to a unit direction:
/// `lon = 2π(U−0.5)`, `lat = π(0.5−V)`, with `V` clamped away from the poles.
pub fn direction_from_equirect_uv(u: f64, v: f64) -> Vec3 {
    let v = v.clamp(POLE_AVOIDANCE_EPSILON, 1.0 - POLE_AVOIDANCE_EPSILON);
    let lon = std::f64::consts::TAU * (u - 0.5);
    let lat = std::f64::consts::PI * (0.5 - v);
    Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

#[derive(Debug, Clone, Copy, Default)]
struct TriangleData {
    vertices: [u32; 3],
    /// Triangle index sharing each edge (`vertices[i]`, `vertices[(i+1)%3]`),
    /// or `u32::MAX` if the edge has no second owner (should not happen on a
    /// closed manifold mesh).
    neighbors: [u32; 3],
}

/// A point sample's full diagnostic payload: triangle hit, barycentrics, and
/// how many traversal steps the walk took to land there.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleInfo {
    pub hit: bool,
    pub triangle_index: Option<u32>,
    pub barycentrics: (f64, f64, f64),
    pub steps: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub triangle_data_bytes: usize,
    pub kd_tree: MemoryUsage,
}

/// Which per-vertex elevation array a sampler reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationSource {
    Baseline,
    Amplified,
}

/// Samples elevation at arbitrary equirectangular UVs by walking the render
/// mesh's triangle adjacency. Built once per (mesh, elevation-array) pair;
/// rebuild after any topology change or elevation-array swap.
pub struct HeightmapSampler {
    vertices: Vec<Vec3>,
    elevations: Vec<f64>,
    triangles: Vec<TriangleData>,
    triangle_search: SphericalKdTree,
    valid: bool,
}

impl HeightmapSampler {
    /// Build a sampler over `mesh`, reading `source` from the currently live
    /// fields. `baseline` and `amplified` must both be index-aligned with
    /// `mesh.vertices`; `amplified` may be empty if Stage-B has not run yet,
    /// in which case `source` is forced to `Baseline`.
    pub fn new(mesh: &RenderMesh, baseline: &[f64], amplified: &[f64], source: ElevationSource) -> Self {
        let use_amplified = source == ElevationSource::Amplified && amplified.len() == mesh.vertex_count();
        let elevations = if use_amplified { amplified.to_vec() } else { baseline.to_vec() };

        let triangle_count = mesh.faces.len();
        if mesh.vertices.is_empty() || triangle_count == 0 || baseline.len() != mesh.vertex_count() {
            return Self {
                vertices: mesh.vertices.clone(),
                elevations,
                triangles: Vec::new(),
                triangle_search: SphericalKdTree::new(),
                valid: false,
            };
        }

        // Edge-owner map: the first triangle to touch an undirected edge
        // registers as its owner; the second wires up both directions.
        let mut edge_owners: std::collections::HashMap<(u32, u32), (u32, u8)> = std::collections::HashMap::new();
        let mut triangles = vec![TriangleData { vertices: [0; 3], neighbors: [u32::MAX; 3] }; triangle_count];
        let mut centroids = Vec::with_capacity(triangle_count);
        let mut centroid_ids = Vec::with_capacity(triangle_count);

        for (tri_idx, face) in mesh.faces.iter().enumerate() {
            triangles[tri_idx].vertices = *face;

            let a = mesh.vertices[face[0] as usize];
            let b = mesh.vertices[face[1] as usize];
            let c = mesh.vertices[face[2] as usize];
            let centroid = Vec3::new(a.x + b.x + c.x, a.y + b.y + c.y, a.z + b.z + c.z).normalize();
            centroids.push(centroid);
            centroid_ids.push(tri_idx as u32);

            for edge in 0..3 {
                let va = face[edge];
                let vb = face[(edge + 1) % 3];
                let key = if va < vb { (va, vb) } else { (vb, va) };
                match edge_owners.get(&key) {
                    Some(&(other_tri, other_edge)) => {
                        triangles[other_tri as usize].neighbors[other_edge as usize] = tri_idx as u32;
                        triangles[tri_idx].neighbors[edge] = other_tri;
                    }
                    None => {
                        edge_owners.insert(key, (tri_idx as u32, edge as u8));
                    }
                }
            }
        }

        let triangle_search = SphericalKdTree::build(&centroids, &centroid_ids);

        Self { vertices: mesh.vertices.clone(), elevations, triangles, triangle_search, valid: !triangle_search.is_empty() }
    }

    /// Sample elevation at equirectangular `(u, v)`, returning the
    /// barycentric-interpolated value plus diagnostic [`SampleInfo`].
    pub fn sample(&self, u: f64, v: f64) -> (f64, SampleInfo) {
        let mut info = SampleInfo::default();
        if !self.valid {
            return (0.0, info);
        }

        let direction = direction_from_equirect_uv(u, v);
        match self.find_containing_triangle(direction) {
            Some((triangle_index, bary, steps)) => {
                info.hit = true;
                info.triangle_index = Some(triangle_index);
                info.barycentrics = bary;
                info.steps = steps;

                let tri = &self.triangles[triangle_index as usize];
                let e0 = self.elevations[tri.vertices[0] as usize];
                let e1 = self.elevations[tri.vertices[1] as usize];
                let e2 = self.elevations[tri.vertices[2] as usize];
                (bary.0 * e0 + bary.1 * e1 + bary.2 * e2, info)
            }
            None => (0.0, info),
        }
    }

    pub fn memory_stats(&self) -> MemoryStats {
        MemoryStats {
            vertex_count: self.vertices.len(),
            triangle_count: self.triangles.len(),
            triangle_data_bytes: self.triangles.len() * std::mem::size_of::<TriangleData>(),
            kd_tree: self.triangle_search.estimate_memory_usage(),
        }
    }

    fn triangle_barycentrics(&self, triangle_index: u32, direction: Vec3) -> Option<(f64, f64, f64)> {
        let tri = self.triangles.get(triangle_index as usize)?;
        let a = self.vertices[tri.vertices[0] as usize];
        let b = self.vertices[tri.vertices[1] as usize];
        let c = self.vertices[tri.vertices[2] as usize];

        let v0 = b.sub(a);
        let v1 = c.sub(a);
        let normal = v0.cross(v1);
        let normal_len_sq = normal.dot(normal);
        if normal_len_sq <= 1.0e-300 {
            return None;
        }

        let plane_distance = direction.sub(a).dot(normal) / normal_len_sq;
        let projected = direction.sub(normal.scale(plane_distance));
        let v2 = projected.sub(a);

        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);

        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < 1.0e-15 {
            return None;
        }

        let inv_denom = 1.0 / denom;
        let bv = (d11 * d20 - d01 * d21) * inv_denom;
        let bw = (d00 * d21 - d01 * d20) * inv_denom;
        let bu = 1.0 - bv - bw;
        Some((bu, bv, bw))
    }

    /// Seed from the KD-tree-nearest triangle centroid, then walk across the
    /// edge whose barycentric weight is most negative, up to
    /// `MAX_TRAVERSAL_STEPS` hops, tracking the best candidate seen so the
    /// walk can still return a usable (if imperfect) answer if it never
    /// lands cleanly inside a triangle.
    fn find_containing_triangle(&self, direction: Vec3) -> Option<(u32, (f64, f64, f64), u32)> {
        let (mut triangle_index, _) = self.triangle_search.find_nearest(direction)?;

        let mut previous_triangle = u32::MAX;
        let mut visited: Vec<u32> = vec![triangle_index];

        let mut best_score = f64::NEG_INFINITY;
        let mut best_triangle = u32::MAX;
        let mut best_bary = (0.0, 0.0, 0.0);

        let mut steps_taken = 0u32;
        while (steps_taken as usize) < MAX_TRAVERSAL_STEPS {
            let Some(bary) = self.triangle_barycentrics(triangle_index, direction) else {
                break;
            };

            let min_coord = bary.0.min(bary.1).min(bary.2);
            if min_coord > best_score {
                best_score = min_coord;
                best_triangle = triangle_index;
                best_bary = bary;
            }

            if min_coord >= INSIDE_TOLERANCE {
                return Some((triangle_index, bary, steps_taken + 1));
            }

            // Visit the most-negative edge first.
            let mut candidates = [(bary.0, 0u8), (bary.1, 1u8), (bary.2, 2u8)];
            candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

            let mut advanced = false;
            for &(weight, edge) in &candidates {
                if weight >= INSIDE_TOLERANCE {
                    continue;
                }
                let neighbor = self.triangles[triangle_index as usize].neighbors[edge as usize];
                if neighbor != u32::MAX && neighbor != previous_triangle && !visited.contains(&neighbor) {
                    previous_triangle = triangle_index;
                    triangle_index = neighbor;
                    visited.push(neighbor);
                    advanced = true;
                    break;
                }
            }

            steps_taken += 1;
            if !advanced {
                break;
            }
        }

        if best_triangle != u32::MAX && best_score >= ACCEPTANCE_TOLERANCE {
            let clamped = (best_bary.0.clamp(0.0, 1.0), best_bary.1.clamp(0.0, 1.0), best_bary.2.clamp(0.0, 1.0));
            let sum = clamped.0 + clamped.1 + clamped.2;
            let normalized = if sum > 1.0e-300 { (clamped.0 / sum, clamped.1 / sum, clamped.2 / sum) } else { clamped };
            return Some((best_triangle, normalized, steps_taken));
        }

        None
    }
}
