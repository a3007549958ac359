//! The render mesh: vertex positions plus a CSR (compressed-sparse-row)
//! adjacency structure used by erosion slope, sediment diffusion, and
//! oceanic dampening's smoothing pass.

use crate::icosphere::IcosphereMesh;
use crate::sphere::{great_circle_distance_rad, Vec3};

/// CSR adjacency over mesh vertices: neighbor `v`'s indices live in
/// `indices[offsets[v]..offsets[v+1]]`.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    pub offsets: Vec<u32>,
    pub indices: Vec<u32>,
    /// Gaussian adjacency weights (per-neighbor), precomputed once per
    /// topology, used by the oceanic dampening smoothing pass (spec C9).
    pub weights: Vec<f64>,
    /// Sum of `weights` in each vertex's row plus the vertex's own
    /// self-weight (1.0), precomputed so the smoothing pass is a single
    /// weighted-average divide per vertex.
    pub weight_totals: Vec<f64>,
}

impl Adjacency {
    pub fn neighbors(&self, vertex: u32) -> &[u32] {
        let start = self.offsets[vertex as usize] as usize;
        let end = self.offsets[vertex as usize + 1] as usize;
        &self.indices[start..end]
    }

    pub fn neighbor_weights(&self, vertex: u32) -> &[f64] {
        let start = self.offsets[vertex as usize] as usize;
        let end = self.offsets[vertex as usize + 1] as usize;
        &self.weights[start..end]
    }
}

#[derive(Debug, Clone)]
pub struct RenderMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
    pub adjacency: Adjacency,
}

impl RenderMesh {
    pub fn from_icosphere(level: u32) -> Self {
        let ico = IcosphereMesh::generate(level);
        Self::from_vertices_and_faces(ico.vertices, ico.faces)
    }

    pub fn from_vertices_and_faces(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        let adjacency = build_adjacency(&vertices, &faces);
        Self { vertices, faces, adjacency }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Maximum |Δelevation| / geodesic-distance-in-meters to any neighbor,
    /// i.e. `ComputeVertexSlope` from the original erosion pass.
    pub fn max_slope(&self, vertex: u32, elevations: &[f64], planet_radius_m: f64) -> f64 {
        let neighbors = self.adjacency.neighbors(vertex);
        if neighbors.is_empty() {
            return 0.0;
        }
        let here = self.vertices[vertex as usize];
        let elev_here = elevations[vertex as usize];
        let mut max_slope = 0.0_f64;
        for &n in neighbors {
            let run_m = great_circle_distance_rad(here, self.vertices[n as usize]) * planet_radius_m;
            if run_m < 1e-6 {
                continue;
            }
            let rise = (elevations[n as usize] - elev_here).abs();
            max_slope = max_slope.max(rise / run_m);
        }
        max_slope
    }
}

/// Build CSR adjacency (with Gaussian weights, sigma ≈ 0.1 rad) from a face
/// list, deduplicating shared edges between adjacent triangles.
fn build_adjacency(vertices: &[Vec3], faces: &[[u32; 3]]) -> Adjacency {
    const SIGMA: f64 = 0.1;

    let mut neighbor_sets: Vec<Vec<u32>> = vec![Vec::new(); vertices.len()];
    for face in faces {
        for i in 0..3 {
            let a = face[i];
            let b = face[(i + 1) % 3];
            if !neighbor_sets[a as usize].contains(&b) {
                neighbor_sets[a as usize].push(b);
            }
            if !neighbor_sets[b as usize].contains(&a) {
                neighbor_sets[b as usize].push(a);
            }
        }
    }

    let mut offsets = Vec::with_capacity(vertices.len() + 1);
    let mut indices = Vec::new();
    let mut weights = Vec::new();
    let mut weight_totals = Vec::with_capacity(vertices.len());
    offsets.push(0u32);

    for (v, neighbors) in neighbor_sets.iter().enumerate() {
        let mut sorted = neighbors.clone();
        sorted.sort_unstable();
        let here = vertices[v];
        let mut row_total = 1.0; // self-weight
        for &n in &sorted {
            let d = great_circle_distance_rad(here, vertices[n as usize]);
            let w = (-(d * d) / (2.0 * SIGMA * SIGMA)).exp();
            weights.push(w);
            row_total += w;
            indices.push(n);
        }
        weight_totals.push(row_total);
        offsets.push(indices.len() as u32);
    }

    Adjacency { offsets, indices, weights, weight_totals }
}
