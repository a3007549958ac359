//! Icosphere generation: a regular icosahedron subdivided onto the unit
//! sphere. Vertex/face counts follow `V = 10*4^L + 2`, `F = 20*4^L` for
//! subdivision level `L`.

use crate::sphere::Vec3;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct IcosphereMesh {
    pub vertices: Vec<Vec3>,
    /// Each face is three indices into `vertices`, wound consistently.
    pub faces: Vec<[u32; 3]>,
}

impl IcosphereMesh {
    pub fn expected_vertex_count(level: u32) -> usize {
        10 * 4usize.pow(level) + 2
    }

    pub fn expected_face_count(level: u32) -> usize {
        20 * 4usize.pow(level)
    }

    /// Generate the base icosahedron (level 0: 12 vertices, 20 faces).
    pub fn base() -> Self {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let raw = [
            (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
            (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
            (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
        ];
        let vertices: Vec<Vec3> = raw.iter().map(|&(x, y, z)| Vec3::new(x, y, z).normalize()).collect();

        let faces: Vec<[u32; 3]> = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];

        Self { vertices, faces }
    }

    /// Generate an icosphere subdivided `level` times.
    pub fn generate(level: u32) -> Self {
        let mut mesh = Self::base();
        for _ in 0..level {
            mesh = mesh.subdivide_once();
        }
        debug_assert_eq!(mesh.vertices.len(), Self::expected_vertex_count(level));
        debug_assert_eq!(mesh.faces.len(), Self::expected_face_count(level));
        mesh
    }

    fn subdivide_once(&self) -> Self {
        let mut vertices = self.vertices.clone();
        let mut midpoint_cache: HashMap<(u32, u32), u32> = HashMap::new();
        let mut faces = Vec::with_capacity(self.faces.len() * 4);

        let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vec3>| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            if let Some(&idx) = midpoint_cache.get(&key) {
                return idx;
            }
            let mid = Vec3 {
                x: (vertices[a as usize].x + vertices[b as usize].x) * 0.5,
                y: (vertices[a as usize].y + vertices[b as usize].y) * 0.5,
                z: (vertices[a as usize].z + vertices[b as usize].z) * 0.5,
            }
            .normalize();
            let idx = vertices.len() as u32;
            vertices.push(mid);
            midpoint_cache.insert(key, idx);
            idx
        };

        for face in &self.faces {
            let [a, b, c] = *face;
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            faces.push([a, ab, ca]);
            faces.push([b, bc, ab]);
            faces.push([c, ca, bc]);
            faces.push([ab, bc, ca]);
        }

        Self { vertices, faces }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_icosahedron_counts() {
        let mesh = IcosphereMesh::base();
        assert_eq!(mesh.vertices.len(), 12);
        assert_eq!(mesh.faces.len(), 20);
    }

    #[test]
    fn all_vertices_are_unit_length() {
        let mesh = IcosphereMesh::generate(2);
        for v in &mesh.vertices {
            assert!((v.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn subdivision_matches_expected_counts() {
        for level in 0..4 {
            let mesh = IcosphereMesh::generate(level);
            assert_eq!(mesh.vertices.len(), IcosphereMesh::expected_vertex_count(level));
            assert_eq!(mesh.faces.len(), IcosphereMesh::expected_face_count(level));
        }
    }

    #[test]
    fn euler_characteristic_is_two() {
        // V - E + F = 2 for a closed manifold sphere. E = 3F/2 for a triangle mesh.
        for level in 0..3 {
            let mesh = IcosphereMesh::generate(level);
            let v = mesh.vertices.len() as i64;
            let f = mesh.faces.len() as i64;
            let e = 3 * f / 2;
            assert_eq!(v - e + f, 2);
        }
    }

    #[test]
    fn midpoints_are_shared_not_duplicated() {
        // If midpoint caching failed, level-1 vertex count would overshoot 42.
        let mesh = IcosphereMesh::generate(1);
        assert_eq!(mesh.vertices.len(), 42);
    }
}
