//! Edge and vertex adjacency for polygon meshes.

use hashbrown::HashMap;
use layer_types::{face_edges, Face};

/// Adjacency information for a polygon mesh.
///
/// Provides lookups for:
/// - Faces adjacent to an (undirected) edge
/// - Faces adjacent to a vertex
/// - Boundary edges (one adjacent face)
/// - Non-manifold edges (more than two adjacent faces)
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1), v0 < v1, to the faces using it.
    edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
    /// Maps vertex index to the faces using it.
    vertex_to_faces: HashMap<u32, Vec<usize>>,
}

impl MeshAdjacency {
    /// Build adjacency information from polygon faces.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_repair::MeshAdjacency;
    /// use layer_types::Face;
    ///
    /// let faces: Vec<Face> = vec![Face::from_slice(&[0, 1, 2]), Face::from_slice(&[1, 3, 2])];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert_eq!(adj.faces_for_edge(2, 1), Some(&[0, 1][..]));
    /// ```
    #[must_use]
    pub fn build(faces: &[Face]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        let mut vertex_to_faces: HashMap<u32, Vec<usize>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_to_faces.entry(v).or_default().push(face_idx);
            }
            for (a, b) in face_edges(face) {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(face_idx);
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
        }
    }

    /// Faces adjacent to an edge, `None` if the edge does not exist.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Faces adjacent to a vertex.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[usize] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Edges used by exactly one face.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    /// Number of edges used by more than two faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() > 2).count()
    }

    /// Every edge has at most two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edge_count() == 0
    }

    /// Manifold with no boundary edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|f| f.len() == 2)
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// For each face, the faces sharing an edge with it, sorted and deduplicated.
    ///
    /// With `manifold_only`, only edges shared by exactly two faces connect.
    #[must_use]
    pub fn face_neighbors(&self, faces: &[Face], manifold_only: bool) -> Vec<Vec<usize>> {
        faces
            .iter()
            .enumerate()
            .map(|(fi, face)| {
                let mut neighbors: Vec<usize> = face_edges(face)
                    .filter_map(|(a, b)| self.faces_for_edge(a, b))
                    .filter(|shared| !manifold_only || shared.len() == 2)
                    .flat_map(|shared| shared.iter().copied())
                    .filter(|&other| other != fi)
                    .collect();
                neighbors.sort_unstable();
                neighbors.dedup();
                neighbors
            })
            .collect()
    }
}

/// Normalize an edge so the smaller index comes first.
#[inline]
pub(crate) fn normalize_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::{box_mesh, Point3};

    #[test]
    fn closed_box_is_watertight() {
        let cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let adj = MeshAdjacency::build(&cube.faces);
        assert!(adj.is_watertight());
        assert!(adj.is_manifold());
        assert_eq!(adj.edge_count(), 12);
        assert_eq!(adj.faces_for_vertex(0).len(), 3);
    }

    #[test]
    fn open_box_has_boundary() {
        let mut cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        cube.faces.pop();
        let adj = MeshAdjacency::build(&cube.faces);
        assert!(!adj.is_watertight());
        assert_eq!(adj.boundary_edge_count(), 4);
    }

    #[test]
    fn neighbors_skip_non_manifold_edges() {
        // Three triangles fanning around edge 0-1
        let faces: Vec<Face> = vec![
            Face::from_slice(&[0, 1, 2]),
            Face::from_slice(&[1, 0, 3]),
            Face::from_slice(&[0, 1, 4]),
        ];
        let adj = MeshAdjacency::build(&faces);
        assert_eq!(adj.non_manifold_edge_count(), 1);

        let all = adj.face_neighbors(&faces, false);
        assert_eq!(all[0], vec![1, 2]);
        let manifold = adj.face_neighbors(&faces, true);
        assert!(manifold[0].is_empty());
    }
}
