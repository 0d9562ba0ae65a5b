//! Connected-component splitting.

use std::collections::VecDeque;

use layer_types::Mesh;
use tracing::debug;

use crate::adjacency::MeshAdjacency;

/// A connected component extracted as a standalone mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Order in which the component was discovered, counting discarded ones.
    pub discovery_index: usize,
    /// Lowest vertex index of the component in the source mesh.
    pub lowest_vertex: u32,
    /// Source faces, ascending.
    pub faces: Vec<usize>,
    /// Compacted copy carrying transform, attributes and material slots.
    pub mesh: Mesh,
}

/// Face sets of the edge-connected components of a mesh.
///
/// Components are discovered by scanning faces in ascending order; each set
/// is sorted ascending.
#[must_use]
pub fn find_components(mesh: &Mesh) -> Vec<Vec<usize>> {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let neighbors = adjacency.face_neighbors(&mesh.faces, false);

    let mut visited = vec![false; mesh.faces.len()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut faces = Vec::new();
        while let Some(current) = queue.pop_front() {
            faces.push(current);
            for &next in &neighbors[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        faces.sort_unstable();
        components.push(faces);
    }
    components
}

/// Split a mesh into edge-connected components.
///
/// Components with fewer than `min_vertex_count` distinct vertices are
/// discarded. The survivors are ordered by their lowest source vertex index;
/// components that share a lowest vertex (they touch only at that vertex)
/// keep their discovery order.
///
/// # Example
///
/// ```
/// use layer_repair::ComponentSplitter;
/// use layer_types::{box_mesh, Point3};
///
/// let mut mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// mesh.append(&box_mesh(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0)));
///
/// let parts = ComponentSplitter::new(8).split(&mesh);
/// assert_eq!(parts.len(), 2);
/// assert_eq!(parts[1].lowest_vertex, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSplitter {
    /// Minimum vertex count for a component to be kept.
    pub min_vertex_count: usize,
}

impl Default for ComponentSplitter {
    fn default() -> Self {
        Self {
            min_vertex_count: 2000,
        }
    }
}

impl ComponentSplitter {
    /// Splitter with the given threshold.
    #[must_use]
    pub fn new(min_vertex_count: usize) -> Self {
        Self { min_vertex_count }
    }

    /// Split `mesh`.
    #[must_use]
    pub fn split(&self, mesh: &Mesh) -> Vec<Component> {
        split_components(mesh, self.min_vertex_count)
    }
}

/// See [`ComponentSplitter`].
#[must_use]
pub fn split_components(mesh: &Mesh, min_vertex_count: usize) -> Vec<Component> {
    let found = find_components(mesh);
    let total = found.len();

    let mut kept: Vec<Component> = found
        .into_iter()
        .enumerate()
        .filter_map(|(discovery_index, faces)| {
            let mut vertices: Vec<u32> = faces
                .iter()
                .flat_map(|&fi| mesh.faces[fi].iter().copied())
                .collect();
            vertices.sort_unstable();
            vertices.dedup();
            if vertices.len() < min_vertex_count {
                return None;
            }
            let lowest_vertex = vertices.first().copied()?;
            Some(Component {
                discovery_index,
                lowest_vertex,
                mesh: mesh.extract_faces(&faces),
                faces,
            })
        })
        .collect();
    kept.sort_by_key(|c| (c.lowest_vertex, c.discovery_index));

    debug!(
        components = total,
        kept = kept.len(),
        min_vertex_count,
        "split into components"
    );
    kept
}
