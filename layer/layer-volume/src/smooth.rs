//! Laplacian mesh smoothing.
//!
//! Each pass moves every vertex toward the centroid of its edge-connected
//! neighbours:
//!
//! ```text
//! v_new = v + lambda * (centroid(N(v)) - v)
//! ```
//!
//! Passes are Jacobi style: all new positions are computed from the previous
//! pass before any is written. Repeated passes shrink and round the surface.

use hashbrown::HashSet;
use layer_repair::MeshAdjacency;
use layer_types::{face_edges, Mesh, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{VolumeError, VolumeResult};

/// Parameters for Laplacian smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothParams {
    /// Number of passes. Zero leaves the mesh untouched.
    pub iterations: u32,
    /// Diffusion factor for interior vertices, in `(0, 1]`.
    pub lambda: f64,
    /// Diffusion factor for vertices on boundary edges, in `[0, 1]`.
    /// `None` uses `lambda`.
    pub border_lambda: Option<f64>,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 12,
            lambda: 0.2,
            border_lambda: None,
        }
    }
}

impl SmoothParams {
    /// Smoothing with the given pass count and factor.
    #[must_use]
    pub fn new(iterations: u32, lambda: f64) -> Self {
        Self {
            iterations,
            lambda,
            border_lambda: None,
        }
    }

    /// Gentle finishing pass used after carving.
    #[must_use]
    pub fn finishing(iterations: u32) -> Self {
        Self::new(iterations, 0.15)
    }

    /// Set a separate factor for boundary vertices (`0.0` pins them).
    #[must_use]
    pub fn with_border_lambda(mut self, border_lambda: f64) -> Self {
        self.border_lambda = Some(border_lambda);
        self
    }

    /// Factor applied to boundary vertices.
    #[must_use]
    pub fn effective_border_lambda(&self) -> f64 {
        self.border_lambda.unwrap_or(self.lambda)
    }

    /// Check the factors are in range.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] for `lambda` outside
    /// `(0, 1]` or `border_lambda` outside `[0, 1]`.
    pub fn validate(&self) -> VolumeResult<()> {
        if !(self.lambda > 0.0 && self.lambda <= 1.0) {
            return Err(VolumeError::invalid(
                "smooth_lambda",
                self.lambda,
                "must be in (0, 1]",
            ));
        }
        if let Some(border) = self.border_lambda {
            if !(0.0..=1.0).contains(&border) {
                return Err(VolumeError::invalid(
                    "border_lambda",
                    border,
                    "must be in [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

/// Statistics from a smoothing run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothResult {
    /// Number of passes performed.
    pub iterations_performed: u32,
    /// Largest single-vertex displacement across all passes.
    pub max_displacement: f64,
}

/// Smooth `mesh` in place.
///
/// Isolated vertices stay where they are.
///
/// # Errors
///
/// Returns [`VolumeError::InvalidParameter`] if `params` fails
/// [`SmoothParams::validate`]; the mesh is untouched in that case.
///
/// # Example
///
/// ```
/// use layer_volume::{smooth_laplacian, SmoothParams};
/// use layer_types::{box_mesh, Point3};
///
/// let mut cube = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
/// let before = cube.signed_volume();
///
/// let result = smooth_laplacian(&mut cube, &SmoothParams::new(3, 0.5)).unwrap();
/// assert_eq!(result.iterations_performed, 3);
/// assert!(cube.signed_volume() < before);
/// ```
pub fn smooth_laplacian(mesh: &mut Mesh, params: &SmoothParams) -> VolumeResult<SmoothResult> {
    params.validate()?;
    if params.iterations == 0 || mesh.faces.is_empty() {
        return Ok(SmoothResult::default());
    }

    let neighbors = vertex_neighbors(mesh);
    let boundary = boundary_vertices(mesh);
    let lambdas: Vec<f64> = (0..mesh.vertices.len())
        .map(|i| {
            if boundary.contains(&(i as u32)) {
                params.effective_border_lambda()
            } else {
                params.lambda
            }
        })
        .collect();

    let mut max_displacement = 0.0_f64;
    for _ in 0..params.iterations {
        let current = &mesh.vertices;
        let displacements: Vec<Vector3<f64>> = (0..current.len())
            .into_par_iter()
            .map(|i| {
                let ring = &neighbors[i];
                if ring.is_empty() {
                    return Vector3::zeros();
                }
                let sum: Vector3<f64> = ring.iter().map(|&n| current[n as usize].coords).sum();
                let centroid = sum / ring.len() as f64;
                (centroid - current[i].coords) * lambdas[i]
            })
            .collect();

        for (v, d) in mesh.vertices.iter_mut().zip(&displacements) {
            max_displacement = max_displacement.max(d.norm());
            *v += *d;
        }
    }

    debug!(
        iterations = params.iterations,
        lambda = params.lambda,
        boundary_vertices = boundary.len(),
        max_displacement,
        "laplacian smoothing"
    );

    Ok(SmoothResult {
        iterations_performed: params.iterations,
        max_displacement,
    })
}

/// Sorted, deduplicated edge neighbours of every vertex.
fn vertex_neighbors(mesh: &Mesh) -> Vec<Vec<u32>> {
    let mut neighbors = vec![Vec::new(); mesh.vertices.len()];
    for face in &mesh.faces {
        for (a, b) in face_edges(face) {
            if a != b {
                neighbors[a as usize].push(b);
                neighbors[b as usize].push(a);
            }
        }
    }
    for ring in &mut neighbors {
        ring.sort_unstable();
        ring.dedup();
    }
    neighbors
}

/// Vertices touching an edge used by exactly one face.
fn boundary_vertices(mesh: &Mesh) -> HashSet<u32> {
    MeshAdjacency::build(&mesh.faces)
        .boundary_edges()
        .flat_map(|(a, b)| [a, b])
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_types::{uv_sphere, Point3};

    fn open_grid() -> Mesh {
        // 3x3 vertices, 2x2 quads in the z=0 plane, centre lifted
        let mut vertices = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                vertices.push(Point3::new(f64::from(x), f64::from(y), 0.0));
            }
        }
        vertices[4].z = 1.0;
        let faces = vec![
            layer_types::Face::from_slice(&[0, 1, 4, 3]),
            layer_types::Face::from_slice(&[1, 2, 5, 4]),
            layer_types::Face::from_slice(&[3, 4, 7, 6]),
            layer_types::Face::from_slice(&[4, 5, 8, 7]),
        ];
        Mesh::from_parts(vertices, faces)
    }

    #[test]
    fn zero_iterations_is_noop() {
        let mut mesh = uv_sphere(1.0, 12, 6);
        let before = mesh.clone();
        let result = smooth_laplacian(&mut mesh, &SmoothParams::new(0, 0.5)).unwrap();
        assert_eq!(result.iterations_performed, 0);
        assert_eq!(mesh, before);
    }

    #[test]
    fn invalid_lambda_rejected_without_mutation() {
        let mut mesh = uv_sphere(1.0, 12, 6);
        let before = mesh.clone();
        for lambda in [0.0, -0.1, 1.5, f64::NAN] {
            let err = smooth_laplacian(&mut mesh, &SmoothParams::new(3, lambda)).unwrap_err();
            assert!(matches!(err, VolumeError::InvalidParameter { .. }));
        }
        assert!(SmoothParams::new(1, 0.5)
            .with_border_lambda(2.0)
            .validate()
            .is_err());
        assert_eq!(mesh, before);
    }

    #[test]
    fn sphere_shrinks() {
        let mut mesh = uv_sphere(1.0, 24, 12);
        let volume = mesh.signed_volume();
        let result = smooth_laplacian(&mut mesh, &SmoothParams::new(10, 0.3)).unwrap();
        assert!(mesh.signed_volume() < volume);
        assert!(result.max_displacement > 0.0);
        assert_eq!(mesh.face_count(), uv_sphere(1.0, 24, 12).face_count());
    }

    #[test]
    fn pinned_border_only_moves_interior() {
        let mut mesh = open_grid();
        let params = SmoothParams::new(1, 0.5).with_border_lambda(0.0);
        smooth_laplacian(&mut mesh, &params).unwrap();

        assert_relative_eq!(mesh.vertices[0], Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(mesh.vertices[8], Point3::new(2.0, 2.0, 0.0));
        // Centre has four neighbours at z=0
        assert_relative_eq!(mesh.vertices[4].z, 0.5);
    }

    #[test]
    fn border_follows_lambda_by_default() {
        let mut mesh = open_grid();
        smooth_laplacian(&mut mesh, &SmoothParams::new(1, 0.5)).unwrap();
        // Vertex 1 neighbours: 0, 2, 4 -> centroid z = 1/3
        assert_relative_eq!(mesh.vertices[1].z, 0.5 / 3.0);
    }
}
