//! Signed distance field over a polygon mesh.

use layer_repair::find_components;
use layer_spatial::FaceIndex;
use layer_types::{Aabb, Mesh, Point3};
use tracing::debug;

use crate::error::{VolumeError, VolumeResult};
use crate::grid::ScalarGrid;

/// Signed distance to a polygon mesh, negative inside.
///
/// Distances are exact (closest point on the triangulated surface through a
/// BVH); the sign follows the outward normal of the nearest triangle, so the
/// field expects outward-wound input. Queries run in the mesh's local frame.
///
/// A mesh with several edge-connected parts is treated as their union: a
/// point inside any part is inside, even when the nearest surface belongs to
/// a part it lies outside of. Skin that pokes into a garment therefore adds
/// no surface of its own.
#[derive(Debug)]
pub struct SignedDistanceField {
    index: FaceIndex,
    /// Per-part indices, only built when there is more than one part.
    parts: Vec<Part>,
}

#[derive(Debug)]
struct Part {
    bounds: Aabb,
    index: FaceIndex,
}

impl SignedDistanceField {
    /// Build the field for `mesh`.
    ///
    /// An empty mesh yields a field that is `+inf` everywhere.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::NonFiniteVertex`] if a vertex holds NaN or an
    /// infinite coordinate.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_volume::SignedDistanceField;
    /// use layer_types::{uv_sphere, Point3};
    ///
    /// let sdf = SignedDistanceField::new(&uv_sphere(1.0, 32, 16)).unwrap();
    /// assert!(sdf.distance(&Point3::origin()) < -0.9);
    /// assert!(sdf.distance(&Point3::new(0.0, 0.0, 3.0)) > 1.9);
    /// ```
    pub fn new(mesh: &Mesh) -> VolumeResult<Self> {
        if let Some(index) = mesh
            .vertices
            .iter()
            .position(|v| !v.coords.iter().all(|c| c.is_finite()))
        {
            return Err(VolumeError::NonFiniteVertex { index });
        }
        let components = find_components(mesh);
        let parts: Vec<Part> = if components.len() > 1 {
            components
                .iter()
                .map(|faces| {
                    let index = FaceIndex::new(&mesh.extract_faces(faces));
                    Part {
                        bounds: index.bounds(),
                        index,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };
        debug!(parts = parts.len().max(1), "signed distance field");
        Ok(Self {
            index: FaceIndex::new(mesh),
            parts,
        })
    }

    /// Check if the underlying mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bounding box of the surface.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.index.bounds()
    }

    /// Signed distance at a point.
    ///
    /// Inside the union the value is the deepest per-part distance; outside
    /// it is the distance to the nearest surface.
    #[must_use]
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        if self.parts.is_empty() {
            return self.index.signed_distance(point).unwrap_or(f64::INFINITY);
        }
        let depth = self
            .parts
            .iter()
            .filter(|part| part.bounds.contains(point))
            .filter_map(|part| part.index.signed_distance(point))
            .filter(|&d| d < 0.0)
            .reduce(f64::min);
        match depth {
            Some(depth) => depth,
            None => self.unsigned_distance(point),
        }
    }

    /// Distance to the surface, ignoring the side.
    #[must_use]
    pub fn unsigned_distance(&self, point: &Point3<f64>) -> f64 {
        self.index.distance(point).unwrap_or(f64::INFINITY)
    }

    /// Check if a point is inside the surface.
    #[must_use]
    pub fn is_inside(&self, point: &Point3<f64>) -> bool {
        self.distance(point) < 0.0
    }

    /// Sample the field on a grid covering the surface plus `padding` cells.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::GridTooLarge`] when the grid would exceed
    /// `max_cells` points.
    pub fn sample(&self, cell_size: f64, padding: usize, max_cells: usize) -> VolumeResult<ScalarGrid> {
        let mut grid = ScalarGrid::from_bounds(&self.bounds(), cell_size, padding, max_cells)?;
        debug!(
            dimensions = ?grid.dimensions(),
            points = grid.len(),
            cell_size,
            "sampling signed distance"
        );
        grid.fill(|p| self.distance(&p));
        Ok(grid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_types::box_mesh;

    #[test]
    fn cube_distances() {
        let cube = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let sdf = SignedDistanceField::new(&cube).unwrap();
        assert_relative_eq!(sdf.distance(&Point3::origin()), -1.0, epsilon = 1e-9);
        assert_relative_eq!(sdf.distance(&Point3::new(3.0, 0.0, 0.0)), 2.0, epsilon = 1e-9);
        assert_relative_eq!(
            sdf.unsigned_distance(&Point3::new(0.0, 0.5, 0.0)),
            0.5,
            epsilon = 1e-9
        );
        assert!(sdf.is_inside(&Point3::new(0.9, 0.9, 0.9)));
    }

    #[test]
    fn overlapping_parts_sample_as_union() {
        let mut mesh = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        mesh.append(&box_mesh(
            Point3::new(0.5, -1.2, -1.2),
            Point3::new(1.5, 1.2, 1.2),
        ));
        let sdf = SignedDistanceField::new(&mesh).unwrap();

        // Nearest face is the first box's +x side, seen from outside
        let tucked = Point3::new(1.05, 0.0, 0.0);
        assert_relative_eq!(sdf.unsigned_distance(&tucked), 0.05, epsilon = 1e-9);
        assert_relative_eq!(sdf.distance(&tucked), -0.45, epsilon = 1e-9);

        assert_relative_eq!(sdf.distance(&Point3::origin()), -1.0, epsilon = 1e-9);
        assert_relative_eq!(sdf.distance(&Point3::new(2.0, 0.0, 0.0)), 0.5, epsilon = 1e-9);
        assert!(!sdf.is_inside(&Point3::new(-1.5, 0.0, 0.0)));
    }

    #[test]
    fn empty_mesh_is_outside_everywhere() {
        let sdf = SignedDistanceField::new(&Mesh::new()).unwrap();
        assert!(sdf.is_empty());
        assert!(sdf.distance(&Point3::origin()).is_infinite());
    }

    #[test]
    fn non_finite_vertex_rejected() {
        let mut cube = box_mesh(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        cube.vertices[3].y = f64::NAN;
        assert!(matches!(
            SignedDistanceField::new(&cube),
            Err(VolumeError::NonFiniteVertex { index: 3 })
        ));
    }

    #[test]
    fn sampled_grid_has_outside_border() {
        let cube = box_mesh(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let grid = SignedDistanceField::new(&cube)
            .unwrap()
            .sample(0.25, 2, 1 << 20)
            .unwrap();
        let (nx, ny, nz) = grid.dimensions();
        assert!(grid.get(0, 0, 0) > 0.0);
        assert!(grid.get(nx - 1, ny - 1, nz - 1) > 0.0);
        assert!(grid.get(nx / 2, ny / 2, nz / 2) < 0.0);
    }
}
