//! Closest-point and inside/outside queries against a polygon mesh.

use layer_types::{Aabb, Mesh, Point3, Triangle, Vector3};
use smallvec::SmallVec;

use crate::bvh::Bvh;
use crate::query::{closest_point_on_triangle, ray_triangle_intersect};

/// Result of a closest-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestHit {
    /// Closest point on the surface.
    pub point: Point3<f64>,
    /// Squared distance from the query point.
    pub distance_squared: f64,
    /// Index into [`FaceIndex::triangles`].
    pub triangle: usize,
    /// Source polygon in the indexed mesh.
    pub face: usize,
}

impl ClosestHit {
    /// Euclidean distance from the query point.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// Triangle BVH over a mesh's fan triangulation.
///
/// Queries run in the mesh's local frame.
#[derive(Debug)]
pub struct FaceIndex {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
    triangle_faces: Vec<u32>,
    normals: Vec<Vector3<f64>>,
    bvh: Bvh,
}

/// Jittered axes for parity ray casts; slightly off-axis so rays rarely run
/// exactly along grid-aligned edges.
const RAY_DIRECTIONS: [[f64; 3]; 3] = [
    [1.0, 1.3e-4, 0.7e-4],
    [0.9e-4, 1.0, 1.1e-4],
    [1.2e-4, 0.8e-4, 1.0],
];

impl FaceIndex {
    /// Index a mesh.
    #[must_use]
    pub fn new(mesh: &Mesh) -> Self {
        let (triangle_faces, triangles): (Vec<u32>, Vec<[u32; 3]>) = mesh
            .triangles_with_face()
            .map(|(fi, tri)| (fi as u32, tri))
            .unzip();
        let normals = triangles
            .iter()
            .map(|&t| mesh.triangle(t).normal().unwrap_or_else(Vector3::zeros))
            .collect();
        let bvh = Bvh::from_mesh(mesh);
        Self {
            vertices: mesh.vertices.clone(),
            triangles,
            triangle_faces,
            normals,
            bvh,
        }
    }

    /// Check if the index holds no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Indexed triangles.
    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Indexed vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Resolve a triangle's positions.
    #[must_use]
    pub fn triangle(&self, index: usize) -> Triangle {
        let [a, b, c] = self.triangles[index];
        Triangle::new(
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    /// Source polygon of a triangle.
    #[must_use]
    pub fn triangle_face(&self, index: usize) -> usize {
        self.triangle_faces[index] as usize
    }

    /// Unit normal of a triangle (zero for degenerate ones).
    #[must_use]
    pub fn triangle_normal(&self, index: usize) -> Vector3<f64> {
        self.normals[index]
    }

    /// Bounding box of all triangles.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bvh.root_bbox().copied().unwrap_or_default()
    }

    /// Triangles whose boxes overlap `query` grown by `tolerance`.
    #[must_use]
    pub fn query(&self, query: &Aabb, tolerance: f64) -> Vec<u32> {
        self.bvh.query(query, tolerance)
    }

    fn closest_on(&self, point: &Point3<f64>, index: u32) -> Point3<f64> {
        let [a, b, c] = self.triangles[index as usize];
        closest_point_on_triangle(
            point,
            &self.vertices[a as usize],
            &self.vertices[b as usize],
            &self.vertices[c as usize],
        )
    }

    /// Closest point on the surface. `None` for an empty index.
    #[must_use]
    pub fn closest(&self, point: &Point3<f64>) -> Option<ClosestHit> {
        let (item, distance_squared) = self
            .bvh
            .nearest(point, |i| (point - self.closest_on(point, i)).norm_squared())?;
        Some(ClosestHit {
            point: self.closest_on(point, item),
            distance_squared,
            triangle: item as usize,
            face: self.triangle_faces[item as usize] as usize,
        })
    }

    /// Unsigned distance to the surface.
    #[must_use]
    pub fn distance(&self, point: &Point3<f64>) -> Option<f64> {
        self.closest(point).map(|hit| hit.distance())
    }

    /// Signed distance, negative inside.
    ///
    /// The sign comes from the normal of the nearest triangle. When several
    /// triangles are (nearly) equidistant, which happens whenever the closest
    /// point is on a shared edge or vertex, the one whose normal is most
    /// aligned with the query direction decides.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> Option<f64> {
        let hit = self.closest(point)?;
        let distance = hit.distance();
        if distance <= f64::EPSILON {
            return Some(0.0);
        }

        let slack = distance * 1e-6 + 1e-12;
        let radius_sq = (distance + slack) * (distance + slack);
        let ties: SmallVec<[(u32, f64); 8]> = self
            .bvh
            .within(point, radius_sq, |i| {
                (point - self.closest_on(point, i)).norm_squared()
            })
            .into_iter()
            .collect();

        let mut best_alignment = -1.0;
        let mut sign = 1.0;
        for (item, _) in ties {
            let dir = point - self.closest_on(point, item);
            let Some(dir) = dir.try_normalize(f64::MIN_POSITIVE) else {
                continue;
            };
            let along = dir.dot(&self.normals[item as usize]);
            if along.abs() > best_alignment {
                best_alignment = along.abs();
                sign = if along < 0.0 { -1.0 } else { 1.0 };
            }
        }
        Some(sign * distance)
    }

    /// Count surface crossings of the half-line `origin + t * dir`.
    ///
    /// Hits at (almost) the same parameter are merged so a ray through a
    /// shared edge is counted once.
    #[must_use]
    pub fn ray_crossings(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> usize {
        let mut hits: Vec<f64> = self
            .bvh
            .ray_candidates(origin, dir)
            .into_iter()
            .filter_map(|i| {
                let [a, b, c] = self.triangles[i as usize];
                ray_triangle_intersect(
                    origin,
                    dir,
                    &self.vertices[a as usize],
                    &self.vertices[b as usize],
                    &self.vertices[c as usize],
                )
            })
            .collect();
        hits.sort_unstable_by(f64::total_cmp);
        hits.dedup_by(|a, b| (*a - *b).abs() <= 1e-10 * (1.0 + b.abs()));
        hits.len()
    }

    /// Inside test by parity, majority vote over three skewed axes.
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        if self.is_empty() || !self.bounds().contains(point) {
            return false;
        }
        let inside_votes = RAY_DIRECTIONS
            .iter()
            .filter(|d| {
                let dir = Vector3::new(d[0], d[1], d[2]);
                self.ray_crossings(point, &dir) % 2 == 1
            })
            .count();
        inside_votes >= 2
    }
}
