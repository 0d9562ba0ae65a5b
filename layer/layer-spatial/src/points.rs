//! Nearest-vertex lookup backed by a k-d tree.

use std::cmp::Ordering;

use kiddo::{KdTree, SquaredEuclidean};
use layer_types::{Mesh, Point3};
use nalgebra::Rotation3;
use rayon::prelude::*;

/// A nearest-neighbour result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the point set the index was built from.
    pub index: usize,
    /// Euclidean distance to the query point.
    pub distance: f64,
}

/// k-d tree over a point set.
///
/// Built once from a slice. Mesh vertices often share a coordinate on an
/// axis (sphere rings, grid-aligned remesh output), which overflows the
/// tree's fixed-size buckets. Points are therefore stored in a rotated
/// frame where that no longer happens, and coincident points are stored
/// once under the lowest index. Reported distances are measured between
/// the original positions.
///
/// # Example
///
/// ```
/// use layer_spatial::SpatialIndex;
/// use layer_types::Point3;
///
/// let index = SpatialIndex::build(&[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)]);
/// let hit = index.query_nearest(&Point3::new(0.9, 0.0, 0.0)).map(|n| n.index);
/// assert_eq!(hit, Some(1));
/// ```
pub struct SpatialIndex {
    tree: KdTree<f64, 3>,
    points: Vec<Point3<f64>>,
    frame: Rotation3<f64>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.points.len())
            .finish()
    }
}

/// Rotation that takes axis-aligned rows and planes off the tree's axes.
fn tree_frame() -> Rotation3<f64> {
    Rotation3::from_euler_angles(0.613_725_2, 0.377_051_9, 0.854_327_3)
}

fn lexicographic(a: &Point3<f64>, b: &Point3<f64>) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

impl SpatialIndex {
    /// Build over `points`.
    #[must_use]
    pub fn build(points: &[Point3<f64>]) -> Self {
        let frame = tree_frame();
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| lexicographic(&points[a], &points[b]).then(a.cmp(&b)));

        let mut tree: KdTree<f64, 3> = KdTree::new();
        let mut previous: Option<&Point3<f64>> = None;
        for &i in &order {
            let p = &points[i];
            if previous.is_some_and(|q| lexicographic(p, q) == Ordering::Equal) {
                continue;
            }
            previous = Some(p);
            let r = frame * p;
            tree.add(&[r.x, r.y, r.z], i as u64);
        }
        Self {
            tree,
            points: points.to_vec(),
            frame,
        }
    }

    /// Build over a mesh's vertices in world space.
    #[must_use]
    pub fn build_from_mesh_world(mesh: &Mesh) -> Self {
        Self::build(&mesh.world_positions())
    }

    /// Number of indexed points, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the index holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest indexed point. `None` for an empty index.
    ///
    /// Among coincident points the lowest index is reported.
    #[must_use]
    pub fn query_nearest(&self, point: &Point3<f64>) -> Option<Neighbor> {
        if self.points.is_empty() {
            return None;
        }
        let r = self.frame * point;
        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&[r.x, r.y, r.z]);
        let index = usize::try_from(nearest.item).ok()?;
        let found = self.points.get(index)?;
        Some(Neighbor {
            index,
            distance: (found - point).norm(),
        })
    }

    /// Distance from each query point to its nearest indexed point, in parallel.
    ///
    /// Every entry is `f64::INFINITY` when the index is empty.
    #[must_use]
    pub fn nearest_distances(&self, points: &[Point3<f64>]) -> Vec<f64> {
        points
            .par_iter()
            .map(|p| self.query_nearest(p).map_or(f64::INFINITY, |n| n.distance))
            .collect()
    }
}
