//! Bounding Volume Hierarchy for accelerated triangle queries.
//!
//! The tree stores primitive indices in its leaves and knows nothing about
//! the primitives beyond their boxes; distance and intersection tests are
//! supplied by the caller as closures.

use layer_types::{Aabb, Mesh, Point3, Vector3};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::query::ray_hits_box;

/// Default maximum primitives per leaf.
pub const DEFAULT_LEAF_SIZE: usize = 8;

/// Subtrees larger than this are built on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// BVH node containing either leaf primitives or child nodes.
#[derive(Debug)]
pub enum BvhNode {
    /// Leaf node containing primitive indices.
    Leaf {
        /// Bounding box of all primitives in this leaf.
        bbox: Aabb,
        /// Primitive indices stored in this leaf.
        items: SmallVec<[u32; 8]>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounding box of the subtree.
        bbox: Aabb,
        /// Left child node.
        left: Box<Self>,
        /// Right child node.
        right: Box<Self>,
    },
}

impl BvhNode {
    /// Bounding box of this node.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding Volume Hierarchy over a set of primitive boxes.
///
/// # Example
///
/// ```
/// use layer_spatial::Bvh;
/// use layer_types::{box_mesh, Aabb, Point3};
///
/// let cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// let bvh = Bvh::from_mesh(&cube);
/// assert_eq!(bvh.len(), 12);
///
/// let far = Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
/// assert!(bvh.query(&far, 0.0).is_empty());
/// ```
#[derive(Debug)]
pub struct Bvh {
    root: Option<BvhNode>,
    len: usize,
}

impl Bvh {
    /// Build over arbitrary primitive boxes; leaf items index into `boxes`.
    #[must_use]
    pub fn build(boxes: &[Aabb], max_leaf_size: usize) -> Self {
        Self::build_parallel(boxes, max_leaf_size, usize::MAX)
    }

    /// Build, recursing on the rayon pool for subtrees of at least
    /// `parallel_threshold` primitives.
    #[must_use]
    pub fn build_parallel(boxes: &[Aabb], max_leaf_size: usize, parallel_threshold: usize) -> Self {
        if boxes.is_empty() {
            return Self { root: None, len: 0 };
        }
        let centers: Vec<Point3<f64>> = boxes.iter().map(Aabb::center).collect();
        let indices: Vec<u32> = (0..boxes.len() as u32).collect();
        let root = build_recursive(
            boxes,
            &centers,
            indices,
            max_leaf_size.max(1),
            parallel_threshold.max(2),
        );
        Self {
            root: Some(root),
            len: boxes.len(),
        }
    }

    /// Build over the fan triangulation of a mesh (local frame).
    ///
    /// Leaf items index the sequence produced by [`Mesh::triangles`].
    #[must_use]
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let boxes: Vec<Aabb> = mesh
            .triangles()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&tri| mesh.triangle(tri).bounds())
            .collect();
        Self::build_parallel(&boxes, DEFAULT_LEAF_SIZE, PARALLEL_THRESHOLD)
    }

    /// Number of primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the BVH holds no primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Bounding box of everything in the tree.
    #[must_use]
    pub fn root_bbox(&self) -> Option<&Aabb> {
        self.root.as_ref().map(BvhNode::bbox)
    }

    /// Primitives whose boxes overlap `query_bbox` grown by `tolerance`.
    #[must_use]
    pub fn query(&self, query_bbox: &Aabb, tolerance: f64) -> Vec<u32> {
        let mut result = Vec::new();
        if let Some(root) = &self.root {
            query_recursive(root, query_bbox, tolerance, &mut result);
        }
        result
    }

    /// Primitives whose boxes are crossed by the half-line `origin + t * dir`, `t >= 0`.
    #[must_use]
    pub fn ray_candidates(&self, origin: &Point3<f64>, dir: &Vector3<f64>) -> Vec<u32> {
        let inv_dir = dir.map(|d| 1.0 / d);
        let mut result = Vec::new();
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if !ray_hits_box(origin, &inv_dir, node.bbox()) {
                continue;
            }
            match node {
                BvhNode::Leaf { items, .. } => result.extend(items.iter().copied()),
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        result
    }

    /// Nearest primitive to `point` under a caller-supplied squared distance.
    ///
    /// `dist_sq` must never be smaller than the squared distance from `point`
    /// to the primitive's box. Returns `(item, distance²)`.
    pub fn nearest<F>(&self, point: &Point3<f64>, mut dist_sq: F) -> Option<(u32, f64)>
    where
        F: FnMut(u32) -> f64,
    {
        let root = self.root.as_ref()?;
        let mut best: Option<(u32, f64)> = None;
        nearest_recursive(root, point, &mut dist_sq, &mut best);
        best
    }

    /// All primitives with `dist_sq(item) <= radius_sq`.
    pub fn within<F>(&self, point: &Point3<f64>, radius_sq: f64, mut dist_sq: F) -> Vec<(u32, f64)>
    where
        F: FnMut(u32) -> f64,
    {
        let mut result = Vec::new();
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if node.bbox().distance_squared(point) > radius_sq {
                continue;
            }
            match node {
                BvhNode::Leaf { items, .. } => {
                    for &item in items {
                        let d = dist_sq(item);
                        if d <= radius_sq {
                            result.push((item, d));
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        result
    }

    /// Structural statistics.
    #[must_use]
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(root) = &self.root {
            collect_stats(root, 0, &mut stats);
        }
        stats
    }
}

fn build_recursive(
    boxes: &[Aabb],
    centers: &[Point3<f64>],
    mut indices: Vec<u32>,
    max_leaf_size: usize,
    parallel_threshold: usize,
) -> BvhNode {
    let mut bbox = Aabb::empty();
    for &i in &indices {
        bbox.merge(&boxes[i as usize]);
    }

    if indices.len() <= max_leaf_size {
        return BvhNode::Leaf {
            bbox,
            items: indices.into_iter().collect(),
        };
    }

    // Median split along the longest axis of the centroid bounds
    let centroid_bounds = Aabb::from_points(indices.iter().map(|&i| &centers[i as usize]));
    let axis = centroid_bounds.longest_axis();
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        centers[a as usize][axis].total_cmp(&centers[b as usize][axis])
    });
    let right_indices = indices.split_off(mid);
    let left_indices = indices;

    let (left, right) = if left_indices.len() + right_indices.len() >= parallel_threshold {
        rayon::join(
            || build_recursive(boxes, centers, left_indices, max_leaf_size, parallel_threshold),
            || build_recursive(boxes, centers, right_indices, max_leaf_size, parallel_threshold),
        )
    } else {
        (
            build_recursive(boxes, centers, left_indices, max_leaf_size, parallel_threshold),
            build_recursive(boxes, centers, right_indices, max_leaf_size, parallel_threshold),
        )
    };

    BvhNode::Internal {
        bbox,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn query_recursive(node: &BvhNode, query_bbox: &Aabb, tolerance: f64, result: &mut Vec<u32>) {
    if !node.bbox().intersects(query_bbox, tolerance) {
        return;
    }
    match node {
        BvhNode::Leaf { items, .. } => result.extend(items.iter().copied()),
        BvhNode::Internal { left, right, .. } => {
            query_recursive(left, query_bbox, tolerance, result);
            query_recursive(right, query_bbox, tolerance, result);
        }
    }
}

fn nearest_recursive<F>(
    node: &BvhNode,
    point: &Point3<f64>,
    dist_sq: &mut F,
    best: &mut Option<(u32, f64)>,
) where
    F: FnMut(u32) -> f64,
{
    match node {
        BvhNode::Leaf { items, .. } => {
            for &item in items {
                let d = dist_sq(item);
                if best.map_or(true, |(_, b)| d < b) {
                    *best = Some((item, d));
                }
            }
        }
        BvhNode::Internal { left, right, .. } => {
            let dl = left.bbox().distance_squared(point);
            let dr = right.bbox().distance_squared(point);
            let (near, d_near, far, d_far) = if dl <= dr {
                (left, dl, right, dr)
            } else {
                (right, dr, left, dl)
            };
            if best.map_or(true, |(_, b)| d_near < b) {
                nearest_recursive(near, point, dist_sq, best);
            }
            if best.map_or(true, |(_, b)| d_far < b) {
                nearest_recursive(far, point, dist_sq, best);
            }
        }
    }
}

fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
    stats.max_depth = stats.max_depth.max(depth);
    match node {
        BvhNode::Leaf { items, .. } => {
            stats.leaf_count += 1;
            stats.total_items_in_leaves += items.len();
            stats.max_leaf_size = stats.max_leaf_size.max(items.len());
        }
        BvhNode::Internal { left, right, .. } => {
            stats.internal_count += 1;
            collect_stats(left, depth + 1, stats);
            collect_stats(right, depth + 1, stats);
        }
    }
}

/// Statistics about BVH structure.
#[derive(Debug, Default, Clone)]
pub struct BvhStats {
    /// Number of internal (branch) nodes.
    pub internal_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Maximum number of items in any leaf.
    pub max_leaf_size: usize,
    /// Total items stored across all leaves.
    pub total_items_in_leaves: usize,
}
