//! Triangle with concrete vertex positions.

use nalgebra::{Point3, Vector3};

use crate::Aabb;

/// A triangle with concrete vertex positions, produced by fan-triangulating
/// mesh faces.
///
/// Winding is **counter-clockwise (CCW) when viewed from the front**.
///
/// # Example
///
/// ```
/// use layer_types::{Triangle, Point3};
///
/// let tri = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(3.0, 0.0, 0.0),
///     Point3::new(0.0, 4.0, 0.0),
/// );
///
/// assert!((tri.area() - 6.0).abs() < 1e-10);
/// assert!(tri.normal().is_some_and(|n| (n.z - 1.0).abs() < 1e-10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3<f64>,
    /// Second vertex.
    pub v1: Point3<f64>,
    /// Third vertex.
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Cross-product normal; magnitude equals twice the area.
    #[inline]
    #[must_use]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, `None` for degenerate triangles.
    #[must_use]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        self.normal_unnormalized().try_normalize(f64::MIN_POSITIVE)
    }

    /// Triangle area.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Centroid.
    #[inline]
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Squared length of the longest edge.
    #[must_use]
    pub fn max_edge_length_squared(&self) -> f64 {
        let a = (self.v1 - self.v0).norm_squared();
        let b = (self.v2 - self.v1).norm_squared();
        let c = (self.v0 - self.v2).norm_squared();
        a.max(b).max(c)
    }

    /// Check whether the triangle is degenerate relative to its own size.
    ///
    /// A triangle counts as degenerate when twice its area is below
    /// `rel_tol` times its longest squared edge (sliver or collapsed).
    #[must_use]
    pub fn is_degenerate(&self, rel_tol: f64) -> bool {
        let max_edge_sq = self.max_edge_length_squared();
        if max_edge_sq <= 0.0 {
            return true;
        }
        self.normal_unnormalized().norm() <= rel_tol * max_edge_sq
    }

    /// Bounding box.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points([&self.v0, &self.v1, &self.v2])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn collinear_is_degenerate() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
        assert!(tri.is_degenerate(1e-12));
    }

    #[test]
    fn tiny_but_well_shaped_is_not_degenerate() {
        let s = 1e-5;
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(s, 0.0, 0.0),
            Point3::new(0.0, s, 0.0),
        );
        assert!(!tri.is_degenerate(1e-12));
        assert_relative_eq!(tri.area(), 0.5 * s * s, epsilon = 1e-20);
    }

    #[test]
    fn bounds_and_centroid() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 1.5),
        );
        let b = tri.bounds();
        assert_relative_eq!(b.max.x, 3.0);
        assert_relative_eq!(b.max.z, 1.5);
        assert_relative_eq!(tri.centroid(), Point3::new(1.0, 1.0, 0.5));
    }
}
