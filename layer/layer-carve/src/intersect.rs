//! Triangle-triangle and edge-triangle intersection tests.

// Barycentric determinant terms read as suspicious groupings to clippy
#![allow(clippy::suspicious_operation_groupings)]

use layer_types::{Point3, Triangle};

/// Where a segment pierces a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeHit {
    /// Parameter along the segment, `0` at the start and `1` at the end.
    pub t: f64,
    /// Intersection point.
    pub point: Point3<f64>,
}

/// Segment-triangle intersection (Möller-Trumbore restricted to `t ∈ [0, 1]`).
///
/// Segments parallel to the triangle plane never hit; coplanar contact is
/// left to the callers' plane tests.
#[must_use]
pub fn edge_triangle_intersect(
    e0: &Point3<f64>,
    e1: &Point3<f64>,
    tri: &Triangle,
    epsilon: f64,
) -> Option<EdgeHit> {
    let direction = e1 - e0;
    if direction.norm_squared() < epsilon * epsilon {
        return None;
    }

    let edge1 = tri.v1 - tri.v0;
    let edge2 = tri.v2 - tri.v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() <= f64::EPSILON * direction.norm() * edge1.norm() * edge2.norm() {
        return None;
    }

    let f = 1.0 / a;
    let s = e0 - tri.v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    if t < -epsilon || t > 1.0 + epsilon {
        return None;
    }

    let t = t.clamp(0.0, 1.0);
    Some(EdgeHit {
        t,
        point: e0 + direction * t,
    })
}

/// Whether two triangles cross, by testing all six edges against the
/// opposite triangle.
#[must_use]
pub fn triangles_intersect(a: &Triangle, b: &Triangle, epsilon: f64) -> bool {
    let edges = |t: &Triangle| [(t.v0, t.v1), (t.v1, t.v2), (t.v2, t.v0)];
    edges(a)
        .iter()
        .any(|(e0, e1)| edge_triangle_intersect(e0, e1, b, epsilon).is_some())
        || edges(b)
            .iter()
            .any(|(e0, e1)| edge_triangle_intersect(e0, e1, a, epsilon).is_some())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_xy() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn edge_through_triangle() {
        let hit = edge_triangle_intersect(
            &Point3::new(0.25, 0.25, -1.0),
            &Point3::new(0.25, 0.25, 1.0),
            &unit_xy(),
            1e-10,
        )
        .unwrap();
        assert_relative_eq!(hit.t, 0.5);
        assert_relative_eq!(hit.point.z, 0.0);
    }

    #[test]
    fn edge_missing_triangle() {
        let far = edge_triangle_intersect(
            &Point3::new(2.0, 2.0, -1.0),
            &Point3::new(2.0, 2.0, 1.0),
            &unit_xy(),
            1e-10,
        );
        assert!(far.is_none());
        let short = edge_triangle_intersect(
            &Point3::new(0.25, 0.25, 0.5),
            &Point3::new(0.25, 0.25, 1.0),
            &unit_xy(),
            1e-10,
        );
        assert!(short.is_none());
    }

    #[test]
    fn parallel_edge_never_hits() {
        let hit = edge_triangle_intersect(
            &Point3::new(-1.0, 0.2, 0.0),
            &Point3::new(2.0, 0.2, 0.0),
            &unit_xy(),
            1e-10,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn crossing_triangles() {
        let b = Triangle::new(
            Point3::new(0.2, 0.2, -1.0),
            Point3::new(0.2, 0.2, 1.0),
            Point3::new(0.3, -1.0, 0.0),
        );
        assert!(triangles_intersect(&unit_xy(), &b, 1e-10));

        let lifted = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        );
        assert!(!triangles_intersect(&unit_xy(), &lifted, 1e-10));
    }
}
