//! Point and ray queries against single primitives.

use layer_types::Aabb;
use nalgebra::{Point3, Vector3};

/// Closest point on a triangle to a query point.
///
/// Voronoi-region walk from "Real-Time Collision Detection" (Ericson, 5.1.5).
/// Degenerate triangles fall through to an edge or vertex region.
#[must_use]
pub fn closest_point_on_triangle(
    point: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Point3<f64> {
    let ab = v1 - v0;
    let ac = v2 - v0;
    let ap = point - v0;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *v0;
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *v1;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return v0 + ab * v;
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *v2;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return v0 + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return v1 + (v2 - v1) * w;
    }

    let denom = va + vb + vc;
    if denom.abs() < f64::MIN_POSITIVE {
        return *v0;
    }
    let v = vb / denom;
    let w = vc / denom;
    v0 + ab * v + ac * w
}

/// Möller–Trumbore ray/triangle test.
///
/// Returns the ray parameter `t > 0` of the hit, or `None`. Hits within
/// `1e-12` of the origin are ignored so a point lying on the surface does not
/// count its own face.
#[must_use]
pub fn ray_triangle_intersect(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<f64> {
    const EPSILON: f64 = 1e-12;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = dir.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < EPSILON * edge1.norm() * edge2.norm() {
        return None;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > EPSILON).then_some(t)
}

/// Slab test of a half-line against a box.
#[must_use]
pub fn ray_hits_box(origin: &Point3<f64>, inv_dir: &Vector3<f64>, aabb: &Aabb) -> bool {
    let mut t_min = 0.0_f64;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let t1 = (aabb.min[axis] - origin[axis]) * inv_dir[axis];
        let t2 = (aabb.max[axis] - origin[axis]) * inv_dir[axis];
        // NaN arises for a zero direction component with the origin on a slab plane
        let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        if lo.is_nan() || hi.is_nan() {
            if origin[axis] < aabb.min[axis] || origin[axis] > aabb.max[axis] {
                return false;
            }
            continue;
        }
        t_min = t_min.max(lo);
        t_max = t_max.min(hi);
        if t_min > t_max {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tri() -> [Point3<f64>; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 10.0, 0.0),
        ]
    }

    #[test]
    fn closest_point_face_region() {
        let [a, b, c] = tri();
        let q = closest_point_on_triangle(&Point3::new(5.0, 3.0, 5.0), &a, &b, &c);
        assert_relative_eq!(q, Point3::new(5.0, 3.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn closest_point_vertex_and_edge_regions() {
        let [a, b, c] = tri();
        let q = closest_point_on_triangle(&Point3::new(-5.0, -5.0, 0.0), &a, &b, &c);
        assert_relative_eq!(q, a, epsilon = 1e-12);

        let q = closest_point_on_triangle(&Point3::new(5.0, -3.0, 1.0), &a, &b, &c);
        assert_relative_eq!(q, Point3::new(5.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn closest_point_on_degenerate_triangle() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let q = closest_point_on_triangle(&Point3::new(0.5, 1.0, 0.0), &a, &b, &b);
        assert!(q.coords.iter().all(|c| c.is_finite()));
        assert_relative_eq!(q.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn ray_hits_and_misses() {
        let [a, b, c] = tri();
        let down = Vector3::new(0.0, 0.0, -1.0);
        let t = ray_triangle_intersect(&Point3::new(5.0, 3.0, 2.0), &down, &a, &b, &c);
        assert_relative_eq!(t.expect("hit"), 2.0, epsilon = 1e-12);

        assert!(ray_triangle_intersect(&Point3::new(50.0, 3.0, 2.0), &down, &a, &b, &c).is_none());
        // Pointing away
        assert!(ray_triangle_intersect(&Point3::new(5.0, 3.0, -2.0), &down, &a, &b, &c).is_none());
    }

    #[test]
    fn slab_test() {
        let aabb = Aabb::new(Point3::new(1.0, -1.0, -1.0), Point3::new(2.0, 1.0, 1.0));
        let inv = Vector3::new(1.0, f64::INFINITY, f64::INFINITY);
        assert!(ray_hits_box(&Point3::origin(), &inv, &aabb));
        assert!(!ray_hits_box(&Point3::new(0.0, 5.0, 0.0), &inv, &aabb));
        assert!(!ray_hits_box(&Point3::new(3.0, 0.0, 0.0), &inv, &aabb));
    }
}
