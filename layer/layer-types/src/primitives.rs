//! Closed primitive meshes for tests, benches and demos.

use std::f64::consts::PI;

use nalgebra::Point3;
use smallvec::smallvec;

use crate::{Face, Mesh};

/// Axis-aligned box as six outward-facing quads.
///
/// # Example
///
/// ```
/// use layer_types::{box_mesh, Point3};
///
/// let cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// assert_eq!(cube.vertex_count(), 8);
/// assert_eq!(cube.face_count(), 6);
/// assert!((cube.signed_volume() - 1.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn box_mesh(min: Point3<f64>, max: Point3<f64>) -> Mesh {
    let vertices = vec![
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];
    let faces: Vec<Face> = vec![
        smallvec![0, 3, 2, 1], // -z
        smallvec![4, 5, 6, 7], // +z
        smallvec![0, 1, 5, 4], // -y
        smallvec![2, 3, 7, 6], // +y
        smallvec![0, 4, 7, 3], // -x
        smallvec![1, 2, 6, 5], // +x
    ];
    Mesh::from_parts(vertices, faces)
}

/// UV sphere centred at the origin.
///
/// Produces `segments * (rings - 1) + 2` vertices: two poles plus
/// `rings - 1` latitude loops. Pole caps are triangles, the bands are quads.
/// `segments` is clamped to at least 3 and `rings` to at least 2.
///
/// # Example
///
/// ```
/// use layer_types::uv_sphere;
///
/// let sphere = uv_sphere(1.0, 16, 8);
/// assert_eq!(sphere.vertex_count(), 16 * 7 + 2);
/// assert!(sphere.signed_volume() > 3.9);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation)]
// Truncation: vertex counts are bounded by segments * rings, far below u32::MAX
pub fn uv_sphere(radius: f64, segments: u32, rings: u32) -> Mesh {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::with_capacity((segments * (rings - 1) + 2) as usize);
    vertices.push(Point3::new(0.0, 0.0, radius));
    for ring in 1..rings {
        let theta = PI * f64::from(ring) / f64::from(rings);
        let (sin_t, cos_t) = theta.sin_cos();
        for seg in 0..segments {
            let phi = 2.0 * PI * f64::from(seg) / f64::from(segments);
            let (sin_p, cos_p) = phi.sin_cos();
            vertices.push(Point3::new(
                radius * sin_t * cos_p,
                radius * sin_t * sin_p,
                radius * cos_t,
            ));
        }
    }
    let south = vertices.len() as u32;
    vertices.push(Point3::new(0.0, 0.0, -radius));

    let ring_start = |ring: u32| 1 + (ring - 1) * segments;
    let mut faces: Vec<Face> = Vec::new();

    // North cap
    for seg in 0..segments {
        let a = ring_start(1) + seg;
        let b = ring_start(1) + (seg + 1) % segments;
        faces.push(smallvec![0, a, b]);
    }

    // Bands
    for ring in 1..rings - 1 {
        let top = ring_start(ring);
        let bottom = ring_start(ring + 1);
        for seg in 0..segments {
            let next = (seg + 1) % segments;
            faces.push(smallvec![top + seg, bottom + seg, bottom + next, top + next]);
        }
    }

    // South cap
    let last = ring_start(rings - 1);
    for seg in 0..segments {
        let a = last + seg;
        let b = last + (seg + 1) % segments;
        faces.push(smallvec![south, b, a]);
    }

    Mesh::from_parts(vertices, faces)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::face_edges;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    fn assert_closed(mesh: &Mesh) {
        let mut directed: HashMap<(u32, u32), usize> = HashMap::new();
        for face in &mesh.faces {
            for e in face_edges(face) {
                *directed.entry(e).or_default() += 1;
            }
        }
        for (&(a, b), &count) in &directed {
            assert_eq!(count, 1, "edge {a}-{b} used twice in the same direction");
            assert_eq!(directed.get(&(b, a)), Some(&1), "edge {a}-{b} is a boundary");
        }
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let sphere = uv_sphere(0.5, 24, 12);
        assert!(sphere.validate().is_ok());
        assert_closed(&sphere);

        let exact = 4.0 / 3.0 * PI * 0.125;
        let volume = sphere.signed_volume();
        assert!(volume > 0.9 * exact && volume < exact);
    }

    #[test]
    fn sphere_vertex_count_matches_formula() {
        let sphere = uv_sphere(1.0, 50, 41);
        assert_eq!(sphere.vertex_count(), 50 * 40 + 2);
    }

    #[test]
    fn box_is_closed_and_outward() {
        let cube = box_mesh(Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        assert_closed(&cube);
        assert_relative_eq!(cube.signed_volume(), 12.0, epsilon = 1e-12);
        for fi in 0..cube.face_count() {
            let n = cube.face_normal(fi).expect("non-degenerate");
            let outward = cube.face_centroid(fi) - cube.bounds().center();
            assert!(n.dot(&outward) > 0.0);
        }
    }
}
