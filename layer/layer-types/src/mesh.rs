//! Indexed polygon mesh.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Aabb, MeshError, MeshResult, Transform, Triangle};

/// A polygon face as indices into [`Mesh::vertices`].
///
/// Triangles and quads are stored inline; larger polygons spill to the heap.
pub type Face = SmallVec<[u32; 4]>;

/// Iterate over the directed edges `(a, b)` of a polygon, closing the loop.
pub fn face_edges(face: &[u32]) -> impl Iterator<Item = (u32, u32)> + '_ {
    let n = face.len();
    (0..n).map(move |i| (face[i], face[(i + 1) % n]))
}

/// Reverse a polygon's winding, keeping its first vertex in place.
///
/// The fan triangulation from the first vertex is mirrored exactly, so
/// signed areas and volumes change sign and nothing else.
pub fn flip_face(face: &mut Face) {
    if face.len() > 2 {
        face[1..].reverse();
    }
}

/// An indexed polygon mesh placed in world space by a [`Transform`].
///
/// # Memory Layout
///
/// - `vertices`: local-space positions
/// - `faces`: polygons (three or more indices), CCW when viewed from outside
/// - `attributes`: named per-vertex scalar maps, one value per vertex
/// - `face_materials`: either empty or one material slot per face
///
/// Every operator in the pipeline keeps these buffers mutually consistent;
/// [`Mesh::validate`] checks it.
///
/// # Example
///
/// ```
/// use layer_types::{Mesh, Point3};
/// use smallvec::smallvec;
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Point3::new(0.0, 0.0, 0.0));
/// mesh.vertices.push(Point3::new(1.0, 0.0, 0.0));
/// mesh.vertices.push(Point3::new(1.0, 1.0, 0.0));
/// mesh.vertices.push(Point3::new(0.0, 1.0, 0.0));
/// mesh.faces.push(smallvec![0, 1, 2, 3]);
///
/// assert_eq!(mesh.face_count(), 1);
/// assert_eq!(mesh.triangles().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mesh {
    /// Local-space vertex positions.
    pub vertices: Vec<Point3<f64>>,

    /// Polygon faces as indices into the vertex array.
    pub faces: Vec<Face>,

    /// Local-to-world transform.
    pub transform: Transform,

    /// Named per-vertex scalar attribute maps.
    pub attributes: BTreeMap<String, Vec<f64>>,

    /// Per-face material slot, empty when the mesh carries no assignment.
    pub face_materials: Vec<u32>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

impl Mesh {
    /// Create an empty mesh with an identity transform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            transform: Transform::identity(),
            attributes: BTreeMap::new(),
            face_materials: Vec::new(),
        }
    }

    /// Create a mesh from positions and polygon faces.
    #[must_use]
    pub fn from_parts(vertices: Vec<Point3<f64>>, faces: Vec<Face>) -> Self {
        Self {
            vertices,
            faces,
            ..Self::new()
        }
    }

    /// Create a mesh from positions and triangle index triples.
    #[must_use]
    pub fn from_triangles(vertices: Vec<Point3<f64>>, triangles: &[[u32; 3]]) -> Self {
        let faces = triangles
            .iter()
            .map(|t| Face::from_slice(t))
            .collect();
        Self::from_parts(vertices, faces)
    }

    /// Replace the world transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of polygon faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// A mesh without faces carries no surface.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Check the buffer invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> MeshResult<()> {
        let vertex_count = self.vertices.len();
        for (fi, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(MeshError::FaceTooSmall {
                    face: fi,
                    len: face.len(),
                });
            }
            if let Some(&index) = face.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    face: fi,
                    index,
                    vertex_count,
                });
            }
        }
        for (name, values) in &self.attributes {
            if values.len() != vertex_count {
                return Err(MeshError::AttributeLength {
                    name: name.clone(),
                    expected: vertex_count,
                    got: values.len(),
                });
            }
        }
        if !self.face_materials.is_empty() && self.face_materials.len() != self.faces.len() {
            return Err(MeshError::MaterialLength {
                expected: self.faces.len(),
                got: self.face_materials.len(),
            });
        }
        Ok(())
    }

    /// World-space position of a vertex.
    #[must_use]
    pub fn world_position(&self, index: usize) -> Option<Point3<f64>> {
        self.vertices
            .get(index)
            .map(|p| self.transform.transform_point(p))
    }

    /// All vertex positions in world space.
    #[must_use]
    pub fn world_positions(&self) -> Vec<Point3<f64>> {
        self.vertices
            .iter()
            .map(|p| self.transform.transform_point(p))
            .collect()
    }

    /// Copy of this mesh with its vertices re-expressed in the frame of `target`.
    ///
    /// World-space geometry is unchanged; the returned mesh carries `target`
    /// as its transform.
    #[must_use]
    pub fn expressed_in(&self, target: &Transform) -> Self {
        if self.transform == *target {
            return self.clone();
        }
        let mut out = self.clone();
        for p in &mut out.vertices {
            *p = target.inverse_transform_point(&self.transform.transform_point(p));
        }
        out.transform = *target;
        out
    }

    /// Fan-triangulate every face.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.triangles_with_face().map(|(_, tri)| tri)
    }

    /// Fan-triangulate every face, tagging each triangle with its source face.
    pub fn triangles_with_face(&self) -> impl Iterator<Item = (usize, [u32; 3])> + '_ {
        self.faces.iter().enumerate().flat_map(|(fi, face)| {
            (1..face.len().saturating_sub(1)).map(move |k| (fi, [face[0], face[k], face[k + 1]]))
        })
    }

    /// Number of triangles produced by [`Mesh::triangles`].
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().map(|f| f.len().saturating_sub(2)).sum()
    }

    /// Resolve a triangle's vertex positions (local space).
    #[must_use]
    pub fn triangle(&self, tri: [u32; 3]) -> Triangle {
        Triangle::new(
            self.vertices[tri[0] as usize],
            self.vertices[tri[1] as usize],
            self.vertices[tri[2] as usize],
        )
    }

    /// Newell normal of a face, scaled to twice the polygon area.
    #[must_use]
    pub fn face_normal_unnormalized(&self, face: usize) -> Vector3<f64> {
        let Some(face) = self.faces.get(face) else {
            return Vector3::zeros();
        };
        let mut n = Vector3::zeros();
        for (a, b) in face_edges(face) {
            let p = &self.vertices[a as usize];
            let q = &self.vertices[b as usize];
            n.x += (p.y - q.y) * (p.z + q.z);
            n.y += (p.z - q.z) * (p.x + q.x);
            n.z += (p.x - q.x) * (p.y + q.y);
        }
        n
    }

    /// Unit face normal, `None` for zero-area faces.
    #[must_use]
    pub fn face_normal(&self, face: usize) -> Option<Vector3<f64>> {
        self.face_normal_unnormalized(face)
            .try_normalize(f64::MIN_POSITIVE)
    }

    /// Area of a (planar) face.
    #[must_use]
    pub fn face_area(&self, face: usize) -> f64 {
        self.face_normal_unnormalized(face).norm() * 0.5
    }

    /// Average of a face's vertex positions.
    #[must_use]
    pub fn face_centroid(&self, face: usize) -> Point3<f64> {
        let Some(face) = self.faces.get(face) else {
            return Point3::origin();
        };
        if face.is_empty() {
            return Point3::origin();
        }
        let sum: Vector3<f64> = face
            .iter()
            .map(|&i| self.vertices[i as usize].coords)
            .sum();
        #[allow(clippy::cast_precision_loss)]
        Point3::from(sum / face.len() as f64)
    }

    /// Local-space bounding box.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter())
    }

    /// World-space bounding box.
    #[must_use]
    pub fn world_bounds(&self) -> Aabb {
        let world = self.world_positions();
        Aabb::from_points(world.iter())
    }

    /// Signed enclosed volume (local space); positive for outward winding.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for [i0, i1, i2] in self.triangles() {
            let v0 = &self.vertices[i0 as usize];
            let v1 = &self.vertices[i1 as usize];
            let v2 = &self.vertices[i2 as usize];

            let cross = Vector3::new(
                v1.y.mul_add(v2.z, -(v1.z * v2.y)),
                v1.z.mul_add(v2.x, -(v1.x * v2.z)),
                v1.x.mul_add(v2.y, -(v1.y * v2.x)),
            );
            volume += v0.z.mul_add(cross.z, v0.x.mul_add(cross.x, v0.y * cross.y));
        }
        volume / 6.0
    }

    /// Total surface area (local space).
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|fi| self.face_area(fi)).sum()
    }

    /// Look up a per-vertex attribute map.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[f64]> {
        self.attributes.get(name).map(Vec::as_slice)
    }

    /// Attach a per-vertex attribute map, replacing any map with that name.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::AttributeLength`] when `values` does not have one
    /// entry per vertex.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<f64>) -> MeshResult<()> {
        let name = name.into();
        if values.len() != self.vertices.len() {
            return Err(MeshError::AttributeLength {
                name,
                expected: self.vertices.len(),
                got: values.len(),
            });
        }
        self.attributes.insert(name, values);
        Ok(())
    }

    /// Detach a per-vertex attribute map.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Vec<f64>> {
        self.attributes.remove(name)
    }

    /// Reverse the winding of every face.
    pub fn flip_faces(&mut self) {
        for face in &mut self.faces {
            flip_face(face);
        }
    }

    /// Keep only faces for which `keep` returns true, carrying material slots along.
    ///
    /// Returns the number of faces removed. Vertices are untouched.
    pub fn retain_faces<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(usize, &Face) -> bool,
    {
        let before = self.faces.len();
        let mask: Vec<bool> = self
            .faces
            .iter()
            .enumerate()
            .map(|(fi, f)| keep(fi, f))
            .collect();
        let mut it = mask.iter();
        self.faces.retain(|_| *it.next().unwrap_or(&true));
        if !self.face_materials.is_empty() {
            let mut it = mask.iter();
            self.face_materials.retain(|_| *it.next().unwrap_or(&true));
        }
        before - self.faces.len()
    }

    /// Delete flagged vertices together with every face that references them.
    ///
    /// `remove[i] == true` deletes vertex `i`. Returns the number of vertices
    /// removed. Remaining vertices keep their relative order.
    pub fn remove_vertices(&mut self, remove: &[bool]) -> usize {
        let flagged = |i: u32| remove.get(i as usize).copied().unwrap_or(false);
        self.retain_faces(|_, face| !face.iter().any(|&i| flagged(i)));
        let keep: Vec<bool> = (0..self.vertices.len())
            .map(|i| !remove.get(i).copied().unwrap_or(false))
            .collect();
        self.compact_vertices(&keep)
    }

    /// Drop vertices with `keep[i] == false` and remap faces and attributes.
    ///
    /// Callers must ensure no remaining face references a dropped vertex;
    /// such faces are removed defensively. Returns the number removed.
    pub fn compact_vertices(&mut self, keep: &[bool]) -> usize {
        let before = self.vertices.len();
        let mut remap = vec![u32::MAX; before];
        let mut next = 0u32;
        for (i, slot) in remap.iter_mut().enumerate() {
            if keep.get(i).copied().unwrap_or(true) {
                *slot = next;
                next += 1;
            }
        }
        if next as usize == before {
            return 0;
        }

        self.retain_faces(|_, face| face.iter().all(|&i| remap[i as usize] != u32::MAX));
        for face in &mut self.faces {
            for i in face.iter_mut() {
                *i = remap[*i as usize];
            }
        }

        let kept = |i: &usize| remap[*i] != u32::MAX;
        self.vertices = (0..before)
            .filter(kept)
            .map(|i| self.vertices[i])
            .collect();
        for values in self.attributes.values_mut() {
            *values = (0..before).filter(kept).map(|i| values[i]).collect();
        }

        before - self.vertices.len()
    }

    /// Copy a subset of faces into a standalone, compacted mesh.
    ///
    /// Vertices keep their relative order; the transform, attributes and
    /// material slots of the selected faces are carried over.
    #[must_use]
    pub fn extract_faces(&self, faces: &[usize]) -> Self {
        let mut used = vec![false; self.vertices.len()];
        for &fi in faces {
            for &i in &self.faces[fi] {
                used[i as usize] = true;
            }
        }

        let mut out = Self {
            vertices: self.vertices.clone(),
            faces: faces.iter().map(|&fi| self.faces[fi].clone()).collect(),
            transform: self.transform,
            attributes: self.attributes.clone(),
            face_materials: if self.face_materials.is_empty() {
                Vec::new()
            } else {
                faces.iter().map(|&fi| self.face_materials[fi]).collect()
            },
        };
        out.compact_vertices(&used);
        out
    }

    /// Append another mesh expressed in the same frame.
    ///
    /// Attributes missing from `other` are padded with `0.0`; attributes only
    /// present on `other` are dropped.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, vertex counts > 4B are unsupported
    pub fn append(&mut self, other: &Self) {
        let offset = self.vertices.len() as u32;
        let had_materials = !self.face_materials.is_empty() || !other.face_materials.is_empty();
        if had_materials && self.face_materials.is_empty() {
            self.face_materials = vec![0; self.faces.len()];
        }

        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| f.iter().map(|&i| i + offset).collect::<Face>()),
        );
        for (name, values) in &mut self.attributes {
            match other.attributes.get(name) {
                Some(theirs) => values.extend_from_slice(theirs),
                None => values.resize(self.vertices.len(), 0.0),
            }
        }
        if had_materials {
            if other.face_materials.is_empty() {
                self.face_materials.resize(self.faces.len(), 0);
            } else {
                self.face_materials.extend_from_slice(&other.face_materials);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::box_mesh;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use smallvec::smallvec;

    fn quad_strip() -> Mesh {
        // Two quads sharing edge 1-4
        Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(2.0, 1.0, 0.0),
            ],
            vec![smallvec![0, 1, 4, 3], smallvec![1, 2, 5, 4]],
        )
    }

    #[test]
    fn validate_catches_bad_index() {
        let mut mesh = quad_strip();
        assert!(mesh.validate().is_ok());
        mesh.faces.push(smallvec![0, 1, 9]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn validate_catches_short_face_and_attribute() {
        let mut mesh = quad_strip();
        mesh.faces.push(smallvec![0, 1]);
        assert!(matches!(mesh.validate(), Err(MeshError::FaceTooSmall { .. })));

        let mut mesh = quad_strip();
        assert!(mesh.set_attribute("w", vec![0.0; 2]).is_err());
        mesh.attributes.insert("w".to_string(), vec![0.0; 2]);
        assert!(matches!(mesh.validate(), Err(MeshError::AttributeLength { .. })));
    }

    #[test]
    fn fan_triangulation_counts() {
        let mesh = quad_strip();
        assert_eq!(mesh.triangle_count(), 4);
        let tris: Vec<_> = mesh.triangles_with_face().collect();
        assert_eq!(tris[0], (0, [0, 1, 4]));
        assert_eq!(tris[1], (0, [0, 4, 3]));
        assert_eq!(tris[3].0, 1);
    }

    #[test]
    fn newell_normal_and_area() {
        let mesh = quad_strip();
        let n = mesh.face_normal(0).expect("quad has area");
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.face_area(1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.surface_area(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn box_volume_is_positive() {
        let cube = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(cube.signed_volume(), 8.0, epsilon = 1e-9);

        let mut inverted = cube.clone();
        inverted.flip_faces();
        assert_relative_eq!(inverted.signed_volume(), -8.0, epsilon = 1e-9);
    }

    #[test]
    fn flip_face_keeps_first_vertex() {
        let mut face: Face = smallvec![4, 5, 6, 7];
        flip_face(&mut face);
        assert_eq!(face.as_slice(), &[4, 7, 6, 5]);

        let mut edge: Face = smallvec![1, 2];
        flip_face(&mut edge);
        assert_eq!(edge.as_slice(), &[1, 2]);
    }

    #[test]
    fn remove_vertices_drops_faces_and_compacts() {
        let mut mesh = quad_strip();
        mesh.set_attribute("w", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
            .expect("length matches");
        mesh.face_materials = vec![3, 7];

        let mut remove = vec![false; 6];
        remove[2] = true;
        let removed = mesh.remove_vertices(&remove);

        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 5);
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.face_materials, vec![3]);
        assert_eq!(mesh.attribute("w").expect("kept"), &[0.0, 1.0, 3.0, 4.0, 5.0]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn extract_faces_keeps_order_and_transform() {
        let transform = Transform::from_parts(
            Translation3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
            2.0,
        );
        let mesh = quad_strip().with_transform(transform);
        let part = mesh.extract_faces(&[1]);

        assert_eq!(part.vertex_count(), 4);
        assert_eq!(part.faces[0].as_slice(), &[0, 1, 3, 2]);
        assert_eq!(part.transform, transform);
        assert!(part.validate().is_ok());
    }

    #[test]
    fn world_positions_apply_transform() {
        let transform = Transform::from_parts(
            Translation3::new(0.0, 0.0, 1.0),
            UnitQuaternion::identity(),
            2.0,
        );
        let mesh = quad_strip().with_transform(transform);
        let p = mesh.world_position(4).expect("vertex exists");
        assert_relative_eq!(p, Point3::new(2.0, 2.0, 1.0), epsilon = 1e-12);

        let local = mesh.expressed_in(&Transform::identity());
        assert_relative_eq!(local.vertices[4], p, epsilon = 1e-12);
        assert_relative_eq!(local.world_position(4).expect("exists"), p, epsilon = 1e-12);
    }

    #[test]
    fn append_offsets_and_pads() {
        let mut a = quad_strip();
        a.set_attribute("w", vec![1.0; 6]).expect("length matches");
        let b = quad_strip();
        a.append(&b);

        assert_eq!(a.vertex_count(), 12);
        assert_eq!(a.faces[2].as_slice(), &[6, 7, 10, 9]);
        assert_eq!(a.attribute("w").expect("kept").len(), 12);
        assert!(a.validate().is_ok());
    }
}
