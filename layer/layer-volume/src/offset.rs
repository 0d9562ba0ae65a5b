//! Inward offsetting of a closed surface.

use std::fmt;

use layer_types::{Mesh, Vector3};
use tracing::debug;

use crate::error::{VolumeError, VolumeResult};
use crate::regularize::{validate_voxel_size, voxel_remesh, DEFAULT_MAX_CELLS};

/// How the offset surface is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetMethod {
    /// Move every vertex along its normal (fast, keeps topology).
    ///
    /// Each vertex moves by the thickness times an even-thickness factor, so
    /// flat regions and creases end up the same distance from the source.
    #[default]
    Normal,

    /// Re-extract an inner level set of the signed distance field.
    ///
    /// Thickness is exact everywhere, but the topology is rebuilt at the
    /// configured voxel size.
    Sdf,
}

impl fmt::Display for OffsetMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Sdf => write!(f, "sdf"),
        }
    }
}

/// Parameters for inward offsetting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetParams {
    /// Offset method.
    pub method: OffsetMethod,
    /// Voxel size for [`OffsetMethod::Sdf`], world units.
    pub sdf_voxel_size: f64,
    /// Grid cap for [`OffsetMethod::Sdf`].
    pub max_cells: usize,
    /// Upper clamp for the even-thickness factor of [`OffsetMethod::Normal`].
    pub max_even_factor: f64,
}

impl Default for OffsetParams {
    fn default() -> Self {
        Self {
            method: OffsetMethod::Normal,
            sdf_voxel_size: 0.0075,
            max_cells: DEFAULT_MAX_CELLS,
            max_even_factor: 2.0,
        }
    }
}

impl OffsetParams {
    /// Level-set offsetting at the given voxel size.
    #[must_use]
    pub fn sdf(voxel_size: f64) -> Self {
        Self {
            method: OffsetMethod::Sdf,
            sdf_voxel_size: voxel_size,
            ..Self::default()
        }
    }
}

/// Shrinks a surface inward by a fixed thickness.
///
/// This is the inner wall of a solidified shell: every point moves against
/// its outward normal. A thickness of zero returns the input unchanged.
///
/// # Example
///
/// ```
/// use layer_volume::SignedOffsetter;
/// use layer_types::uv_sphere;
///
/// let sphere = uv_sphere(1.0, 32, 16);
/// let shrunk = SignedOffsetter::default().offset(&sphere, 0.1).unwrap();
///
/// assert_eq!(shrunk.faces, sphere.faces);
/// assert!(shrunk.signed_volume() < sphere.signed_volume());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOffsetter {
    params: OffsetParams,
}

impl SignedOffsetter {
    /// Offsetter with the given parameters.
    #[must_use]
    pub fn new(params: OffsetParams) -> Self {
        Self { params }
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &OffsetParams {
        &self.params
    }

    /// Offset a copy of `mesh` inward by `thickness` world units.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::InvalidParameter`] for a negative or non-finite
    ///   thickness, or an invalid voxel size with [`OffsetMethod::Sdf`]
    /// - [`VolumeError::InvalidMesh`] if the input buffers are inconsistent
    /// - [`VolumeError::GridTooLarge`] from the level-set method
    pub fn offset(&self, mesh: &Mesh, thickness: f64) -> VolumeResult<Mesh> {
        if !(thickness.is_finite() && thickness >= 0.0) {
            return Err(VolumeError::invalid(
                "thickness",
                thickness,
                "must be a non-negative magnitude",
            ));
        }
        if self.params.method == OffsetMethod::Sdf {
            validate_voxel_size(self.params.sdf_voxel_size)?;
        }
        mesh.validate()?;
        if thickness == 0.0 || mesh.is_empty() {
            return Ok(mesh.clone());
        }

        let out = match self.params.method {
            OffsetMethod::Normal => self.offset_normal(mesh, thickness),
            OffsetMethod::Sdf => voxel_remesh(
                mesh,
                self.params.sdf_voxel_size,
                -thickness,
                self.params.max_cells,
            )?,
        };
        debug!(
            method = %self.params.method,
            thickness,
            vertices = out.vertex_count(),
            faces = out.face_count(),
            "offset inward"
        );
        Ok(out)
    }

    fn offset_normal(&self, mesh: &Mesh, thickness: f64) -> Mesh {
        let local = thickness / mesh.transform.scaling();
        let max_factor = self.params.max_even_factor.max(1.0);
        let normals = angle_weighted_normals(mesh);
        let factors = even_thickness_factors(mesh, &normals, max_factor);

        let mut out = mesh.clone();
        for ((v, n), k) in out.vertices.iter_mut().zip(&normals).zip(&factors) {
            *v -= *n * (local * k);
        }
        out
    }
}

/// Offset inward with the default (normal) method.
///
/// # Errors
///
/// See [`SignedOffsetter::offset`].
pub fn offset(mesh: &Mesh, thickness: f64) -> VolumeResult<Mesh> {
    SignedOffsetter::default().offset(mesh, thickness)
}

/// Unit vertex normals, each face contributing its normal weighted by the
/// corner angle at the vertex. Unused or degenerate vertices get zero.
#[must_use]
pub fn angle_weighted_normals(mesh: &Mesh) -> Vec<Vector3<f64>> {
    let mut sums = vec![Vector3::zeros(); mesh.vertices.len()];
    for (fi, face) in mesh.faces.iter().enumerate() {
        let Some(normal) = mesh.face_normal(fi) else {
            continue;
        };
        let n = face.len();
        for k in 0..n {
            let prev = mesh.vertices[face[(k + n - 1) % n] as usize];
            let here = mesh.vertices[face[k] as usize];
            let next = mesh.vertices[face[(k + 1) % n] as usize];
            let (Some(a), Some(b)) = (
                (prev - here).try_normalize(f64::MIN_POSITIVE),
                (next - here).try_normalize(f64::MIN_POSITIVE),
            ) else {
                continue;
            };
            let angle = a.dot(&b).clamp(-1.0, 1.0).acos();
            sums[face[k] as usize] += normal * angle;
        }
    }
    sums.into_iter()
        .map(|s| s.try_normalize(f64::MIN_POSITIVE).unwrap_or_else(Vector3::zeros))
        .collect()
}

/// Per-vertex factor `1 / mean(n_v . n_f)` that keeps the offset surface
/// parallel to every incident face, clamped to `[1, max_factor]`.
fn even_thickness_factors(mesh: &Mesh, normals: &[Vector3<f64>], max_factor: f64) -> Vec<f64> {
    let mut dot_sums = vec![0.0; mesh.vertices.len()];
    let mut counts = vec![0u32; mesh.vertices.len()];
    for (fi, face) in mesh.faces.iter().enumerate() {
        let Some(normal) = mesh.face_normal(fi) else {
            continue;
        };
        for &i in face {
            dot_sums[i as usize] += normals[i as usize].dot(&normal);
            counts[i as usize] += 1;
        }
    }
    dot_sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| {
            if count == 0 {
                return 1.0;
            }
            let mean = sum / f64::from(count);
            if mean <= 1.0 / max_factor {
                max_factor
            } else {
                (1.0 / mean).clamp(1.0, max_factor)
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_repair::MeshAdjacency;
    use layer_types::{box_mesh, uv_sphere, Point3, Transform};

    #[test]
    fn zero_thickness_is_identity() {
        let sphere = uv_sphere(1.0, 16, 8);
        assert_eq!(offset(&sphere, 0.0).unwrap(), sphere);
        let sdf = SignedOffsetter::new(OffsetParams::sdf(0.1));
        assert_eq!(sdf.offset(&sphere, 0.0).unwrap(), sphere);
    }

    #[test]
    fn negative_thickness_rejected() {
        let sphere = uv_sphere(1.0, 8, 4);
        for t in [-0.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                offset(&sphere, t),
                Err(VolumeError::InvalidParameter {
                    name: "thickness",
                    ..
                })
            ));
        }
    }

    #[test]
    fn sphere_shrinks_by_thickness() {
        let sphere = uv_sphere(1.0, 48, 24);
        let shrunk = offset(&sphere, 0.1).unwrap();
        for v in &shrunk.vertices {
            assert_relative_eq!(v.coords.norm(), 0.9, epsilon = 5e-3);
        }
        assert!(MeshAdjacency::build(&shrunk.faces).is_watertight());
    }

    #[test]
    fn cube_corners_keep_faces_parallel() {
        let cube = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let shrunk = offset(&cube, 0.25).unwrap();
        // Corner normal is (1,1,1)/sqrt(3); even factor sqrt(3) moves each
        // face plane in by exactly 0.25.
        for v in &shrunk.vertices {
            for c in v.coords.iter() {
                assert_relative_eq!(c.abs(), 0.75, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn thickness_is_in_world_units() {
        let t = Transform::new(Vector3::zeros(), Vector3::zeros(), 2.0);
        let sphere = uv_sphere(1.0, 32, 16).with_transform(t);
        let shrunk = offset(&sphere, 0.2).unwrap();
        for v in &shrunk.vertices {
            assert_relative_eq!(v.coords.norm(), 0.9, epsilon = 5e-3);
        }
        assert_eq!(shrunk.transform, t);
    }

    #[test]
    fn even_factor_is_clamped() {
        // Thin wedge: two nearly opposite faces share an edge
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.01),
                Point3::new(0.5, 1.0, -0.01),
            ],
            &[[0, 1, 2], [1, 0, 3]],
        );
        let normals = angle_weighted_normals(&mesh);
        let factors = even_thickness_factors(&mesh, &normals, 2.0);
        assert!(factors.iter().all(|&k| (1.0..=2.0).contains(&k)));
    }

    #[test]
    fn sdf_method_rebuilds_inner_surface() {
        let sphere = uv_sphere(1.0, 32, 16);
        let shrunk = SignedOffsetter::new(OffsetParams::sdf(0.05))
            .offset(&sphere, 0.2)
            .unwrap();
        assert!(MeshAdjacency::build(&shrunk.faces).is_watertight());
        for v in &shrunk.vertices {
            assert!((v.coords.norm() - 0.8).abs() < 0.05);
        }
    }
}
