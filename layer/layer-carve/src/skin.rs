//! Skin stripping: drop clothing vertices that sit on the body.

use layer_repair::{clean_mesh, CleanParams};
use layer_spatial::SpatialIndex;
use layer_types::Mesh;
use tracing::debug;

use crate::error::{CarveError, CarveResult};

/// Deletes clothing vertices closer to the body than a threshold.
///
/// An extracted clothing shell often keeps a film of body surface where the
/// garment was skin tight. Distances are world-space, to the nearest body
/// vertex. The stripped mesh is cleaned afterwards.
///
/// # Example
///
/// ```
/// use layer_carve::SkinStripper;
/// use layer_types::uv_sphere;
///
/// let clothing = uv_sphere(1.0, 16, 8);
/// let body = uv_sphere(0.5, 16, 8);
///
/// let kept = SkinStripper::default().strip(&clothing, &body, 0.1).unwrap();
/// assert_eq!(kept.vertex_count(), clothing.vertex_count());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SkinStripper {
    clean: CleanParams,
}

impl SkinStripper {
    /// Stripper that cleans with the given parameters.
    #[must_use]
    pub fn new(clean: CleanParams) -> Self {
        Self { clean }
    }

    /// Cleanup parameters applied after stripping.
    #[must_use]
    pub fn clean_params(&self) -> &CleanParams {
        &self.clean
    }

    /// Copy of `clothing` without the vertices (and their faces) whose
    /// nearest body vertex is strictly closer than `threshold`.
    ///
    /// A threshold of zero skips the stage and returns the input unchanged.
    ///
    /// # Errors
    ///
    /// - [`CarveError::InvalidParameter`] for a negative or non-finite threshold
    /// - [`CarveError::InvalidMesh`] if either mesh breaks its buffer invariants
    /// - [`CarveError::Repair`] if the cleanup parameters are invalid
    pub fn strip(&self, clothing: &Mesh, body: &Mesh, threshold: f64) -> CarveResult<Mesh> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(CarveError::invalid(
                "skin_strip_threshold",
                threshold,
                "must be finite and >= 0",
            ));
        }
        clothing.validate()?;
        body.validate()?;
        if threshold == 0.0 {
            return Ok(clothing.clone());
        }

        let index = SpatialIndex::build_from_mesh_world(body);
        let remove: Vec<bool> = index
            .nearest_distances(&clothing.world_positions())
            .into_iter()
            .map(|d| d < threshold)
            .collect();

        let mut out = clothing.clone();
        let removed = out.remove_vertices(&remove);
        let summary = clean_mesh(&mut out, &self.clean)?;
        debug!(removed, threshold, "skin strip: {summary}");
        Ok(out)
    }
}

/// Strip with default cleanup.
///
/// # Errors
///
/// See [`SkinStripper::strip`].
pub fn strip_skin(clothing: &Mesh, body: &Mesh, threshold: f64) -> CarveResult<Mesh> {
    SkinStripper::default().strip(clothing, body, threshold)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::{box_mesh, uv_sphere, Point3, Transform, Vector3};

    #[test]
    fn zero_threshold_is_noop() {
        let clothing = uv_sphere(1.0, 12, 6);
        let body = clothing.clone();
        assert_eq!(strip_skin(&clothing, &body, 0.0).unwrap(), clothing);
    }

    #[test]
    fn negative_threshold_rejected() {
        let mesh = uv_sphere(1.0, 8, 4);
        for t in [-0.001, f64::NAN] {
            assert!(matches!(
                strip_skin(&mesh, &mesh, t),
                Err(CarveError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn coincident_shell_removed() {
        let body = uv_sphere(1.0, 16, 8);
        let stripped = strip_skin(&body, &body, 0.001).unwrap();
        assert!(stripped.is_empty());
    }

    #[test]
    fn only_close_part_removed() {
        // A long box whose left end overlaps the body's vertices
        let clothing = box_mesh(Point3::new(-1.0, -0.2, -0.2), Point3::new(3.0, 0.2, 0.2));
        let body = box_mesh(Point3::new(-1.0, -0.2, -0.2), Point3::new(0.0, 0.2, 0.2));
        let stripped = strip_skin(&clothing, &body, 0.05).unwrap();

        // The four vertices at x = -1 coincide with body corners
        assert_eq!(stripped.vertex_count(), 4);
        assert!(stripped.vertices.iter().all(|v| v.x > 2.9));
    }

    #[test]
    fn distances_use_world_space() {
        let clothing = uv_sphere(1.0, 12, 6);
        let body = uv_sphere(1.0, 12, 6).with_transform(Transform::new(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::zeros(),
            1.0,
        ));
        let stripped = strip_skin(&clothing, &body, 0.5).unwrap();
        assert_eq!(stripped.vertex_count(), clothing.vertex_count());
    }
}
