//! Proximity masking.
//!
//! Every candidate vertex gets a weight from its distance `d` to the
//! reference surface:
//!
//! ```text
//! w = 1                                   d <= min
//! w = falloff((max - d) / (max - min))    min < d < max
//! w = 0                                   d >= max
//! ```
//!
//! Vertices with `w > 0.5` are deleted together with their faces. Both
//! falloff shapes cross `0.5` at the middle of the band, so with `min = 0`
//! every surviving vertex is at least `max / 2` from the reference.

use std::fmt;

use layer_spatial::{FaceIndex, SpatialIndex};
use layer_types::{Mesh, Transform};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::carver::{CarveOutcome, LayerCarver};
use crate::error::{CarveError, CarveResult};
use crate::warning::QualityWarning;

/// Per-vertex attribute holding the weight while the mask is applied.
pub const PROXIMITY_ATTRIBUTE: &str = "proximity_weight";

/// Vertices weighted above this are deleted.
pub const MASK_THRESHOLD: f64 = 0.5;

const STAGE: &str = "proximity";

/// Shape of the weight curve across the proximity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Falloff {
    /// Straight ramp.
    #[default]
    Linear,
    /// Hermite `s² (3 - 2s)`: flat at both ends of the band.
    Smoothstep,
}

impl Falloff {
    /// Map a normalized closeness `s ∈ [0, 1]` to a weight.
    #[must_use]
    pub fn apply(self, s: f64) -> f64 {
        match self {
            Self::Linear => s,
            Self::Smoothstep => s * s * (3.0 - 2.0 * s),
        }
    }
}

impl fmt::Display for Falloff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Smoothstep => write!(f, "smoothstep"),
        }
    }
}

/// What distances are measured to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceMode {
    /// Exact distance to the reference surface through a face BVH.
    /// References without faces fall back to [`DistanceMode::Vertices`].
    #[default]
    Surface,
    /// Distance to the nearest reference vertex through a k-d tree.
    Vertices,
}

/// Parameters for [`ProximityCarver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityParams {
    /// Distance at and below which the weight is `1`, world units.
    ///
    /// Default: `0.0`
    pub proximity_min: f64,

    /// Distance at and above which the weight is `0`, world units.
    ///
    /// Default: `0.006`
    pub proximity_max: f64,

    /// Weight curve inside the band.
    pub falloff: Falloff,

    /// Distance measure.
    pub mode: DistanceMode,
}

impl Default for ProximityParams {
    fn default() -> Self {
        Self {
            proximity_min: 0.0,
            proximity_max: 0.006,
            falloff: Falloff::Linear,
            mode: DistanceMode::Surface,
        }
    }
}

impl ProximityParams {
    /// Params for the band `[min, max]`.
    #[must_use]
    pub fn new(proximity_min: f64, proximity_max: f64) -> Self {
        Self {
            proximity_min,
            proximity_max,
            ..Self::default()
        }
    }

    /// Set the falloff shape.
    #[must_use]
    pub fn with_falloff(mut self, falloff: Falloff) -> Self {
        self.falloff = falloff;
        self
    }

    /// Set the distance measure.
    #[must_use]
    pub fn with_mode(mut self, mode: DistanceMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the band.
    ///
    /// # Errors
    ///
    /// Returns [`CarveError::InvalidParameter`] for a negative or
    /// non-finite bound, or `proximity_max <= proximity_min`.
    pub fn validate(&self) -> CarveResult<()> {
        if !(self.proximity_min.is_finite() && self.proximity_min >= 0.0) {
            return Err(CarveError::invalid(
                "proximity_min",
                self.proximity_min,
                "must be finite and >= 0",
            ));
        }
        if !(self.proximity_max.is_finite() && self.proximity_max > self.proximity_min) {
            return Err(CarveError::invalid(
                "proximity_max",
                self.proximity_max,
                "must be finite and greater than proximity_min",
            ));
        }
        Ok(())
    }

    /// Weight for a distance.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_carve::ProximityParams;
    ///
    /// let params = ProximityParams::new(0.0, 0.01);
    /// assert_eq!(params.weight(0.0), 1.0);
    /// assert!((params.weight(0.005) - 0.5).abs() < 1e-12);
    /// assert_eq!(params.weight(0.02), 0.0);
    /// ```
    #[must_use]
    pub fn weight(&self, distance: f64) -> f64 {
        if distance <= self.proximity_min {
            return 1.0;
        }
        if distance >= self.proximity_max {
            return 0.0;
        }
        let s = (self.proximity_max - distance) / (self.proximity_max - self.proximity_min);
        self.falloff.apply(s.clamp(0.0, 1.0))
    }
}

/// Carves by deleting candidate vertices that lie close to the reference.
///
/// Faster than the boolean difference and never fails on open or
/// self-intersecting input, at the price of a ragged border.
///
/// # Example
///
/// ```
/// use layer_carve::{LayerCarver, ProximityCarver, ProximityParams};
/// use layer_types::uv_sphere;
///
/// let body = uv_sphere(1.0, 16, 8);
/// let dressed = uv_sphere(1.002, 16, 8);
///
/// let carver = ProximityCarver::new(ProximityParams::new(0.0, 0.006));
/// let outcome = carver.carve(&body, &dressed).unwrap();
/// assert!(outcome.mesh.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityCarver {
    params: ProximityParams,
}

impl ProximityCarver {
    /// Carver with the given parameters.
    #[must_use]
    pub fn new(params: ProximityParams) -> Self {
        Self { params }
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &ProximityParams {
        &self.params
    }

    /// World-space distance from every candidate vertex to the reference.
    ///
    /// Every entry is `f64::INFINITY` when the reference has no vertices.
    #[must_use]
    pub fn distances(&self, candidate: &Mesh, reference: &Mesh) -> Vec<f64> {
        let points = candidate.world_positions();
        if self.params.mode == DistanceMode::Surface && !reference.faces.is_empty() {
            let index = FaceIndex::new(&reference.expressed_in(&Transform::identity()));
            points
                .par_iter()
                .map(|p| index.distance(p).unwrap_or(f64::INFINITY))
                .collect()
        } else {
            SpatialIndex::build_from_mesh_world(reference).nearest_distances(&points)
        }
    }
}

impl LayerCarver for ProximityCarver {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn carve(&self, body_candidate: &Mesh, reference: &Mesh) -> CarveResult<CarveOutcome> {
        self.params.validate()?;
        body_candidate.validate()?;
        reference.validate()?;

        let mut mesh = body_candidate.clone();
        if mesh.vertices.is_empty() {
            return Ok(CarveOutcome::clean(mesh));
        }

        let weights: Vec<f64> = self
            .distances(body_candidate, reference)
            .into_iter()
            .map(|d| self.params.weight(d))
            .collect();
        mesh.set_attribute(PROXIMITY_ATTRIBUTE, weights)?;

        let mask: Vec<bool> = mesh
            .attribute(PROXIMITY_ATTRIBUTE)
            .map(|w| w.iter().map(|&w| w > MASK_THRESHOLD).collect())
            .unwrap_or_default();
        let removed = mesh.remove_vertices(&mask);
        mesh.remove_attribute(PROXIMITY_ATTRIBUTE);

        debug!(
            removed,
            remaining = mesh.vertex_count(),
            min = self.params.proximity_min,
            max = self.params.proximity_max,
            falloff = %self.params.falloff,
            "proximity mask"
        );

        let mut warnings = Vec::new();
        if mesh.faces.is_empty() && !body_candidate.faces.is_empty() {
            warnings.push(QualityWarning::new(
                STAGE,
                format!(
                    "every one of {} candidate vertices was within the proximity band",
                    body_candidate.vertex_count()
                ),
            ));
        }
        Ok(CarveOutcome { mesh, warnings })
    }
}
