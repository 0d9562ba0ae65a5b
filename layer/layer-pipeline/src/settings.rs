//! Run configuration.

use std::fmt;

use layer_carve::{Falloff, ProximityParams};
use layer_repair::CleanParams;
use layer_volume::{RegularizeParams, SmoothParams, DEFAULT_MAX_CELLS};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, LayerResult};

/// Default output collection name.
pub const DEFAULT_COLLECTION: &str = "SeparatedCharacter";

/// How the body candidate is carved against the dressed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strategy {
    /// Exact solid difference.
    #[default]
    Boolean,
    /// Delete vertices near the dressed surface.
    Proximity,
}

impl Strategy {
    /// Inward offset applied to the body candidate when none is configured.
    #[must_use]
    pub const fn default_shrink(self) -> f64 {
        match self {
            Self::Boolean => 0.008,
            Self::Proximity => 0.004,
        }
    }

    /// Clothing handling used when none is configured.
    #[must_use]
    pub const fn default_clothing_mode(self) -> ClothingMode {
        match self {
            Self::Boolean => ClothingMode::Extract,
            Self::Proximity => ClothingMode::Preserve,
        }
    }

    /// Smoothing pass that cleans up carve artifacts.
    #[must_use]
    pub fn finishing_smooth(self) -> SmoothParams {
        match self {
            Self::Boolean => SmoothParams::finishing(8),
            Self::Proximity => SmoothParams::finishing(6),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "boolean"),
            Self::Proximity => write!(f, "proximity"),
        }
    }
}

/// What happens to the dressed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClothingMode {
    /// Emit the dressed copy untouched as `DressedMesh`.
    Preserve,
    /// Subtract the body candidate and emit the remaining shell as
    /// `ClothingMesh` (or `ClothingPart_NN` when splitting).
    Extract,
}

impl fmt::Display for ClothingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preserve => write!(f, "preserve"),
            Self::Extract => write!(f, "extract"),
        }
    }
}

/// Configuration for one pipeline run.
///
/// Lengths are world units (meters for the defaults). Strategy-dependent
/// values left as `None` take the strategy's default.
///
/// # Example
///
/// ```
/// use layer_pipeline::{ClothingMode, LayerSettings, Strategy};
///
/// let settings = LayerSettings::for_strategy(Strategy::Proximity)
///     .with_proximity_band(0.0, 0.01);
///
/// assert!(settings.validate().is_ok());
/// assert!((settings.shrink() - 0.004).abs() < 1e-12);
/// assert_eq!(settings.clothing_mode(), ClothingMode::Preserve);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerSettings {
    /// Carving strategy.
    ///
    /// Default: [`Strategy::Boolean`]
    pub strategy: Strategy,

    /// Voxel edge for remeshing the body.
    ///
    /// Default: `0.0075`
    pub voxel_size: f64,

    /// Laplacian passes after remeshing.
    ///
    /// Default: `12`
    pub smooth_iterations: u32,

    /// Laplacian factor after remeshing, in `(0, 1]`.
    ///
    /// Default: `0.2`
    pub smooth_lambda: f64,

    /// Inward offset of the body candidate.
    ///
    /// Default: `None` (`0.008` boolean, `0.004` proximity)
    pub shrink: Option<f64>,

    /// Distance at and below which proximity weight is `1`.
    ///
    /// Default: `0.0`
    pub proximity_min: f64,

    /// Distance at and above which proximity weight is `0`.
    ///
    /// Default: `0.006`
    pub proximity_max: f64,

    /// Proximity weight curve.
    pub falloff: Falloff,

    /// Clothing vertices closer than this to the body candidate are
    /// deleted after extraction. `0` skips the stage.
    ///
    /// Default: `0.0025`
    pub skin_strip: f64,

    /// Weld distance for every cleanup pass.
    ///
    /// Default: `0.0005`
    pub merge_distance: f64,

    /// Clothing handling.
    ///
    /// Default: `None` (extract for boolean, preserve for proximity)
    pub clothing: Option<ClothingMode>,

    /// Split extracted clothing into loose parts.
    ///
    /// Default: `false`
    pub split_loose: bool,

    /// Parts with fewer vertices are discarded when splitting.
    ///
    /// Default: `2000`
    pub min_part_verts: usize,

    /// Output collection name.
    ///
    /// Default: `"SeparatedCharacter"`
    pub collection: String,

    /// Leave the source object visible.
    ///
    /// Default: `false`
    pub keep_original_visible: bool,

    /// Tag layers with flat-colour materials.
    ///
    /// Default: `true`
    pub assign_materials: bool,

    /// Upper bound on volume grid points.
    pub max_cells: usize,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Boolean,
            voxel_size: 0.0075,
            smooth_iterations: 12,
            smooth_lambda: 0.2,
            shrink: None,
            proximity_min: 0.0,
            proximity_max: 0.006,
            falloff: Falloff::Linear,
            skin_strip: 0.0025,
            merge_distance: 0.0005,
            clothing: None,
            split_loose: false,
            min_part_verts: 2000,
            collection: DEFAULT_COLLECTION.to_string(),
            keep_original_visible: false,
            assign_materials: true,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl LayerSettings {
    /// Defaults for a strategy.
    #[must_use]
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Set the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the remesh voxel size.
    #[must_use]
    pub fn with_voxel_size(mut self, voxel_size: f64) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Set the post-remesh smoothing.
    #[must_use]
    pub fn with_smoothing(mut self, iterations: u32, lambda: f64) -> Self {
        self.smooth_iterations = iterations;
        self.smooth_lambda = lambda;
        self
    }

    /// Set the inward offset.
    #[must_use]
    pub fn with_shrink(mut self, shrink: f64) -> Self {
        self.shrink = Some(shrink);
        self
    }

    /// Set the proximity band.
    #[must_use]
    pub fn with_proximity_band(mut self, min: f64, max: f64) -> Self {
        self.proximity_min = min;
        self.proximity_max = max;
        self
    }

    /// Set the proximity falloff.
    #[must_use]
    pub fn with_falloff(mut self, falloff: Falloff) -> Self {
        self.falloff = falloff;
        self
    }

    /// Set the skin strip distance (`0` disables).
    #[must_use]
    pub fn with_skin_strip(mut self, distance: f64) -> Self {
        self.skin_strip = distance;
        self
    }

    /// Set the cleanup weld distance.
    #[must_use]
    pub fn with_merge_distance(mut self, distance: f64) -> Self {
        self.merge_distance = distance;
        self
    }

    /// Force a clothing mode.
    #[must_use]
    pub fn with_clothing(mut self, mode: ClothingMode) -> Self {
        self.clothing = Some(mode);
        self
    }

    /// Enable loose-part splitting with a minimum part size.
    #[must_use]
    pub fn with_split(mut self, min_part_verts: usize) -> Self {
        self.split_loose = true;
        self.min_part_verts = min_part_verts;
        self
    }

    /// Set the output collection name.
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Leave the source visible.
    #[must_use]
    pub fn with_keep_original_visible(mut self, keep: bool) -> Self {
        self.keep_original_visible = keep;
        self
    }

    /// Enable or disable material tagging.
    #[must_use]
    pub fn with_materials(mut self, assign: bool) -> Self {
        self.assign_materials = assign;
        self
    }

    /// Set the volume grid cap.
    #[must_use]
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    /// Effective inward offset.
    #[must_use]
    pub fn shrink(&self) -> f64 {
        self.shrink.unwrap_or(self.strategy.default_shrink())
    }

    /// Effective clothing mode.
    #[must_use]
    pub fn clothing_mode(&self) -> ClothingMode {
        self.clothing
            .unwrap_or(self.strategy.default_clothing_mode())
    }

    /// Remesh parameters for the body candidate.
    #[must_use]
    pub fn regularize_params(&self) -> RegularizeParams {
        RegularizeParams::new(self.voxel_size, self.smooth_iterations, self.smooth_lambda)
            .with_max_cells(self.max_cells)
    }

    /// Proximity carver parameters.
    #[must_use]
    pub fn proximity_params(&self) -> ProximityParams {
        ProximityParams::new(self.proximity_min, self.proximity_max).with_falloff(self.falloff)
    }

    /// Cleanup parameters.
    #[must_use]
    pub fn clean_params(&self) -> CleanParams {
        CleanParams::new(self.merge_distance)
    }

    /// Check every value before a run.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Config`] naming the first invalid value.
    pub fn validate(&self) -> LayerResult<()> {
        self.regularize_params().validate()?;
        self.clean_params().validate()?;
        if self.strategy == Strategy::Proximity {
            self.proximity_params().validate()?;
        }
        let shrink = self.shrink();
        if !(shrink.is_finite() && shrink >= 0.0) {
            return Err(LayerError::config(format!(
                "shrink = {shrink}: must be a non-negative distance"
            )));
        }
        if !(self.skin_strip.is_finite() && self.skin_strip >= 0.0) {
            return Err(LayerError::config(format!(
                "skin_strip = {}: must be a non-negative distance",
                self.skin_strip
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(LayerError::config("collection name must not be empty"));
        }
        if self.collection.contains(['/', '\\']) {
            return Err(LayerError::config(format!(
                "collection name '{}' must not contain path separators",
                self.collection
            )));
        }
        Ok(())
    }
}
