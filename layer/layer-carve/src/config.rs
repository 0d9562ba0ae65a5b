//! Configuration and presets for the boolean carver.
//!
//! Tolerances are relative: they are multiplied by the diagonal of the
//! combined bounds of both operands, so one config works for meshes in
//! metres and in millimetres alike.
//!
//! # Presets
//!
//! - [`BooleanConfig::default()`] - Balanced settings for character meshes
//! - [`BooleanConfig::for_scans()`] - Looser tolerances for noisy scan data
//! - [`BooleanConfig::strict()`] - Tightest tolerances, for clean input
//!
//! # Example
//!
//! ```
//! use layer_carve::BooleanConfig;
//!
//! let config = BooleanConfig::for_scans().with_parallel(false);
//! assert!(config.weld_tolerance > BooleanConfig::default().weld_tolerance);
//! ```

/// Configuration for [`crate::BooleanCarver`].
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanConfig {
    /// Relative tolerance for triangle pair intersection tests.
    pub edge_tolerance: f64,

    /// Relative distance below which a vertex counts as lying on a cutter
    /// plane. Such vertices go to both halves of a split.
    pub plane_tolerance: f64,

    /// Relative distance below which seam vertices are welded.
    pub weld_tolerance: f64,

    /// Whether to use parallel processing (via rayon).
    pub parallel: bool,
}

impl Default for BooleanConfig {
    fn default() -> Self {
        Self {
            edge_tolerance: 1e-10,
            plane_tolerance: 1e-9,
            weld_tolerance: 1e-7,
            parallel: true,
        }
    }
}

impl BooleanConfig {
    /// Looser tolerances for scanned or sculpted meshes.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_carve::BooleanConfig;
    ///
    /// let config = BooleanConfig::for_scans();
    /// assert!(config.plane_tolerance > BooleanConfig::default().plane_tolerance);
    /// ```
    #[must_use]
    pub fn for_scans() -> Self {
        Self {
            edge_tolerance: 1e-8,
            plane_tolerance: 1e-7,
            weld_tolerance: 1e-5,
            parallel: true,
        }
    }

    /// Tightest tolerances. Seams may stay open on imperfect input.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_carve::BooleanConfig;
    ///
    /// let config = BooleanConfig::strict();
    /// assert!(config.weld_tolerance < BooleanConfig::default().weld_tolerance);
    /// ```
    #[must_use]
    pub fn strict() -> Self {
        Self {
            edge_tolerance: 1e-12,
            plane_tolerance: 1e-11,
            weld_tolerance: 1e-9,
            parallel: true,
        }
    }

    /// Set the relative weld tolerance.
    #[must_use]
    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }

    /// Set the relative plane tolerance.
    #[must_use]
    pub fn with_plane_tolerance(mut self, tolerance: f64) -> Self {
        self.plane_tolerance = tolerance;
        self
    }

    /// Enable or disable parallel classification.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check every tolerance is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CarveError::InvalidParameter`] naming the first bad
    /// tolerance.
    pub fn validate(&self) -> crate::CarveResult<()> {
        for (name, value) in [
            ("edge_tolerance", self.edge_tolerance),
            ("plane_tolerance", self.plane_tolerance),
            ("weld_tolerance", self.weld_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(crate::CarveError::invalid(
                    name,
                    value,
                    "must be finite and >= 0",
                ));
            }
        }
        Ok(())
    }
}
