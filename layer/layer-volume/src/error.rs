//! Error types for volumetric operations.

use layer_types::MeshError;
use thiserror::Error;

/// Result type for volumetric operations.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors that can occur during remeshing, smoothing or offsetting.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// The input mesh violates the buffer invariants.
    #[error("invalid input mesh: {0}")]
    InvalidMesh(#[from] MeshError),

    /// A parameter is outside its valid range.
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// What the valid range is.
        reason: &'static str,
    },

    /// The sampling grid would exceed the configured cell budget.
    #[error("grid of {nx}x{ny}x{nz} points exceeds the limit of {max_cells} cells")]
    GridTooLarge {
        /// Points along x.
        nx: usize,
        /// Points along y.
        ny: usize,
        /// Points along z.
        nz: usize,
        /// Configured limit.
        max_cells: usize,
    },

    /// The input holds NaN or infinite coordinates.
    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex {
        /// Offending vertex.
        index: usize,
    },
}

impl VolumeError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}
