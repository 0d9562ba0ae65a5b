//! Error types for cleanup and splitting.

use layer_types::MeshError;
use thiserror::Error;

/// Result type for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// Errors that can occur during cleanup or splitting.
#[derive(Debug, Error)]
pub enum RepairError {
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
}
