//! Error types for carving.

use layer_repair::RepairError;
use layer_types::MeshError;
use thiserror::Error;

/// Result type for carving operations.
pub type CarveResult<T> = Result<T, CarveError>;

/// Errors that can occur while carving or stripping a layer.
#[derive(Debug, Error)]
pub enum CarveError {
    /// An input mesh violates the buffer invariants.
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

    /// The solver could not produce a result.
    #[error("carve solver failed: {details}")]
    Solver {
        /// What went wrong.
        details: String,
    },

    /// Post-carve cleanup failed.
    #[error("cleanup failed: {0}")]
    Repair(#[from] RepairError),
}

impl CarveError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}
