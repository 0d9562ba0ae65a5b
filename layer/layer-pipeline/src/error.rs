//! Error types for pipeline runs.
//!
//! Operator crates report their own errors; they are sorted into four
//! outcomes here. Configuration and resolution failures happen before any
//! mesh is touched, solver failures abort mid-run, and I/O errors come
//! from loading or persisting unchanged.

use layer_carve::CarveError;
use layer_io::IoError;
use layer_repair::RepairError;
use layer_volume::VolumeError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type LayerResult<T> = Result<T, LayerError>;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum LayerError {
    /// A setting is out of range. Raised before any mutation.
    #[error("configuration error: {0}")]
    Config(String),

    /// The target object could not be resolved. Raised before any mutation.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A geometry operator failed hard.
    #[error("geometry solver error: {0}")]
    Solver(String),

    /// Loading or persisting failed.
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Why no target mesh was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Nothing matched the selector.
    #[error("{0}")]
    TargetNotFound(String),

    /// The selector matched an object that has no mesh.
    #[error("Target object '{name}' is not a mesh (found {kind})")]
    NotAMesh {
        /// Object name.
        name: String,
        /// What the object is instead.
        kind: &'static str,
    },
}

impl LayerError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error was raised before any mesh was modified.
    #[must_use]
    pub fn is_pre_mutation(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Resolution(_))
    }
}

impl From<VolumeError> for LayerError {
    fn from(err: VolumeError) -> Self {
        match err {
            VolumeError::InvalidParameter { .. } => Self::Config(err.to_string()),
            _ => Self::Solver(err.to_string()),
        }
    }
}

impl From<RepairError> for LayerError {
    fn from(err: RepairError) -> Self {
        match err {
            RepairError::InvalidParameter { .. } => Self::Config(err.to_string()),
            RepairError::InvalidMesh(_) => Self::Solver(err.to_string()),
        }
    }
}

impl From<CarveError> for LayerError {
    fn from(err: CarveError) -> Self {
        match err {
            CarveError::InvalidParameter { .. } => Self::Config(err.to_string()),
            CarveError::Repair(inner) => inner.into(),
            CarveError::InvalidMesh(_) | CarveError::Solver { .. } => Self::Solver(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parameter_errors_are_configuration() {
        let volume = VolumeError::InvalidParameter {
            name: "voxel_size",
            value: -1.0,
            reason: "must be positive",
        };
        let err = LayerError::from(volume);
        assert!(matches!(err, LayerError::Config(ref m) if m.contains("voxel_size")));
        assert!(err.is_pre_mutation());
    }

    #[test]
    fn solver_errors_abort() {
        let err = LayerError::from(CarveError::Solver {
            details: "non-finite coordinate".to_string(),
        });
        assert!(matches!(err, LayerError::Solver(ref m) if m.contains("non-finite")));
        assert!(!err.is_pre_mutation());
    }

    #[test]
    fn resolution_messages() {
        let err = LayerError::from(ResolutionError::TargetNotFound(
            "Object 'Hero' not found".to_string(),
        ));
        assert_eq!(err.to_string(), "Object 'Hero' not found");

        let err = ResolutionError::NotAMesh {
            name: "Lamp".to_string(),
            kind: "light",
        };
        assert!(err.to_string().contains("not a mesh"));
    }
}
