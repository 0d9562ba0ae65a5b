//! Error types for mesh construction and validation.

use thiserror::Error;

/// Result type for mesh validation.
pub type MeshResult<T> = Result<T, MeshError>;

/// Violations of the mesh buffer invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending face.
        face: usize,
        /// Offending vertex index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },

    /// A face has fewer than three vertices.
    #[error("face {face} has {len} vertices (need at least 3)")]
    FaceTooSmall {
        /// Offending face.
        face: usize,
        /// Number of indices in the face.
        len: usize,
    },

    /// A per-vertex attribute map has the wrong length.
    #[error("attribute '{name}' has {got} values for {expected} vertices")]
    AttributeLength {
        /// Attribute name.
        name: String,
        /// Vertex count.
        expected: usize,
        /// Attribute length.
        got: usize,
    },

    /// The per-face material index buffer has the wrong length.
    #[error("material index buffer has {got} entries for {expected} faces")]
    MaterialLength {
        /// Face count.
        expected: usize,
        /// Buffer length.
        got: usize,
    },
}
