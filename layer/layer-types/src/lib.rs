//! Core data types for the layer-separation pipeline.
//!
//! This crate provides the foundational types every other `layer-*` crate
//! works on:
//!
//! - [`Mesh`] - A polygon mesh with a world transform, named per-vertex
//!   scalar attributes and optional per-face material indices
//! - [`Face`] - A polygon as a list of vertex indices (three or more)
//! - [`Transform`] - Uniform-scale similarity placing a mesh in world space
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`Material`] - Flat colour tag used to identify output layers
//! - [`Scene`] - Named objects as handed over by a loader
//!
//! # Units
//!
//! This library is **unit-agnostic**. All coordinates are `f64`. The pipeline
//! defaults (voxel size, offsets) assume meters.
//!
//! # Winding
//!
//! Faces are **counter-clockwise (CCW) when viewed from outside**. Normals
//! point outward by the right-hand rule.
//!
//! # Example
//!
//! ```
//! use layer_types::{Mesh, Point3};
//!
//! let mesh = Mesh::from_triangles(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     &[[0, 1, 2]],
//! );
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(mesh.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod error;
mod material;
mod mesh;
mod primitives;
mod scene;
mod triangle;

pub use bounds::Aabb;
pub use error::{MeshError, MeshResult};
pub use material::{Material, Rgb};
pub use mesh::{face_edges, flip_face, Face, Mesh};
pub use primitives::{box_mesh, uv_sphere};
pub use scene::{ObjectKind, Scene, SceneObject};
pub use triangle::Triangle;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Similarity3, UnitQuaternion, Vector3};

/// A single rigid / uniform-scale transform placing a mesh in world space.
pub type Transform = Similarity3<f64>;
