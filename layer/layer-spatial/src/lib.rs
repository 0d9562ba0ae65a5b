//! Spatial acceleration structures for the layer-separation pipeline.
//!
//! - [`Bvh`] - Bounding volume hierarchy over triangle boxes, with box,
//!   ray and nearest-primitive queries
//! - [`FaceIndex`] - Closest-point, signed-distance and inside/outside
//!   queries against a polygon mesh
//! - [`SpatialIndex`] - Nearest-vertex lookup over a point set
//!
//! All queries work in the frame the mesh vertices are stored in. Callers
//! that mix meshes with different transforms re-express one in the frame of
//! the other first (see [`layer_types::Mesh::expressed_in`]).
//!
//! # Example
//!
//! ```
//! use layer_spatial::FaceIndex;
//! use layer_types::{box_mesh, Point3};
//!
//! let cube = box_mesh(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
//! let index = FaceIndex::new(&cube);
//!
//! assert!(index.contains(&Point3::origin()));
//! let d = index.signed_distance(&Point3::new(0.0, 0.0, 3.0)).unwrap_or(0.0);
//! assert!((d - 2.0).abs() < 1e-9);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
// Allow single-char names in math-heavy code (standard in graphics/geometry algorithms)
#![allow(clippy::many_single_char_names)]
// Allow cast truncation - mesh indices are u32 by construction
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod bvh;
mod face_index;
mod points;
pub mod query;

pub use bvh::{Bvh, BvhStats};
pub use face_index::{ClosestHit, FaceIndex};
pub use points::{Neighbor, SpatialIndex};
pub use query::{closest_point_on_triangle, ray_triangle_intersect};
