//! Cleanup, winding repair and component splitting for polygon meshes.
//!
//! - [`MeshCleaner`] / [`clean_mesh`] - Weld, drop degenerate and duplicate
//!   faces, drop unreferenced vertices, make winding consistent and outward
//! - [`ComponentSplitter`] / [`split_components`] - Edge-connected components
//!   as standalone meshes, with a minimum vertex count filter
//! - [`MeshAdjacency`] - Edge and vertex adjacency over polygon faces
//!
//! # Example
//!
//! ```
//! use layer_repair::{CleanParams, clean_mesh};
//! use layer_types::{box_mesh, Point3};
//!
//! let mut cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
//! cube.vertices.push(Point3::new(9.0, 9.0, 9.0)); // loose vertex
//!
//! let summary = clean_mesh(&mut cube, &CleanParams::default()).unwrap();
//! assert_eq!(summary.unreferenced_removed, 1);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Allow cast truncation - mesh indices are u32 by construction
#![allow(clippy::cast_possible_truncation)]

mod adjacency;
mod clean;
mod error;
mod split;

pub use adjacency::MeshAdjacency;
pub use clean::{
    clean_mesh, fix_winding, remove_degenerate_faces, remove_duplicate_faces,
    remove_unreferenced_vertices, weld_vertices, CleanParams, CleanSummary, MeshCleaner,
};
pub use error::{RepairError, RepairResult};
pub use split::{find_components, split_components, Component, ComponentSplitter};
