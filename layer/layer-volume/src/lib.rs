//! Volumetric operators for the layer-separation pipeline.
//!
//! - [`VolumeRegularizer`] / [`regularize`] - Voxel remesh a surface into a
//!   uniform-density quad mesh, then smooth it
//! - [`SignedOffsetter`] / [`offset`] - Shrink a surface inward by a fixed
//!   thickness, along normals or through the distance field
//! - [`smooth_laplacian`] - Jacobi Laplacian smoothing with a separate
//!   boundary factor
//! - [`SignedDistanceField`], [`ScalarGrid`], [`extract_surface`] - The
//!   sampling and level-set building blocks
//!
//! Voxel sizes and thicknesses are world units. Work happens in each mesh's
//! local frame, scaled through its transform, and outputs keep the input
//! transform.
//!
//! # Example
//!
//! ```
//! use layer_volume::{offset, regularize};
//! use layer_types::uv_sphere;
//!
//! let dressed = uv_sphere(1.0, 24, 12);
//! let body = regularize(&dressed, 0.2, 3, 0.2).unwrap();
//! let shrunk = offset(&body, 0.05).unwrap();
//!
//! assert_eq!(shrunk.vertex_count(), body.vertex_count());
//! assert!(shrunk.signed_volume() < body.signed_volume());
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::many_single_char_names)]
// Allow casts between grid indices and coordinates - grids are capped well below 2^52 points
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

mod error;
mod grid;
mod offset;
mod regularize;
mod sdf;
mod smooth;
mod surface_nets;

pub use error::{VolumeError, VolumeResult};
pub use grid::ScalarGrid;
pub use offset::{angle_weighted_normals, offset, OffsetMethod, OffsetParams, SignedOffsetter};
pub use regularize::{
    regularize, voxel_remesh, RegularizeParams, RegularizeSummary, VolumeRegularizer,
    DEFAULT_MAX_CELLS,
};
pub use sdf::SignedDistanceField;
pub use smooth::{smooth_laplacian, SmoothParams, SmoothResult};
pub use surface_nets::extract_surface;
