//! Carving strategies for the layer-separation pipeline.
//!
//! A body candidate (the dressed surface, regularized and shrunk) still
//! overlaps the clothing. A [`LayerCarver`] removes the overlapping part:
//!
//! - [`BooleanCarver`] - Exact solid difference `candidate - reference`
//!   by polygon splitting and centroid classification
//! - [`ProximityCarver`] - Deletes candidate vertices within a distance
//!   band of the reference, through a transient weight map
//!
//! [`SkinStripper`] drops clothing vertices that sit on the body after the
//! clothing has been extracted.
//!
//! Carvers report non-fatal problems as [`QualityWarning`] values next to
//! the result instead of failing.
//!
//! # Example
//!
//! ```
//! use layer_carve::{BooleanCarver, LayerCarver};
//! use layer_types::{box_mesh, Point3};
//!
//! let body = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
//! let sleeve = box_mesh(Point3::new(1.0, -1.0, -1.0), Point3::new(3.0, 3.0, 3.0));
//!
//! let outcome = BooleanCarver::default().carve(&body, &sleeve).unwrap();
//! assert!((outcome.mesh.signed_volume() - 4.0).abs() < 1e-9);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::many_single_char_names)]
// Allow cast truncation - mesh indices are u32 by construction
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

mod boolean;
mod carver;
mod config;
mod error;
pub mod intersect;
mod proximity;
mod skin;
mod split;
mod warning;

pub use boolean::{difference, BooleanCarver, BooleanOutput, BooleanStats};
pub use carver::{CarveOutcome, LayerCarver};
pub use config::BooleanConfig;
pub use error::{CarveError, CarveResult};
pub use proximity::{
    DistanceMode, Falloff, ProximityCarver, ProximityParams, MASK_THRESHOLD, PROXIMITY_ATTRIBUTE,
};
pub use skin::{strip_skin, SkinStripper};
pub use warning::QualityWarning;
