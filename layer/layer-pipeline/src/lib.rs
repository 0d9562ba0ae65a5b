//! Separates a dressed character mesh into body and clothing layers.
//!
//! A run resolves one target mesh in a [`Scene`](layer_types::Scene), works
//! on copies of it and produces an [`OutputSet`]:
//!
//! - **`BodyMesh`** - The source remeshed at uniform density, shrunk
//!   slightly and carved so it sits just inside the clothing
//! - **`DressedMesh`** - An untouched copy, when clothing is preserved
//! - **`ClothingMesh`** / **`ClothingPart_NN`** - The dressed surface minus
//!   the body, optionally split into loose parts, when clothing is extracted
//!
//! Two carving strategies are available. [`Strategy::Boolean`] cuts the body
//! with a mesh difference; [`Strategy::Proximity`] deletes body vertices
//! that come too close to the dressed surface and never creates new ones.
//!
//! # Layer Position
//!
//! This crate sits on top of every operator crate:
//!
//! ```text
//! layer-types ─┬─ layer-spatial ─┬─ layer-repair ─┬─ layer-volume ─┐
//!              │                 │                └─ layer-carve ──┼─ layer-pipeline
//!              └─ layer-io ──────┴─────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use layer_pipeline::{LayerPipeline, LayerSettings, MemoryStore, Strategy, TargetSelector};
//! use layer_types::{uv_sphere, Scene};
//!
//! let mut scene = Scene::new();
//! scene.add_mesh("Character", uv_sphere(0.2, 24, 12));
//!
//! let settings = LayerSettings::for_strategy(Strategy::Proximity)
//!     .with_voxel_size(0.02)
//!     .with_smoothing(4, 0.2);
//! let mut store = MemoryStore::new();
//! let report = LayerPipeline::new(settings)
//!     .run(&scene, &TargetSelector::Largest, &mut store)
//!     .unwrap();
//!
//! println!("{}", report.output);
//! assert!(report.output.body().is_some());
//! ```
//!
//! # Failure
//!
//! Settings and the target are checked before any mesh is copied, and the
//! store is only called once every stage has succeeded. A failed run leaves
//! the source scene and the store untouched.

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod error;
mod output;
mod pipeline;
mod repository;
mod settings;
mod store;
mod target;

pub use error::{LayerError, LayerResult, ResolutionError};
pub use output::{Layer, LayerKind, OutputSet};
pub use pipeline::{clothing_parts, LayerPipeline, LayerStats, PipelineState, RunReport};
pub use repository::MeshRepository;
pub use settings::{ClothingMode, LayerSettings, Strategy, DEFAULT_COLLECTION};
pub use store::{DirectoryStore, MemoryStore, OutputStore};
pub use target::TargetSelector;

// Re-exported so callers can tune the falloff and inspect warnings without
// depending on the carving crate.
pub use layer_carve::{Falloff, QualityWarning};
