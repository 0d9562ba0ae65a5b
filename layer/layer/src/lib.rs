//! Body and clothing layer separation for dressed character meshes.
//!
//! This umbrella crate re-exports all layer-* crates behind one dependency.
//! None of them depend on a DCC application, so they can be used in CLI
//! tools, servers or batch jobs.
//!
//! # Quick Start
//!
//! ```no_run
//! use layer::prelude::*;
//!
//! // Load a character
//! let scene = layer::io::load_scene("character.obj").unwrap();
//!
//! // Separate it with the boolean strategy
//! let settings = LayerSettings::for_strategy(Strategy::Boolean).with_split(2000);
//! let mut store = DirectoryStore::new("out");
//! let report = LayerPipeline::new(settings)
//!     .run(&scene, &TargetSelector::Largest, &mut store)
//!     .unwrap();
//!
//! println!("{}", report.output);
//! ```
//!
//! # Module Organization
//!
//! ## Foundation
//! - [`types`] - Core data: `Mesh`, `Scene`, `Material`, primitives
//! - [`io`] - OBJ/MTL and STL loading and saving
//! - [`spatial`] - BVH, closest-point and nearest-vertex queries
//!
//! ## Operators
//! - [`repair`] - Welding, cleanup, winding and component splitting
//! - [`volume`] - Voxel remeshing, smoothing and normal offsets
//! - [`carve`] - Boolean and proximity carving, skin stripping
//!
//! ## Orchestration
//! - [`pipeline`] - Settings, target resolution, the run itself and output stores
//!
//! # Feature Flags
//!
//! - `serde` - Serialize meshes, scenes and settings

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

// =============================================================================
// Re-exports
// =============================================================================

/// Core data: `Mesh`, `Scene`, `Material`, primitives.
pub use layer_types as types;

/// OBJ/MTL and STL loading and saving.
pub use layer_io as io;

/// BVH, closest-point and nearest-vertex queries.
pub use layer_spatial as spatial;

/// Welding, cleanup, winding and component splitting.
pub use layer_repair as repair;

/// Voxel remeshing, smoothing and normal offsets.
pub use layer_volume as volume;

/// Boolean and proximity carving, skin stripping.
pub use layer_carve as carve;

/// Settings, target resolution, the run itself and output stores.
pub use layer_pipeline as pipeline;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for layer separation.
///
/// # Usage
///
/// ```
/// use layer::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use layer_types::{Material, Mesh, ObjectKind, Point3, Scene, SceneObject, Transform};

    // I/O
    pub use layer_io::{load_scene, MeshFormat};

    // Operators
    pub use layer_carve::{Falloff, LayerCarver, QualityWarning};
    pub use layer_volume::VolumeRegularizer;

    // Pipeline (main use case)
    pub use layer_pipeline::{
        ClothingMode, DirectoryStore, LayerPipeline, LayerSettings, MemoryStore, OutputStore,
        Strategy, TargetSelector,
    };
}

// =============================================================================
// Tests
// =============================================================================
