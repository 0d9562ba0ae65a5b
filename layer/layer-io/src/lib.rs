//! Mesh file I/O for the layer-separation pipeline.
//!
//! - **OBJ** (Wavefront) - Multi-object scenes in, named layers out, with
//!   an **MTL** material library alongside
//! - **STL** (Stereolithography) - Binary and ASCII in, binary out
//!
//! Loaders produce a [`Scene`]: an OBJ file yields one object per `o`
//! block, an STL file a single object named after the file stem. Writers
//! bake each mesh's transform into world-space positions.
//!
//! # Example
//!
//! ```no_run
//! use layer_io::{load_scene, save_obj, ObjObject};
//!
//! let scene = load_scene("character.obj").unwrap();
//! let (object, mesh) = scene.meshes().next().unwrap();
//! save_obj("copy.obj", &[ObjObject::new(&object.name, mesh)], None).unwrap();
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
// Allow casts - mesh indices are u32 and STL stores f32 by format
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

mod error;
mod obj;
mod stl;

pub use error::{IoError, IoResult};
pub use obj::{
    load_mtl, load_obj, read_mtl, read_obj, save_mtl, save_obj, write_mtl, write_obj, ObjObject,
};
pub use stl::{load_stl, save_stl};

use std::path::Path;

use layer_types::Scene;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// OBJ (Wavefront), ASCII, multiple named objects.
    Obj,
    /// STL (Stereolithography), binary and ASCII, one triangle soup.
    Stl,
}

impl MeshFormat {
    /// Detect format from file extension (case-insensitive).
    ///
    /// Returns `None` if the extension is missing or not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "obj" => Some(Self::Obj),
            "stl" => Some(Self::Stl),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Stl => "stl",
        }
    }
}

/// Load a scene from a file, detecting format from extension.
///
/// # Errors
///
/// Returns an error if:
/// - The file format cannot be determined from the extension
/// - The file cannot be read
/// - The file content is invalid for the detected format
///
/// # Example
///
/// ```no_run
/// use layer_io::load_scene;
///
/// let scene = load_scene("scan.stl").unwrap();
/// assert_eq!(scene.objects.len(), 1);
/// ```
pub fn load_scene<P: AsRef<Path>>(path: P) -> IoResult<Scene> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;

    match format {
        MeshFormat::Obj => load_obj(path),
        MeshFormat::Stl => {
            let mesh = load_stl(path)?;
            let mut scene = Scene::new();
            scene.add_mesh(obj::file_stem(path), mesh);
            Ok(scene)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::{box_mesh, Point3};

    #[test]
    fn format_from_path() {
        assert_eq!(MeshFormat::from_path("model.obj"), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_path("model.OBJ"), Some(MeshFormat::Obj));
        assert_eq!(MeshFormat::from_path("/a/b/model.stl"), Some(MeshFormat::Stl));
        assert_eq!(MeshFormat::from_path("model.ply"), None);
        assert_eq!(MeshFormat::from_path("model"), None);
    }

    #[test]
    fn format_extension() {
        assert_eq!(MeshFormat::Obj.extension(), "obj");
        assert_eq!(MeshFormat::Stl.extension(), "stl");
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = load_scene("character.fbx").unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { extension } if extension == "fbx"));
        let err = load_scene("character").unwrap_err();
        assert!(matches!(err, IoError::UnknownFormat { extension } if extension == "(none)"));
    }

    #[test]
    fn stl_scene_named_after_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scan01.stl");
        save_stl(&box_mesh(Point3::origin(), Point3::new(1.0, 1.0, 1.0)), &path).unwrap();

        let scene = load_scene(&path).unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name, "Scan01");
        assert_eq!(scene.objects[0].as_mesh().unwrap().vertex_count(), 8);
    }
}
