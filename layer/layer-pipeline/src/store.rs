//! Persisting an [`OutputSet`].

use std::fs;
use std::path::{Path, PathBuf};

use layer_io::{save_mtl, save_obj, IoError, ObjObject};
use tracing::{debug, warn};

use crate::error::LayerResult;
use crate::output::OutputSet;

/// Receives the finished output of a run, exactly once.
pub trait OutputStore {
    /// Persist the whole set or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Io`](crate::LayerError::Io) when persisting fails.
    fn save(&mut self, output: &OutputSet) -> LayerResult<()>;
}

/// Writes each layer as `<root>/<collection>/<Layer>.obj` with a shared
/// `<collection>.mtl`.
///
/// Files go to a staging directory first, which is renamed into place once
/// every file is written. A previous output for the same collection is
/// replaced. When any write fails, the staging directory is removed and the
/// previous output stays as it was.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store under `root`, created on demand.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a collection ends up in.
    #[must_use]
    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn write_all(staging: &Path, output: &OutputSet) -> Result<(), IoError> {
        let materials = output.materials();
        let mtllib = format!("{}.mtl", output.collection);
        let library = (!materials.is_empty()).then_some(mtllib.as_str());

        for layer in &output.layers {
            let mut object = ObjObject::new(&layer.name, &layer.mesh);
            if let Some(material) = &layer.material {
                object = object.with_material(&material.name);
            }
            save_obj(staging.join(format!("{}.obj", layer.name)), &[object], library)?;
        }
        if !materials.is_empty() {
            save_mtl(staging.join(&mtllib), &materials)?;
        }
        Ok(())
    }
}

impl OutputStore for DirectoryStore {
    fn save(&mut self, output: &OutputSet) -> LayerResult<()> {
        fs::create_dir_all(&self.root).map_err(IoError::from)?;
        let target = self.collection_dir(&output.collection);
        let staging = self
            .root
            .join(format!(".{}.staging-{}", output.collection, std::process::id()));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(IoError::from)?;
        }
        fs::create_dir(&staging).map_err(IoError::from)?;

        let committed = Self::write_all(&staging, output).and_then(|()| {
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(&staging, &target)?;
            Ok(())
        });
        if let Err(err) = committed {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), %cleanup, "could not remove staging directory");
            }
            return Err(err.into());
        }

        debug!(
            path = %target.display(),
            layers = output.layers.len(),
            "saved output set"
        );
        Ok(())
    }
}

/// Keeps saved sets in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Vec<OutputSet>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every set saved so far, oldest first.
    #[must_use]
    pub fn saved(&self) -> &[OutputSet] {
        &self.saved
    }

    /// The most recent set.
    #[must_use]
    pub fn last(&self) -> Option<&OutputSet> {
        self.saved.last()
    }

    /// Whether nothing has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl OutputStore for MemoryStore {
    fn save(&mut self, output: &OutputSet) -> LayerResult<()> {
        self.saved.push(output.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::output::{Layer, LayerKind};
    use layer_io::{load_mtl, load_obj};
    use layer_types::{uv_sphere, Transform, Vector3};

    fn output() -> OutputSet {
        let t = Transform::new(Vector3::new(0.0, 0.0, 1.0), Vector3::zeros(), 1.0);
        let mut set = OutputSet::new("Character", "Source");
        set.layers.push(Layer::new(LayerKind::Body, uv_sphere(0.9, 8, 4).with_transform(t)));
        set.layers.push(Layer::new(LayerKind::Dressed, uv_sphere(1.0, 8, 4)));
        set.assign_materials();
        set
    }

    #[test]
    fn directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path().join("out"));
        store.save(&output()).unwrap();

        let target = store.collection_dir("Character");
        let body = load_obj(target.join("BodyMesh.obj")).unwrap();
        let mesh = body.get("BodyMesh").unwrap().as_mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 26);
        // positions are baked into world space
        assert!(mesh.bounds().min.z > 0.0);
        assert!(target.join("DressedMesh.obj").exists());

        let text = fs::read_to_string(target.join("BodyMesh.obj")).unwrap();
        assert!(text.contains("mtllib Character.mtl"));
        assert!(text.contains("usemtl BodyMaterial"));
        let materials = load_mtl(target.join("Character.mtl")).unwrap();
        assert_eq!(materials.len(), 2);

        let leftovers: Vec<_> = fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, ["Character"]);
    }

    #[test]
    fn resave_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        store.save(&output()).unwrap();

        let mut smaller = output();
        smaller.layers.truncate(1);
        store.save(&smaller).unwrap();

        let target = store.collection_dir("Character");
        assert!(target.join("BodyMesh.obj").exists());
        assert!(!target.join("DressedMesh.obj").exists());
    }

    #[test]
    fn no_materials_no_library() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        let mut set = output();
        for layer in &mut set.layers {
            layer.material = None;
        }
        store.save(&set).unwrap();

        let target = store.collection_dir("Character");
        assert!(!target.join("Character.mtl").exists());
        let text = fs::read_to_string(target.join("BodyMesh.obj")).unwrap();
        assert!(!text.contains("mtllib"));
    }

    #[test]
    fn empty_layer_reads_back_as_empty_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirectoryStore::new(dir.path());
        let mut set = OutputSet::new("Character", "Source");
        set.layers.push(Layer::new(LayerKind::Body, layer_types::Mesh::new()));
        set.layers.push(Layer::new(LayerKind::Dressed, uv_sphere(1.0, 8, 4)));
        set.assign_materials();
        store.save(&set).unwrap();

        let target = store.collection_dir("Character");
        let body = load_obj(target.join("BodyMesh.obj")).unwrap();
        let mesh = body.get("BodyMesh").unwrap().as_mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.face_count(), 0);
    }

    #[test]
    fn memory_store_keeps_sets() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.save(&output()).unwrap();
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.last().unwrap().collection, "Character");
    }
}
