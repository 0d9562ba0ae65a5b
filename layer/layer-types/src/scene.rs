//! Named scene objects as produced by a loader.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Mesh;

/// What a scene object holds.
///
/// Only meshes take part in layer separation; the other kinds exist so a
/// target resolution can report a precise error when pointed at them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObjectKind {
    /// Polygon mesh.
    Mesh(Mesh),
    /// Transform-only placeholder.
    Empty,
    /// Camera.
    Camera,
    /// Light source.
    Light,
    /// Curve or path.
    Curve,
}

impl ObjectKind {
    /// Short lowercase label, for diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "mesh",
            Self::Empty => "empty",
            Self::Camera => "camera",
            Self::Light => "light",
            Self::Curve => "curve",
        }
    }
}

/// A named object in a [`Scene`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SceneObject {
    /// Unique object name.
    pub name: String,
    /// Payload.
    pub kind: ObjectKind,
    /// Visibility flag.
    pub visible: bool,
}

impl SceneObject {
    /// Visible mesh object.
    #[must_use]
    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Mesh(mesh),
            visible: true,
        }
    }

    /// The mesh payload, if any.
    #[must_use]
    pub const fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// An ordered collection of named objects with an optional active object.
///
/// # Example
///
/// ```
/// use layer_types::{uv_sphere, Scene};
///
/// let mut scene = Scene::new();
/// let index = scene.add_mesh("Character", uv_sphere(1.0, 8, 4));
/// scene.set_active(index);
///
/// assert_eq!(scene.active().map(|o| o.name.as_str()), Some("Character"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scene {
    /// Objects in insertion order.
    pub objects: Vec<SceneObject>,
    /// Index of the active object.
    pub active: Option<usize>,
}

impl Scene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its index.
    pub fn add_object(&mut self, object: SceneObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Add a visible mesh object and return its index.
    pub fn add_mesh(&mut self, name: impl Into<String>, mesh: Mesh) -> usize {
        self.add_object(SceneObject::mesh(name, mesh))
    }

    /// Mark an object as active. Out-of-range indices clear the selection.
    pub fn set_active(&mut self, index: usize) {
        self.active = (index < self.objects.len()).then_some(index);
    }

    /// The active object.
    #[must_use]
    pub fn active(&self) -> Option<&SceneObject> {
        self.active.and_then(|i| self.objects.get(i))
    }

    /// Look up an object by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Mutable lookup by exact name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    /// Iterate over mesh objects.
    pub fn meshes(&self) -> impl Iterator<Item = (&SceneObject, &Mesh)> {
        self.objects
            .iter()
            .filter_map(|o| o.as_mesh().map(|m| (o, m)))
    }
}
