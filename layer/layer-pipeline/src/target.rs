//! Choosing the mesh to separate.

use std::fmt;

use layer_types::{Mesh, Scene, SceneObject};

use crate::error::ResolutionError;

/// Which scene object a run processes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetSelector {
    /// The scene's active object.
    Active,
    /// The object with this exact name.
    Named(String),
    /// The mesh object with the most vertices.
    #[default]
    Largest,
}

impl TargetSelector {
    /// Selector from command-line style options. `use_active` wins over a
    /// name; with neither, the largest mesh is used.
    #[must_use]
    pub fn from_options(name: Option<&str>, use_active: bool) -> Self {
        match (use_active, name) {
            (true, _) => Self::Active,
            (false, Some(name)) => Self::Named(name.to_string()),
            (false, None) => Self::Largest,
        }
    }

    /// Find the target object and its mesh.
    ///
    /// Ties in [`TargetSelector::Largest`] go to the earlier object.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::TargetNotFound`] when nothing matches
    /// - [`ResolutionError::NotAMesh`] when the match holds no mesh
    pub fn resolve<'s>(
        &self,
        scene: &'s Scene,
    ) -> Result<(&'s SceneObject, &'s Mesh), ResolutionError> {
        let object = match self {
            Self::Active => scene
                .active()
                .ok_or_else(|| ResolutionError::TargetNotFound("No active object".to_string()))?,
            Self::Named(name) => scene.get(name).ok_or_else(|| {
                ResolutionError::TargetNotFound(format!("Object '{name}' not found"))
            })?,
            Self::Largest => {
                let mut best: Option<(&SceneObject, &Mesh)> = None;
                for (object, mesh) in scene.meshes() {
                    if best.map_or(true, |(_, b)| mesh.vertex_count() > b.vertex_count()) {
                        best = Some((object, mesh));
                    }
                }
                return best.ok_or_else(|| {
                    ResolutionError::TargetNotFound("Scene contains no mesh objects".to_string())
                });
            }
        };
        let mesh = object.as_mesh().ok_or_else(|| ResolutionError::NotAMesh {
            name: object.name.clone(),
            kind: object.kind.label(),
        })?;
        Ok((object, mesh))
    }
}

impl fmt::Display for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active object"),
            Self::Named(name) => write!(f, "object '{name}'"),
            Self::Largest => write!(f, "largest mesh"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::{uv_sphere, ObjectKind};

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_mesh("Small", uv_sphere(1.0, 8, 4));
        scene.add_object(SceneObject {
            name: "Lamp".to_string(),
            kind: ObjectKind::Light,
            visible: true,
        });
        scene.add_mesh("Big", uv_sphere(1.0, 16, 8));
        scene.add_mesh("AlsoBig", uv_sphere(2.0, 16, 8));
        scene
    }

    #[test]
    fn from_options_precedence() {
        assert_eq!(TargetSelector::from_options(Some("x"), true), TargetSelector::Active);
        assert_eq!(
            TargetSelector::from_options(Some("x"), false),
            TargetSelector::Named("x".to_string())
        );
        assert_eq!(TargetSelector::from_options(None, false), TargetSelector::Largest);
    }

    #[test]
    fn largest_prefers_first_of_ties() {
        let scene = scene();
        let (object, _) = TargetSelector::Largest.resolve(&scene).unwrap();
        assert_eq!(object.name, "Big");
    }

    #[test]
    fn named_and_active() {
        let mut scene = scene();
        let (object, _) = TargetSelector::Named("Small".to_string()).resolve(&scene).unwrap();
        assert_eq!(object.name, "Small");

        assert_eq!(
            TargetSelector::Active.resolve(&scene).unwrap_err(),
            ResolutionError::TargetNotFound("No active object".to_string())
        );
        scene.set_active(3);
        let (object, _) = TargetSelector::Active.resolve(&scene).unwrap();
        assert_eq!(object.name, "AlsoBig");
    }

    #[test]
    fn failures() {
        let scene = scene();
        assert_eq!(
            TargetSelector::Named("Hero".to_string()).resolve(&scene).unwrap_err(),
            ResolutionError::TargetNotFound("Object 'Hero' not found".to_string())
        );
        assert_eq!(
            TargetSelector::Named("Lamp".to_string()).resolve(&scene).unwrap_err(),
            ResolutionError::NotAMesh {
                name: "Lamp".to_string(),
                kind: "light"
            }
        );
        assert_eq!(
            TargetSelector::Largest.resolve(&Scene::new()).unwrap_err(),
            ResolutionError::TargetNotFound("Scene contains no mesh objects".to_string())
        );
    }
}
