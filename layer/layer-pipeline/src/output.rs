//! Result layers of a run.

use std::fmt;

use layer_carve::QualityWarning;
use layer_types::{Material, Mesh, Scene, SceneObject};

/// Role of an output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Carved inner body.
    Body,
    /// Untouched dressed copy.
    Dressed,
    /// Extracted clothing shell.
    Clothing,
    /// One loose piece of the clothing shell, by discovery index.
    ClothingPart(usize),
}

impl LayerKind {
    /// Object name the layer is written under.
    #[must_use]
    pub fn object_name(self) -> String {
        match self {
            Self::Body => "BodyMesh".to_string(),
            Self::Dressed => "DressedMesh".to_string(),
            Self::Clothing => "ClothingMesh".to_string(),
            Self::ClothingPart(index) => format!("ClothingPart_{index:02}"),
        }
    }

    /// Material tagging this kind of layer.
    #[must_use]
    pub fn material(self) -> Material {
        match self {
            Self::Body => Material::body(),
            Self::Dressed => Material::dressed(),
            Self::Clothing | Self::ClothingPart(_) => Material::clothing(),
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.object_name())
    }
}

/// One named result mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Role.
    pub kind: LayerKind,
    /// Object name (`BodyMesh`, `ClothingPart_03`, ...).
    pub name: String,
    /// Geometry with the source transform.
    pub mesh: Mesh,
    /// Flat-colour tag, unless materials are disabled.
    pub material: Option<Material>,
}

impl Layer {
    /// Untagged layer named after its kind.
    #[must_use]
    pub fn new(kind: LayerKind, mesh: Mesh) -> Self {
        Self {
            kind,
            name: kind.object_name(),
            mesh,
            material: None,
        }
    }
}

/// Everything a run produces, handed to an
/// [`OutputStore`](crate::OutputStore) in one piece.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSet {
    /// Collection the layers are grouped under.
    pub collection: String,
    /// Body first, then the dressed or clothing layers.
    pub layers: Vec<Layer>,
    /// Non-fatal problems met on the way.
    pub warnings: Vec<QualityWarning>,
    /// Name of the processed source object.
    pub source_name: String,
    /// Whether the source object should stay visible.
    pub source_visible: bool,
}

impl OutputSet {
    /// Empty set for a collection.
    #[must_use]
    pub fn new(collection: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            layers: Vec::new(),
            warnings: Vec::new(),
            source_name: source_name.into(),
            source_visible: true,
        }
    }

    /// Layer by object name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// The body layer.
    #[must_use]
    pub fn body(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == LayerKind::Body)
    }

    /// Object names in order.
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    /// Distinct materials in first-use order.
    #[must_use]
    pub fn materials(&self) -> Vec<Material> {
        let mut materials: Vec<Material> = Vec::new();
        for material in self.layers.iter().filter_map(|l| l.material.as_ref()) {
            if !materials.iter().any(|m| m.name == material.name) {
                materials.push(material.clone());
            }
        }
        materials
    }

    /// Tag every layer with the material of its kind.
    pub fn assign_materials(&mut self) {
        for layer in &mut self.layers {
            layer.material = Some(layer.kind.material());
        }
    }

    /// Add the layers to `scene` as visible mesh objects and apply the
    /// source visibility flag.
    ///
    /// Existing objects with a layer's name are replaced, so applying the
    /// same set twice leaves one copy of each layer.
    pub fn apply_to(&self, scene: &mut Scene) {
        for layer in &self.layers {
            let object = SceneObject::mesh(layer.name.clone(), layer.mesh.clone());
            match scene.objects.iter_mut().find(|o| o.name == layer.name) {
                Some(existing) => *existing = object,
                None => {
                    scene.add_object(object);
                }
            }
        }
        if let Some(source) = scene.get_mut(&self.source_name) {
            source.visible = self.source_visible;
        }
    }
}

impl fmt::Display for OutputSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.collection)?;
        for layer in &self.layers {
            write!(
                f,
                " {} ({} verts)",
                layer.name,
                layer.mesh.vertex_count()
            )?;
        }
        if !self.warnings.is_empty() {
            write!(f, ", {} warnings", self.warnings.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::uv_sphere;

    fn sample() -> OutputSet {
        let mut set = OutputSet::new("SeparatedCharacter", "Hero");
        set.layers.push(Layer::new(LayerKind::Body, uv_sphere(0.9, 8, 4)));
        set.layers.push(Layer::new(LayerKind::ClothingPart(0), uv_sphere(1.0, 8, 4)));
        set.layers.push(Layer::new(LayerKind::ClothingPart(12), uv_sphere(1.0, 6, 3)));
        set
    }

    #[test]
    fn names_follow_kind() {
        let set = sample();
        let names: Vec<_> = set.layer_names().collect();
        assert_eq!(names, ["BodyMesh", "ClothingPart_00", "ClothingPart_12"]);
        assert_eq!(LayerKind::Dressed.to_string(), "DressedMesh");
        assert_eq!(LayerKind::Clothing.to_string(), "ClothingMesh");
    }

    #[test]
    fn materials_are_distinct() {
        let mut set = sample();
        assert!(set.materials().is_empty());
        set.assign_materials();
        let names: Vec<_> = set.materials().into_iter().map(|m| m.name).collect();
        assert_eq!(names, ["BodyMaterial", "ClothingMaterial"]);
    }

    #[test]
    fn apply_to_scene_hides_source() {
        let mut scene = Scene::new();
        scene.add_mesh("Hero", uv_sphere(1.0, 8, 4));
        let mut set = sample();
        set.source_visible = false;

        set.apply_to(&mut scene);
        set.apply_to(&mut scene);

        assert_eq!(scene.objects.len(), 4);
        assert!(!scene.get("Hero").unwrap().visible);
        assert!(scene.get("BodyMesh").unwrap().as_mesh().is_some());
    }

    #[test]
    fn display_lists_layers() {
        let text = sample().to_string();
        assert!(text.starts_with("SeparatedCharacter:"));
        assert!(text.contains("BodyMesh (26 verts)"));
    }
}
