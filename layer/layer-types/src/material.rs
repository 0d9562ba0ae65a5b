//! Flat-colour materials used to tag output layers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Linear RGB colour, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgb {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Rgb {
    /// Create a colour from its components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// A named flat-colour material.
///
/// # Example
///
/// ```
/// use layer_types::Material;
///
/// let body = Material::body();
/// assert_eq!(body.name, "BodyMaterial");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Material name as written to the output.
    pub name: String,
    /// Diffuse colour.
    pub color: Rgb,
}

impl Material {
    /// Create a material.
    #[must_use]
    pub fn new(name: impl Into<String>, color: Rgb) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// Skin tone applied to the carved body layer.
    #[must_use]
    pub fn body() -> Self {
        Self::new("BodyMaterial", Rgb::new(0.8, 0.6, 0.5))
    }

    /// Pale blue applied to the preserved dressed layer.
    #[must_use]
    pub fn dressed() -> Self {
        Self::new("DressedMaterial", Rgb::new(0.6, 0.6, 0.8))
    }

    /// Dark blue applied to extracted clothing layers.
    #[must_use]
    pub fn clothing() -> Self {
        Self::new("ClothingMaterial", Rgb::new(0.25, 0.35, 0.6))
    }
}
