//! Working copies of the source mesh.

use layer_types::Mesh;

/// Hands out independent copies of a source mesh.
///
/// The source is only borrowed; every duplicate owns its vertex, face,
/// attribute and material buffers and carries the source transform, so
/// stages can mutate copies freely.
///
/// # Example
///
/// ```
/// use layer_pipeline::MeshRepository;
/// use layer_types::uv_sphere;
///
/// let source = uv_sphere(1.0, 8, 4);
/// let repository = MeshRepository::new(&source);
///
/// let mut body = repository.duplicate();
/// body.vertices.clear();
/// assert_eq!(repository.source().vertex_count(), source.vertex_count());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MeshRepository<'a> {
    source: &'a Mesh,
}

impl<'a> MeshRepository<'a> {
    /// Repository over `source`.
    #[must_use]
    pub fn new(source: &'a Mesh) -> Self {
        Self { source }
    }

    /// The untouched source.
    #[must_use]
    pub fn source(&self) -> &'a Mesh {
        self.source
    }

    /// Deep copy of the source.
    #[must_use]
    pub fn duplicate(&self) -> Mesh {
        self.source.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use layer_types::{uv_sphere, Transform, Vector3};

    #[test]
    fn duplicates_are_independent() {
        let t = Transform::new(Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, 0.3, 0.0), 1.5);
        let mut source = uv_sphere(1.0, 8, 4).with_transform(t);
        source.set_attribute("w", vec![0.5; source.vertex_count()]).unwrap();
        let repository = MeshRepository::new(&source);

        let mut a = repository.duplicate();
        let b = repository.duplicate();
        assert_eq!(a, source);
        assert_eq!(a.transform, t);

        a.vertices[0].x += 1.0;
        a.faces.pop();
        a.remove_attribute("w");
        assert_eq!(b, source);
        assert_eq!(repository.source(), &source);
    }
}
