//! The carving strategy seam.

use layer_types::Mesh;

use crate::error::CarveResult;
use crate::warning::QualityWarning;

/// Result of carving a body candidate.
#[derive(Debug, Clone, Default)]
pub struct CarveOutcome {
    /// The carved mesh, in the candidate's frame.
    pub mesh: Mesh,
    /// Quality issues noticed along the way.
    pub warnings: Vec<QualityWarning>,
}

impl CarveOutcome {
    /// Outcome without warnings.
    #[must_use]
    pub fn clean(mesh: Mesh) -> Self {
        Self {
            mesh,
            warnings: Vec::new(),
        }
    }
}

/// A strategy that removes the parts of a body candidate that belong to
/// the clothing.
///
/// `reference` is the dressed surface. Implementations never mutate their
/// inputs and return the carved copy in the candidate's frame; callers run
/// cleanup afterwards.
pub trait LayerCarver: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    /// Carve `body_candidate` against `reference`.
    ///
    /// # Errors
    ///
    /// Invalid inputs or parameters, and hard solver failures.
    fn carve(&self, body_candidate: &Mesh, reference: &Mesh) -> CarveResult<CarveOutcome>;
}
