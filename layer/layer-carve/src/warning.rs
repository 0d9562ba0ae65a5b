//! Non-fatal geometry quality findings.

use std::fmt;

/// A quality issue noticed during a run.
///
/// Warnings never abort anything. They are collected and reported next to
/// the output so a user can judge whether a layer is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityWarning {
    /// Stage that raised the warning, e.g. `"boolean"`.
    pub stage: String,
    /// Human-readable description.
    pub message: String,
}

impl QualityWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}
