//! User-attributable build failures.

use thiserror::Error;

/// A failure caused by the submitted project rather than by the service.
///
/// Covers both project-shape violations and compiler diagnostics. The
/// message is safe to show to the end user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BuildError {
    message: String,
}

impl BuildError {
    /// Create a new build error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
