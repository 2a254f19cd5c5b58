use gobuild_project::BuildError;
use thiserror::Error;

use super::toolchain::ToolchainError;
use crate::store::StoreError;

/// Errors returned by [`Builder`](super::Builder).
///
/// Only [`BuilderError::Build`] is caused by the submitted project. Every
/// other variant is an infrastructure failure.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Invalid project or compiler diagnostics. Safe to show to the user.
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Toolchain(ToolchainError),

    #[error("build cancelled")]
    Cancelled,
}

impl BuilderError {
    /// Whether the failure is attributable to the submitted project.
    pub fn is_user_error(&self) -> bool {
        matches!(self, BuilderError::Build(_))
    }

    pub fn is_out_of_space(&self) -> bool {
        matches!(self, BuilderError::Store(e) if e.is_out_of_space())
    }
}

impl From<ToolchainError> for BuilderError {
    fn from(err: ToolchainError) -> Self {
        match err {
            ToolchainError::Cancelled => BuilderError::Cancelled,
            other => BuilderError::Toolchain(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_user_error_classification() {
        assert!(BuilderError::from(BuildError::new("file main.go is empty")).is_user_error());
        assert!(!BuilderError::Cancelled.is_user_error());

        let store = BuilderError::from(StoreError::Io(io::Error::other("disk on fire")));
        assert!(!store.is_user_error());
        assert!(!store.is_out_of_space());
    }

    #[test]
    fn test_toolchain_cancel_maps_to_cancelled() {
        assert!(matches!(
            BuilderError::from(ToolchainError::Cancelled),
            BuilderError::Cancelled
        ));
    }

    #[test]
    fn test_build_error_displays_verbatim() {
        let err = BuilderError::from(BuildError::new("too many files (max: 12)"));
        assert_eq!(err.to_string(), "too many files (max: 12)");
    }
}
