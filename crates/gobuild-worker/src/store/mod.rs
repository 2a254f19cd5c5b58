//! Build artifact storage.
//!
//! Artifacts are keyed by [`ArtifactId`]. A store hands out ephemeral
//! [`Workspace`]s for cache misses and reclaims everything at once when
//! cleaned, so it doubles as a [`Cleaner`].

mod disk;
mod reader;

pub use disk::DiskStore;
pub use reader::ArtifactReader;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use gobuild_project::ArtifactId;
use thiserror::Error;

use crate::cleanup::Cleaner;

/// Extension of compiled artifacts.
pub const ARTIFACT_EXT: &str = ".wasm";

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from artifact store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    /// The filesystem reported that no space is left on the device.
    #[error("no space left on device: {0}")]
    OutOfSpace(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_out_of_space(&self) -> bool {
        matches!(self, StoreError::OutOfSpace(_))
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        if is_no_space(&err) {
            StoreError::OutOfSpace(err)
        } else {
            StoreError::Io(err)
        }
    }
}

#[cfg(unix)]
fn is_no_space(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOSPC)
}

#[cfg(not(unix))]
fn is_no_space(err: &io::Error) -> bool {
    // ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
    matches!(err.raw_os_error(), Some(39) | Some(112))
}

/// On-disk locations prepared for a single build attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Directory holding the project sources; the compiler runs here.
    pub source_dir: PathBuf,
    /// Absolute path the compiled binary must be written to.
    pub binary_path: PathBuf,
    /// Absolute paths of every file written into `source_dir`.
    pub files: Vec<PathBuf>,
}

/// Persistent storage for build outputs.
#[async_trait]
pub trait ArtifactStore: Cleaner {
    /// Whether a compiled artifact exists for `id`.
    async fn has_item(&self, id: &ArtifactId) -> StoreResult<bool>;

    /// Open the compiled artifact for `id`.
    ///
    /// Returns [`StoreError::NotFound`] when no artifact exists.
    async fn get_item(&self, id: &ArtifactId) -> StoreResult<ArtifactReader>;

    /// Write `files` into a fresh source directory for `id`.
    async fn create_workspace(
        &self,
        id: &ArtifactId,
        files: &HashMap<String, Vec<u8>>,
    ) -> StoreResult<Workspace>;
}
