//! Disk space reclamation.
//!
//! Components that own reclaimable on-disk state implement [`Cleaner`]. The
//! [`CleanupDispatcher`] runs every registered cleaner concurrently on a fixed
//! interval, and the builder invokes the same cleaners inline when a
//! workspace cannot be created because the disk is full.

mod dispatcher;

pub use dispatcher::{CleanupDispatcher, CleanupFailure, CycleReport};

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors returned by a cleanup run.
#[derive(Debug, Error)]
pub enum CleanError {
    /// The run was cancelled or hit its deadline.
    #[error("cleanup cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An external command exited unsuccessfully.
    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl CleanError {
    /// Whether this error only reports cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CleanError::Cancelled)
    }
}

/// A named component that can release the disk space it owns.
#[async_trait]
pub trait Cleaner: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Release reclaimable state.
    ///
    /// Implementations should stop early and return
    /// [`CleanError::Cancelled`] once `cancel` fires.
    async fn clean(&self, cancel: CancellationToken) -> Result<(), CleanError>;
}
