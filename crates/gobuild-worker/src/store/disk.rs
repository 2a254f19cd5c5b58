//! Local disk artifact store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/src/<artifact_id>/...        project sources, one tree per build
//! <root>/bin/<artifact_id>.wasm       compiled artifacts
//! ```
//!
//! A single mutex guards every filesystem metadata operation as well as the
//! dirty flag. Cleaning removes both trees entirely.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gobuild_project::ArtifactId;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use super::{ArtifactReader, ArtifactStore, StoreError, StoreResult, Workspace, ARTIFACT_EXT};
use crate::cleanup::{CleanError, Cleaner};
use crate::config::StoreConfig;

const SOURCE_DIR: &str = "src";
const BINARY_DIR: &str = "bin";

/// State shared by the store and the readers it hands out.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    /// Set once any workspace is created; cleared by a successful clean.
    dirty: bool,
}

/// Artifact store backed by the local filesystem.
#[derive(Debug)]
pub struct DiskStore {
    src_root: PathBuf,
    bin_root: PathBuf,
    clean_warn_after: Duration,
    state: Arc<Mutex<StoreState>>,
}

impl DiskStore {
    /// Name reported to the cleanup dispatcher.
    pub const NAME: &'static str = "artifact-store";

    /// Create a store rooted at `config.root`.
    ///
    /// Directories are created lazily. Leftovers from a previous process
    /// mark the store dirty so the next clean reclaims them.
    pub fn new(config: &StoreConfig) -> io::Result<Self> {
        let root = if config.root.is_absolute() {
            config.root.clone()
        } else {
            std::env::current_dir()?.join(&config.root)
        };

        let src_root = root.join(SOURCE_DIR);
        let bin_root = root.join(BINARY_DIR);
        let dirty = src_root.exists() || bin_root.exists();

        Ok(Self {
            src_root,
            bin_root,
            clean_warn_after: config.clean_warn_after,
            state: Arc::new(Mutex::new(StoreState { dirty })),
        })
    }

    /// Directory holding per-build source trees.
    pub fn source_root(&self) -> &Path {
        &self.src_root
    }

    /// Directory holding compiled artifacts.
    pub fn binary_root(&self) -> &Path {
        &self.bin_root
    }

    /// Expected location of the artifact for `id`.
    pub fn binary_path(&self, id: &ArtifactId) -> PathBuf {
        self.bin_root.join(id.file_name(ARTIFACT_EXT))
    }

    /// Whether unreclaimed state exists since the last clean.
    pub async fn is_dirty(&self) -> bool {
        self.state.lock().await.dirty
    }
}

#[async_trait]
impl ArtifactStore for DiskStore {
    async fn has_item(&self, id: &ArtifactId) -> StoreResult<bool> {
        let _guard = self.state.lock().await;
        match fs::metadata(self.binary_path(id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_item(&self, id: &ArtifactId) -> StoreResult<ArtifactReader> {
        let guard = self.state.lock().await;
        let file = match fs::File::open(self.binary_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();
        drop(guard);

        Ok(ArtifactReader::new(file, size, Arc::clone(&self.state)))
    }

    #[instrument(skip(self, files), fields(artifact_id = %id, files = files.len()))]
    async fn create_workspace(
        &self,
        id: &ArtifactId,
        files: &HashMap<String, Vec<u8>>,
    ) -> StoreResult<Workspace> {
        let mut state = self.state.lock().await;
        state.dirty = true;

        fs::create_dir_all(&self.bin_root).await?;
        let source_dir = self.src_root.join(id.as_str());
        fs::create_dir_all(&source_dir).await?;

        let written = match write_files(&source_dir, files).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = fs::remove_dir_all(&source_dir).await {
                    warn!(
                        path = %source_dir.display(),
                        error = %rm,
                        "failed to remove partially written workspace"
                    );
                }
                return Err(e.into());
            }
        };

        debug!(source_dir = %source_dir.display(), "workspace created");
        Ok(Workspace {
            binary_path: self.binary_path(id),
            source_dir,
            files: written,
        })
    }
}

#[async_trait]
impl Cleaner for DiskStore {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn clean(&self, cancel: CancellationToken) -> Result<(), CleanError> {
        let mut state = tokio::select! {
            guard = self.state.lock() => guard,
            _ = cancel.cancelled() => return Err(CleanError::Cancelled),
        };

        if !state.dirty {
            debug!("artifact store is clean, skipping");
            return Ok(());
        }

        let started = Instant::now();
        let reclaimed = disk_usage(vec![self.src_root.clone(), self.bin_root.clone()]).await;

        for root in [&self.src_root, &self.bin_root] {
            match fs::remove_dir_all(root).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        state.dirty = false;

        let elapsed = started.elapsed();
        if elapsed > self.clean_warn_after {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                limit_ms = self.clean_warn_after.as_millis() as u64,
                "artifact store cleanup is taking too long"
            );
        }

        info!(
            reclaimed_bytes = reclaimed,
            elapsed_ms = elapsed.as_millis() as u64,
            "artifact store cleaned"
        );
        Ok(())
    }
}

async fn write_files(dir: &Path, files: &HashMap<String, Vec<u8>>) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            if parent != dir {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&path, content).await?;
        written.push(path);
    }
    Ok(written)
}

/// Total size of regular files under `roots`.
async fn disk_usage(roots: Vec<PathBuf>) -> u64 {
    tokio::task::spawn_blocking(move || roots.iter().map(|root| dir_size(root)).sum())
        .await
        .unwrap_or(0)
}

fn dir_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
