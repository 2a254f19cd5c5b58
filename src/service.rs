//! Service wiring.
//!
//! Builds the store, toolchain, builder and cleanup dispatcher from a
//! [`ServiceConfig`]. No component reads configuration from anywhere else.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gobuild_project::{ArtifactId, MANIFEST_FILE, SOURCE_EXT};
use gobuild_worker::builder::{detect_go_version, ToolchainError};
use gobuild_worker::{
    ArtifactStore, BuildResult, Builder, BuilderError, Cleaner, CleanupDispatcher, DiskStore,
    EnvironmentVariables, GoToolchain, StoreError, Toolchain,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ServiceConfig;

/// Go version used when the toolchain does not report one.
pub const FALLBACK_GO_VERSION: &str = "1.22";

/// Errors setting up or driving the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to open artifact store at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read project directory {}: {source}", path.display())]
    Project {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Build(#[from] BuilderError),

    #[error(transparent)]
    Artifact(#[from] StoreError),
}

/// The assembled build service.
pub struct Service {
    config: ServiceConfig,
    store: Arc<DiskStore>,
    builder: Arc<Builder>,
}

impl Service {
    /// Assemble the service around the configured `go` binary.
    pub async fn new(
        config: ServiceConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ServiceError> {
        let toolchain = Arc::new(GoToolchain::new(&config.build.go_binary));
        Self::with_toolchain(config, toolchain, cancel).await
    }

    /// Assemble the service around an arbitrary toolchain.
    pub async fn with_toolchain(
        config: ServiceConfig,
        toolchain: Arc<dyn Toolchain>,
        cancel: &CancellationToken,
    ) -> Result<Self, ServiceError> {
        let store = DiskStore::new(&config.store_config()).map_err(|source| ServiceError::Store {
            path: config.storage.root.clone(),
            source,
        })?;
        let store = Arc::new(store);

        let go_version = match &config.build.go_version {
            Some(version) => version.clone(),
            None => match detect_go_version(toolchain.as_ref(), cancel).await? {
                Some(version) => version,
                None => {
                    warn!(
                        fallback = FALLBACK_GO_VERSION,
                        "could not detect Go version, using fallback"
                    );
                    FALLBACK_GO_VERSION.to_string()
                }
            },
        };

        let env = EnvironmentVariables::from_process(&config.build.allowed_env);
        info!(
            root = %config.storage.root.display(),
            go_version = %go_version,
            env_vars = env.len(),
            "build service ready"
        );

        let store_handle: Arc<dyn ArtifactStore> = store.clone();
        let builder = Arc::new(Builder::new(
            store_handle,
            toolchain,
            config.builder_config(go_version, env),
        ));

        Ok(Self {
            config,
            store,
            builder,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DiskStore> {
        &self.store
    }

    pub fn builder(&self) -> &Arc<Builder> {
        &self.builder
    }

    /// Dispatcher running the store and builder cleaners on the configured
    /// interval.
    pub fn dispatcher(&self) -> CleanupDispatcher {
        let store: Arc<dyn Cleaner> = self.store.clone();
        let builder: Arc<dyn Cleaner> = self.builder.clone();
        CleanupDispatcher::new(self.config.cleanup_interval(), vec![store, builder])
    }

    /// Build the Go project in `dir`.
    pub async fn build_dir(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<BuildResult, ServiceError> {
        let files = read_project_dir(dir).map_err(|source| ServiceError::Project {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(self.builder.build(&files, cancel).await?)
    }

    /// Copy the artifact for `id` to `out`, returning its size.
    pub async fn export_artifact(&self, id: &ArtifactId, out: &Path) -> Result<u64, ServiceError> {
        let mut reader = self.builder.get_artifact(id).await?;
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(|e| ServiceError::Artifact(e.into()))?;

        tokio::fs::write(out, &content)
            .await
            .map_err(|source| ServiceError::Output {
                path: out.to_path_buf(),
                source,
            })?;
        Ok(reader.size())
    }
}

/// Collect the `.go` files and `go.mod` under `dir`, keyed by their
/// slash-separated path relative to `dir`. Hidden directories are skipped.
pub fn read_project_dir(dir: &Path) -> io::Result<HashMap<String, Vec<u8>>> {
    let mut files = HashMap::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(dir) {
            Ok(path) => path,
            Err(_) => continue,
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if name != MANIFEST_FILE && !name.ends_with(SOURCE_EXT) {
            continue;
        }

        files.insert(name, std::fs::read(entry.path())?);
    }
    Ok(files)
}
