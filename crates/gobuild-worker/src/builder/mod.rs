//! Build orchestration.
//!
//! [`Builder::build`] validates a file set, looks the fingerprint up in the
//! artifact store and compiles on a miss. Compilation happens outside the
//! store lock, so independent builds compile concurrently. Two identical
//! requests that miss at the same time both compile.

mod env;
mod error;
mod toolchain;

pub use env::{EnvironmentVariables, DEFAULT_ALLOWED_ENV, PLATFORM_ENV};
pub use error::BuilderError;
pub use toolchain::{
    detect_go_version, parse_go_version, GoToolchain, Toolchain, ToolchainCommand,
    ToolchainError, ToolchainOutput,
};

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gobuild_project::{fingerprint, ArtifactId, BuildError, ProjectInfo, MANIFEST_FILE};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cleanup::{CleanError, Cleaner};
use crate::config::BuilderConfig;
use crate::store::{ArtifactReader, ArtifactStore, StoreError, Workspace, ARTIFACT_EXT};

/// Outcome of a successful build or cache hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    pub artifact_id: ArtifactId,
    /// Name of the artifact file, e.g. `<id>.wasm`.
    pub file_name: String,
    pub is_test: bool,
    pub has_benchmark: bool,
    pub has_fuzz: bool,
}

impl BuildResult {
    fn new(id: &ArtifactId, info: &ProjectInfo) -> Self {
        Self {
            artifact_id: id.clone(),
            file_name: id.file_name(ARTIFACT_EXT),
            is_test: info.is_test(),
            has_benchmark: info.has_benchmark,
            has_fuzz: info.has_fuzz,
        }
    }
}

/// Compiles Go projects to WebAssembly and caches the output.
pub struct Builder {
    store: Arc<dyn ArtifactStore>,
    toolchain: Arc<dyn Toolchain>,
    config: BuilderConfig,
}

impl Builder {
    /// Name reported to the cleanup dispatcher.
    pub const NAME: &'static str = "builder";

    pub fn new(
        store: Arc<dyn ArtifactStore>,
        toolchain: Arc<dyn Toolchain>,
        config: BuilderConfig,
    ) -> Self {
        Self {
            store,
            toolchain,
            config,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Build `files`, or return the cached artifact for an identical set.
    ///
    /// Validation and compiler failures come back as
    /// [`BuilderError::Build`]. When the workspace can't be created because
    /// the disk is full, disk space is reclaimed before the original error
    /// is returned; the build is not retried.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn build(
        &self,
        files: &HashMap<String, Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<BuildResult, BuilderError> {
        let info = gobuild_project::validate(files.iter())?;
        let id = fingerprint(files.iter());
        let result = BuildResult::new(&id, &info);

        if self.store.has_item(&id).await? {
            info!(artifact_id = %id, "cache hit");
            return Ok(result);
        }

        let sources = self.with_manifest(&id, files);
        let workspace = match self.store.create_workspace(&id, &sources).await {
            Ok(workspace) => workspace,
            Err(e) => {
                if e.is_out_of_space() {
                    self.reclaim_disk_space(cancel).await;
                }
                return Err(e.into());
            }
        };

        self.compile(&workspace, &info, cancel).await?;
        info!(
            artifact_id = %id,
            is_test = result.is_test,
            "build finished"
        );
        Ok(result)
    }

    /// Open a previously built artifact.
    pub async fn get_artifact(&self, id: &ArtifactId) -> Result<ArtifactReader, StoreError> {
        self.store.get_item(id).await
    }

    /// Clean the store and the toolchain caches, one after the other.
    ///
    /// Bounded by the configured emergency timeout and by `parent`. Failures
    /// are logged and otherwise ignored.
    pub async fn reclaim_disk_space(&self, parent: &CancellationToken) {
        warn!("out of disk space, running emergency cleanup");
        let token = parent.child_token();
        let deadline = {
            let token = token.clone();
            let timeout = self.config.emergency_timeout;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => token.cancel(),
                    _ = token.cancelled() => {}
                }
            })
        };

        log_emergency_result(self.store.name(), self.store.clean(token.clone()).await);
        log_emergency_result(Self::NAME, Cleaner::clean(self, token.clone()).await);

        token.cancel();
        let _ = deadline.await;
    }

    /// The file set to write: `files`, plus a minimal `go.mod` if missing.
    fn with_manifest<'a>(
        &self,
        id: &ArtifactId,
        files: &'a HashMap<String, Vec<u8>>,
    ) -> Cow<'a, HashMap<String, Vec<u8>>> {
        if files.contains_key(MANIFEST_FILE) {
            return Cow::Borrowed(files);
        }

        let mut files = files.clone();
        files.insert(
            MANIFEST_FILE.to_string(),
            synthesized_manifest(id, &self.config.go_version).into_bytes(),
        );
        Cow::Owned(files)
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        info: &ProjectInfo,
        cancel: &CancellationToken,
    ) -> Result<(), BuilderError> {
        let env = self.toolchain_env();
        let binary = workspace.binary_path.to_string_lossy().into_owned();

        let steps = [
            ToolchainCommand::new(["mod", "tidy"]),
            ToolchainCommand::new(build_args(info, &binary)),
        ];
        for step in steps {
            let step = step
                .with_work_dir(&workspace.source_dir)
                .with_env(env.clone());
            self.run_step(&step, cancel).await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        command: &ToolchainCommand,
        cancel: &CancellationToken,
    ) -> Result<(), BuilderError> {
        debug!(command = %command.display(), "running toolchain");
        let output = self.toolchain.run(command, cancel).await?;
        if output.success() {
            return Ok(());
        }

        let stderr = output.stderr_lossy();
        let stderr = stderr.trim_end();
        let message = if stderr.is_empty() {
            match output.exit_code {
                Some(code) => format!("{} exited with code {}", command.display(), code),
                None => format!("{} was terminated", command.display()),
            }
        } else {
            stderr.to_string()
        };
        Err(BuildError::new(message).into())
    }

    /// Allowed caller variables with the platform variables on top.
    fn toolchain_env(&self) -> EnvironmentVariables {
        self.config.env.concat(&EnvironmentVariables::platform())
    }

    fn clean_command(&self) -> ToolchainCommand {
        let mut args = vec!["clean", "-cache", "-testcache", "-fuzzcache"];
        if !self.config.skip_mod_cleanup {
            args.push("-modcache");
        }
        ToolchainCommand::new(args).with_env(self.toolchain_env())
    }
}

#[async_trait]
impl Cleaner for Builder {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Purge the toolchain's build, test, fuzz and (unless skipped) module
    /// caches.
    async fn clean(&self, cancel: CancellationToken) -> Result<(), CleanError> {
        let command = self.clean_command();
        let output = match self.toolchain.run(&command, &cancel).await {
            Ok(output) => output,
            Err(ToolchainError::Cancelled) => return Err(CleanError::Cancelled),
            Err(e) => return Err(CleanError::Other(e.to_string())),
        };

        if !output.success() {
            return Err(CleanError::Command {
                command: command.display(),
                message: output.stderr_lossy().trim().to_string(),
            });
        }

        info!(
            skip_mod_cleanup = self.config.skip_mod_cleanup,
            "toolchain caches cleaned"
        );
        Ok(())
    }
}

fn log_emergency_result(cleaner: &str, result: Result<(), CleanError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => warn!(cleaner, "emergency cleanup cancelled"),
        Err(e) => warn!(cleaner, error = %e, "emergency cleanup failed"),
    }
}

fn synthesized_manifest(id: &ArtifactId, go_version: &str) -> String {
    format!("module {}\n\ngo {}\n", id, go_version)
}

fn build_args(info: &ProjectInfo, binary: &str) -> Vec<String> {
    let args: Vec<&str> = if info.is_test() {
        vec!["test", "-c", "-o", binary]
    } else {
        vec!["build", "-o", binary, "."]
    };
    args.into_iter().map(String::from).collect()
}
