//! Service configuration and its built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use gobuild_worker::builder::DEFAULT_ALLOWED_ENV;
use gobuild_worker::{BuilderConfig, EnvironmentVariables, StoreConfig};
use serde::{Deserialize, Serialize};

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub storage: StorageSection,
    pub build: BuildSection,
    pub cleanup: CleanupSection,
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Working directory holding sources and artifacts.
    pub root: PathBuf,
    /// Cleanups slower than this are logged as warnings.
    pub clean_warn_after_seconds: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("gobuild"),
            clean_warn_after_seconds: 60,
        }
    }
}

/// `[build]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// The `go` executable, looked up in `PATH` when not absolute.
    pub go_binary: PathBuf,
    /// Version written into synthesized `go.mod` files. Detected from the
    /// toolchain when unset.
    pub go_version: Option<String>,
    /// Worker environment variables passed through to the toolchain.
    pub allowed_env: Vec<String>,
    /// Keep the module cache when cleaning.
    pub skip_mod_cleanup: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            go_binary: PathBuf::from("go"),
            go_version: None,
            allowed_env: DEFAULT_ALLOWED_ENV.iter().map(|s| s.to_string()).collect(),
            skip_mod_cleanup: false,
        }
    }
}

/// `[cleanup]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupSection {
    /// Seconds between periodic cleanup cycles; also each cycle's deadline.
    pub interval_seconds: u64,
    /// Upper bound for the out-of-space cleanup run inside a build.
    pub emergency_timeout_seconds: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            interval_seconds: 600,
            emergency_timeout_seconds: 60,
        }
    }
}

impl ServiceConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            root: self.storage.root.clone(),
            clean_warn_after: Duration::from_secs(self.storage.clean_warn_after_seconds),
        }
    }

    /// Builder settings for a resolved Go version and captured environment.
    pub fn builder_config(&self, go_version: String, env: EnvironmentVariables) -> BuilderConfig {
        BuilderConfig {
            go_version,
            env,
            skip_mod_cleanup: self.build.skip_mod_cleanup,
            emergency_timeout: Duration::from_secs(self.cleanup.emergency_timeout_seconds),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup.interval_seconds)
    }
}
