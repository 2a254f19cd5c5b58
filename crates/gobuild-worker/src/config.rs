//! Runtime settings for the worker components.

use std::path::PathBuf;
use std::time::Duration;

use crate::builder::EnvironmentVariables;

/// Artifact store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the `src/` and `bin/` trees.
    pub root: PathBuf,
    /// A clean taking longer than this is reported as a warning.
    pub clean_warn_after: Duration,
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clean_warn_after: Duration::from_secs(60),
        }
    }
}

/// Build orchestrator settings.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Go version written into synthesized `go.mod` files.
    pub go_version: String,
    /// Caller-supplied variables passed through to the toolchain.
    pub env: EnvironmentVariables,
    /// Keep the module cache when cleaning toolchain caches.
    pub skip_mod_cleanup: bool,
    /// Upper bound for emergency reclamation after an out-of-space error.
    pub emergency_timeout: Duration,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            go_version: "1.22".to_string(),
            env: EnvironmentVariables::default(),
            skip_mod_cleanup: false,
            emergency_timeout: Duration::from_secs(60),
        }
    }
}
