//! gobuild worker
//!
//! Compiles Go projects to WebAssembly and caches the results on disk:
//! - [`store`]: content-addressed artifact store with whole-cache eviction
//! - [`builder`]: validation, cache lookup and toolchain invocation
//! - [`cleanup`]: periodic reclamation of disk space

pub mod builder;
pub mod cleanup;
pub mod config;
pub mod store;

pub use builder::{
    BuildResult, Builder, BuilderError, EnvironmentVariables, GoToolchain, Toolchain,
    ToolchainCommand, ToolchainError, ToolchainOutput,
};
pub use cleanup::{CleanError, Cleaner, CleanupDispatcher, CleanupFailure, CycleReport};
pub use config::{BuilderConfig, StoreConfig};
pub use store::{ArtifactReader, ArtifactStore, DiskStore, StoreError, StoreResult, Workspace};
