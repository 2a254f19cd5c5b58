//! gobuild
//!
//! Go to WebAssembly build service with a content-addressed artifact cache.
//!
//! - [`config`]: layered service configuration
//! - [`service`]: wiring of store, builder and cleanup dispatcher
//!
//! The domain types live in the `gobuild-project` and `gobuild-worker`
//! crates and are re-exported here.

pub mod config;
pub mod service;

pub use config::{CliOverrides, ConfigError, ServiceConfig};
pub use service::{read_project_dir, Service, ServiceError};

pub use gobuild_project as project;
pub use gobuild_worker as worker;
