//! Service configuration.
//!
//! Three layers, later ones winning:
//! 1. Built-in defaults
//! 2. TOML file (`--config`)
//! 3. CLI flags

mod defaults;
mod load;
mod merge;

pub use defaults::{BuildSection, CleanupSection, ServiceConfig, StorageSection};
pub use load::{CliOverrides, ConfigError};
pub use merge::{deep_merge, merge_layers};
