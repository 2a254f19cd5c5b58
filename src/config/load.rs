//! Layered loading: built-in defaults, an optional TOML file, CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use super::defaults::ServiceConfig;
use super::merge::merge_layers;

/// Errors loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Values set on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub work_dir: Option<PathBuf>,
    pub go_binary: Option<PathBuf>,
    pub interval_seconds: Option<u64>,
}

impl CliOverrides {
    fn to_value(&self) -> Value {
        let mut storage = Map::new();
        if let Some(dir) = &self.work_dir {
            storage.insert("root".into(), json!(dir));
        }

        let mut build = Map::new();
        if let Some(go) = &self.go_binary {
            build.insert("go_binary".into(), json!(go));
        }

        let mut cleanup = Map::new();
        if let Some(secs) = self.interval_seconds {
            cleanup.insert("interval_seconds".into(), json!(secs));
        }

        json!({
            "storage": storage,
            "build": build,
            "cleanup": cleanup,
        })
    }
}

impl ServiceConfig {
    /// Merge defaults, the file at `path` (if any) and `cli`, then validate.
    ///
    /// An explicitly named file that does not exist is an error.
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<Self, ConfigError> {
        let defaults = serde_json::to_value(ServiceConfig::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let mut layers = vec![defaults];
        if let Some(path) = path {
            layers.push(load_toml_file(path)?);
            debug!(path = %path.display(), "loaded config file");
        }
        layers.push(cli.to_value());

        let config: ServiceConfig = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a complete configuration from TOML text on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage.root must not be empty".into()));
        }
        if self.build.go_binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("build.go_binary must not be empty".into()));
        }
        if let Some(version) = &self.build.go_version {
            if !version.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid(format!(
                    "build.go_version must look like 1.22 or 1.22.3, got {:?}",
                    version
                )));
            }
        }
        if self.cleanup.interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cleanup.interval_seconds must be greater than zero".into(),
            ));
        }
        if self.cleanup.emergency_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cleanup.emergency_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Value>(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
