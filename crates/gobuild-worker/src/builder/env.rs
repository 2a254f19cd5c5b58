//! Environment handed to toolchain subprocesses.
//!
//! Toolchain commands never inherit the worker's environment. Only keys on an
//! explicit allow-list are captured, and the fixed platform variables are
//! layered on top so callers cannot override the build target.

use std::collections::BTreeMap;

/// Variables that pin the build target. They always win over captured ones.
pub const PLATFORM_ENV: [(&str, &str); 3] = [
    ("GOOS", "js"),
    ("GOARCH", "wasm"),
    ("CGO_ENABLED", "0"),
];

/// Keys captured from the worker environment when none are configured.
pub const DEFAULT_ALLOWED_ENV: [&str; 11] = [
    "HOME",
    "PATH",
    "GOROOT",
    "GOPATH",
    "GOCACHE",
    "GOMODCACHE",
    "GOPROXY",
    "GOPRIVATE",
    "GONOSUMDB",
    "GOFLAGS",
    "TMPDIR",
];

/// Ordered set of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentVariables {
    vars: BTreeMap<String, String>,
}

impl EnvironmentVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed platform variables.
    pub fn platform() -> Self {
        PLATFORM_ENV.iter().copied().collect()
    }

    /// Pick the allowed keys out of `source`. Keys outside the allow-list are
    /// dropped without inspection.
    pub fn capture<I, K, V>(allowed: &[impl AsRef<str>], source: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars = BTreeMap::new();
        for (key, value) in source {
            let key = key.into();
            if allowed.iter().any(|a| a.as_ref() == key) {
                vars.insert(key, value.into());
            }
        }
        Self { vars }
    }

    /// Capture the allowed keys from the current process environment.
    pub fn from_process(allowed: &[impl AsRef<str>]) -> Self {
        Self::capture(allowed, std::env::vars())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `KEY=VALUE` pairs, sorted by key.
    pub fn join(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    /// Merge `other` into a copy of `self`. Keys present in both take the
    /// value from `other`.
    pub fn concat(&self, other: &EnvironmentVariables) -> EnvironmentVariables {
        let mut vars = self.vars.clone();
        vars.extend(other.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { vars }
    }
}

impl<K, V> FromIterator<(K, V)> for EnvironmentVariables
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
