//! Shared fixtures for the gobuild integration tests.
//!
//! - file-set helpers and sample Go sources
//! - `MockToolchain`: records every command and fakes successful builds
//! - `MockStore`: counts calls and can simulate a full disk

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gobuild_project::ArtifactId;
use gobuild_worker::{
    ArtifactReader, ArtifactStore, BuilderConfig, CleanError, Cleaner, DiskStore, StoreConfig,
    StoreError, StoreResult, Toolchain, ToolchainCommand, ToolchainError, ToolchainOutput,
    Workspace,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const MAIN_GO: &str = "package main\n\nfunc main() {\n\tprintln(\"hello\")\n}\n";

pub const BENCH_TEST_GO: &str = r#"package main

import "testing"

func BenchmarkHello(b *testing.B) {
	for i := 0; i < b.N; i++ {
		_ = i
	}
}
"#;

pub const FUZZ_TEST_GO: &str = r#"package main

import "testing"

func FuzzParse(f *testing.F) {
	f.Fuzz(func(t *testing.T, s string) {})
}
"#;

/// Bytes the mock toolchain writes as a compiled artifact.
pub const FAKE_WASM: &[u8] = b"\0asm\x01\0\0\0";

pub fn files(entries: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(name, content)| (name.to_string(), content.as_bytes().to_vec()))
        .collect()
}

pub fn main_program() -> HashMap<String, Vec<u8>> {
    files(&[("main.go", MAIN_GO)])
}

pub fn disk_store(temp_dir: &TempDir) -> Arc<DiskStore> {
    Arc::new(DiskStore::new(&StoreConfig::new(temp_dir.path().join("work"))).unwrap())
}

pub fn builder_config() -> BuilderConfig {
    BuilderConfig {
        go_version: "1.22".to_string(),
        ..Default::default()
    }
}

// =============================================================================
// Toolchain
// =============================================================================

/// Toolchain stand-in. `build` and `test` write [`FAKE_WASM`] to the `-o`
/// target unless configured to fail.
#[derive(Default)]
pub struct MockToolchain {
    calls: Mutex<Vec<ToolchainCommand>>,
    build_stderr: Option<String>,
    clean_stderr: Option<String>,
    version: Option<String>,
}

impl MockToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles fail with exit code 1 and `stderr`.
    pub fn failing_build(stderr: &str) -> Self {
        Self {
            build_stderr: Some(stderr.to_string()),
            ..Self::default()
        }
    }

    /// `go clean` fails with exit code 1 and `stderr`.
    pub fn failing_clean(stderr: &str) -> Self {
        Self {
            clean_stderr: Some(stderr.to_string()),
            ..Self::default()
        }
    }

    /// `go env GOVERSION` prints `raw`.
    pub fn with_version(raw: &str) -> Self {
        Self {
            version: Some(raw.to_string()),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<ToolchainCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded commands whose first argument is `subcommand`.
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some(subcommand))
            .count()
    }

    pub fn last(&self, subcommand: &str) -> Option<ToolchainCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.args.first().map(String::as_str) == Some(subcommand))
            .cloned()
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> ToolchainOutput {
    ToolchainOutput {
        exit_code: Some(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[async_trait]
impl Toolchain for MockToolchain {
    async fn run(
        &self,
        command: &ToolchainCommand,
        cancel: &CancellationToken,
    ) -> Result<ToolchainOutput, ToolchainError> {
        if cancel.is_cancelled() {
            return Err(ToolchainError::Cancelled);
        }
        self.calls.lock().unwrap().push(command.clone());

        match command.args.first().map(String::as_str) {
            Some("env") => match &self.version {
                Some(raw) => Ok(exit(0, raw, "")),
                None => Ok(exit(1, "", "go: unknown environment setting")),
            },
            Some("build") | Some("test") => {
                if let Some(stderr) = &self.build_stderr {
                    return Ok(exit(1, "", stderr));
                }
                let out = command
                    .args
                    .iter()
                    .position(|a| a == "-o")
                    .and_then(|i| command.args.get(i + 1))
                    .expect("build command has -o");
                std::fs::write(out, FAKE_WASM)?;
                Ok(exit(0, "", ""))
            }
            Some("clean") => match &self.clean_stderr {
                Some(stderr) => Ok(exit(1, "", stderr)),
                None => Ok(exit(0, "", "")),
            },
            _ => Ok(exit(0, "", "")),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store stand-in that never holds artifacts.
#[derive(Default)]
pub struct MockStore {
    pub out_of_space: bool,
    pub has_item_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub clean_calls: AtomicUsize,
}

impl MockStore {
    /// Every workspace creation fails with a full disk.
    pub fn full_disk() -> Self {
        Self {
            out_of_space: true,
            ..Self::default()
        }
    }

    pub fn total_io_calls(&self) -> usize {
        self.has_item_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
            + self.clean_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cleaner for MockStore {
    fn name(&self) -> &str {
        "mock-store"
    }

    async fn clean(&self, _cancel: CancellationToken) -> Result<(), CleanError> {
        self.clean_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MockStore {
    async fn has_item(&self, _id: &ArtifactId) -> StoreResult<bool> {
        self.has_item_calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    async fn get_item(&self, id: &ArtifactId) -> StoreResult<ArtifactReader> {
        Err(StoreError::NotFound(id.clone()))
    }

    async fn create_workspace(
        &self,
        id: &ArtifactId,
        _files: &HashMap<String, Vec<u8>>,
    ) -> StoreResult<Workspace> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.out_of_space {
            return Err(StoreError::OutOfSpace(io::Error::new(
                io::ErrorKind::Other,
                "no space left on device",
            )));
        }
        Ok(Workspace {
            source_dir: std::env::temp_dir().join("gobuild-mock").join(id.as_str()),
            binary_path: PathBuf::from("/nonexistent/mock.wasm"),
            files: Vec::new(),
        })
    }
}
