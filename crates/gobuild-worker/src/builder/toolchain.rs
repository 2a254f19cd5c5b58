//! Go toolchain subprocess runner.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::env::EnvironmentVariables;

/// Errors starting or supervising a toolchain process.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("toolchain I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("toolchain command cancelled")]
    Cancelled,
}

/// A single toolchain invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainCommand {
    /// Arguments after the toolchain binary, e.g. `["mod", "tidy"]`.
    pub args: Vec<String>,
    /// Working directory; inherits the worker's when unset.
    pub work_dir: Option<PathBuf>,
    /// The complete environment. Nothing else is inherited.
    pub env: EnvironmentVariables,
}

impl ToolchainCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: EnvironmentVariables) -> Self {
        self.env = env;
        self
    }

    /// Human-readable form used in logs and errors, e.g. `go mod tidy`.
    pub fn display(&self) -> String {
        let mut parts = vec!["go".to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Captured result of a finished toolchain process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolchainOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Something that can run Go toolchain commands.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run `command` to completion. Cancelling `cancel` terminates the
    /// process and everything it spawned.
    async fn run(
        &self,
        command: &ToolchainCommand,
        cancel: &CancellationToken,
    ) -> Result<ToolchainOutput, ToolchainError>;
}

/// Runs the real `go` binary.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: PathBuf,
}

impl GoToolchain {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new("go")
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn run(
        &self,
        command: &ToolchainCommand,
        cancel: &CancellationToken,
    ) -> Result<ToolchainOutput, ToolchainError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&command.args)
            .env_clear()
            .envs(command.env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.work_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|source| ToolchainError::Spawn {
            program: self.binary.display().to_string(),
            source,
        })?;
        let pid = child.id();
        debug!(command = %command.display(), pid, "toolchain process started");

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output?;
                Ok(ToolchainOutput {
                    exit_code: output.status.code(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            _ = cancel.cancelled() => {
                kill_process_group(pid);
                Err(ToolchainError::Cancelled)
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "failed to kill toolchain process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Ask the toolchain for its version, e.g. `1.22.3`.
///
/// Returns `None` when the command fails or prints something that is not a
/// release version (development builds, for instance).
pub async fn detect_go_version(
    toolchain: &dyn Toolchain,
    cancel: &CancellationToken,
) -> Result<Option<String>, ToolchainError> {
    let command = ToolchainCommand::new(["env", "GOVERSION"])
        .with_env(EnvironmentVariables::from_process(&["HOME", "PATH", "GOROOT"]));
    let output = toolchain.run(&command, cancel).await?;
    if !output.success() {
        debug!(stderr = %output.stderr_lossy(), "go env GOVERSION failed");
        return Ok(None);
    }
    Ok(parse_go_version(&String::from_utf8_lossy(&output.stdout)))
}

/// `go1.22.3` -> `1.22.3`. Anything after the first whitespace is ignored.
pub fn parse_go_version(raw: &str) -> Option<String> {
    let version = raw.split_whitespace().next()?.strip_prefix("go")?;
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(version.to_string())
}
