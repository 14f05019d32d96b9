//! External process execution with timeout and outcome classification

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Default wall-clock timeout for a single external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// A fully resolved external command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program)
        } else {
            write!(f, "{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured output of a command that exited with status 0.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
}

/// Seam for executing external commands, so the ssh/scp call sequences can be
/// asserted in tests without touching a real host.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion, capturing stdout and stderr.
    ///
    /// Stdin is closed. Non-zero exit maps to
    /// [`SyncError::RemoteCommandFailed`], expiry of `timeout` to
    /// [`SyncError::Timeout`] (the process is forcibly killed), and a failure
    /// to start at all to [`SyncError::Spawn`]. A timeout is a definite
    /// failure: the external side effect state is unknown and the call must
    /// not be retried blindly.
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutcome>;
}

/// Runs commands as real child processes. Holds no state across calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<CommandOutcome> {
        debug!(command = %invocation, timeout_ms = timeout.as_millis() as u64, "running command");

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        // Dropping the wait future on expiry kills the child (kill_on_drop).
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(waited) => waited?,
            Err(_) => {
                return Err(SyncError::Timeout {
                    command: invocation.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutcome { stdout, stderr })
        } else {
            Err(SyncError::RemoteCommandFailed {
                command: invocation.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            })
        }
    }
}
