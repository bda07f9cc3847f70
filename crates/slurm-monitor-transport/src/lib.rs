//! Command execution against a cluster, local or remote.
//!
//! Every Slurm query in this project goes through the [`Transport`] trait:
//! a single `run` contract returning captured stdout/stderr plus a typed
//! [`RunError`]. Two implementations exist: [`LocalTransport`] runs
//! `bash -lc` directly, [`SshTransport`] shells out to the OpenSSH client
//! with connection multiplexing. Retry decisions are made from the error's
//! typed fields by [`is_retryable`], never from error prose this crate
//! produces itself.

pub mod local;
pub mod retry;
pub mod ssh;

pub use local::LocalTransport;
pub use retry::is_retryable;
pub use ssh::{shell_quote, SshOptions, SshTransport};

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Captured output of one completed command.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// A failed command, with everything the caller needs to classify it.
///
/// `stdout`/`stderr` are preserved even on failure: the preflight check
/// reads stdout out of the error to extract the missing-command list, and
/// the retry classifier scans stderr for network signals.
#[derive(Debug)]
pub struct RunError {
    pub command: String,
    pub target: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// True iff the command deadline elapsed before the process exited.
    pub timeout: bool,
    pub source: Option<std::io::Error>,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command failed on {}", self.target)?;
        if self.timeout {
            write!(f, " (timeout)")?;
        }
        if self.exit_code != 0 {
            write!(f, " [exit={}]", self.exit_code)?;
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Uniform command-execution contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run `command` under a deadline, capturing stdout and stderr.
    ///
    /// The child process is terminated when the deadline elapses or the
    /// returned future is dropped; a deadline expiry is reported with
    /// `RunError::timeout == true`.
    async fn run(&self, command: &str, timeout: Duration) -> Result<RunResult, RunError>;

    /// Stable human label for the execution target (`local`, `ssh:<host>`).
    fn describe(&self) -> String;
}

/// Drive a prepared child command to completion under `timeout`.
pub(crate) async fn run_child(
    mut cmd: Command,
    command: &str,
    target: &str,
    timeout: Duration,
) -> Result<RunResult, RunError> {
    tracing::debug!(peer = %target, command = %command, "executing");
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let run_error = |stdout: String, stderr: String, exit_code, timeout, source| RunError {
        command: command.to_string(),
        target: target.to_string(),
        stdout,
        stderr,
        exit_code,
        timeout,
        source,
    };

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return Err(run_error(String::new(), String::new(), 0, false, Some(err)));
        }
        Err(_) => {
            // kill_on_drop has already reaped the child at this point.
            return Err(run_error(String::new(), String::new(), 0, true, None));
        }
    };

    let result = RunResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    };

    if output.status.success() {
        Ok(result)
    } else {
        Err(run_error(
            result.stdout,
            result.stderr,
            output.status.code().unwrap_or(-1),
            false,
            None,
        ))
    }
}
