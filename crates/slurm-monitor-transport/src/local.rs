//! Local shell transport.

use crate::{run_child, RunError, RunResult, Transport};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

/// Runs commands as `bash -lc <command>` child processes on this machine.
///
/// No shell-injection protection is offered; callers supply fixed, vetted
/// command strings.
#[derive(Debug, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn run(&self, command: &str, timeout: Duration) -> Result<RunResult, RunError> {
        let mut cmd = Command::new("bash");
        cmd.arg("-lc").arg(command);
        run_child(cmd, command, &self.describe(), timeout).await
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}
