//! Allow-listed command execution with captured output.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;

use crate::config::SshConfig;
use crate::error::{Error, Result};

/// Captured outcome of one command execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    /// Whether the process exited with status zero
    pub success: bool,
    /// Exit code from the process
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Execution time in milliseconds
    pub duration_ms: u64,
}

/// Runs allow-listed commands, remotely over ssh when a host is configured,
/// locally otherwise.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    ssh: SshConfig,
}

impl CommandRunner {
    pub fn new(ssh: SshConfig) -> Self {
        Self { ssh }
    }

    /// Execute a command already cleared by the allow-list, bounded by
    /// `timeout_secs`. A timed-out child is killed on drop.
    pub async fn run(&self, command: &str, timeout_secs: u64) -> Result<ExecResult> {
        let mut cmd = self.build_command(command);
        cmd.kill_on_drop(true);

        let started = Instant::now();
        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
            .await
            .map_err(|_| Error::Timeout(timeout_secs))?
            .map_err(|err| Error::Upstream {
                status: 502,
                message: format!("Failed to launch command: {}", err),
            })?;
        let duration_ms = started.elapsed().as_millis() as u64;

        Ok(ExecResult {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
        })
    }

    fn build_command(&self, command: &str) -> Command {
        match &self.ssh.host {
            Some(host) => {
                let mut cmd = Command::new("ssh");
                cmd.arg("-o").arg("BatchMode=yes");
                cmd.arg("-o").arg("StrictHostKeyChecking=accept-new");
                if let Some(key) = &self.ssh.key_path {
                    cmd.arg("-i").arg(key);
                }
                let target = match &self.ssh.user {
                    Some(user) => format!("{}@{}", user, host),
                    None => host.clone(),
                };
                cmd.arg(target).arg(command);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(command);
                cmd
            }
        }
    }
}
