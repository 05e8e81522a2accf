// ABOUTME: Shell command execution with a hard timeout and process-group teardown.
// ABOUTME: Every external tool (kubectl, helm, git, sendmail) is driven through here.

mod error;

pub use error::{ExecError, Result};

use error::{FailedSnafu, IoSnafu, SpawnSnafu};
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default timeout for a single command (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Time a timed-out process group gets between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

/// Output from a completed command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `sh -c <command>` in its own process group.
///
/// On timeout the whole group receives SIGTERM, then SIGKILL once the grace
/// window passes, so helper processes spawned by the command die with it.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    kill_grace: Duration,
    dir: Option<PathBuf>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            kill_grace: DEFAULT_KILL_GRACE,
            dir: None,
        }
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A runner that executes commands in `dir`.
    pub fn in_dir(&self, dir: impl AsRef<Path>) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            ..self.clone()
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Run a command and return trimmed stdout, failing on a non-zero exit code.
    pub async fn sh(&self, command: &str) -> Result<String> {
        self.sh_with_input(command, None).await
    }

    pub async fn sh_with_input(&self, command: &str, input: Option<&[u8]>) -> Result<String> {
        let output = self.exec(command, input).await?;
        if output.success() {
            let stdout = output.stdout.trim().to_string();
            if !stdout.is_empty() {
                tracing::trace!(command, %stdout, "command output");
            }
            return Ok(stdout);
        }

        FailedSnafu {
            command,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
        .fail()
    }

    /// Run a command to completion, returning its output whatever the exit code.
    pub async fn exec(&self, command: &str, input: Option<&[u8]>) -> Result<CommandOutput> {
        tracing::debug!(command, dir = ?self.dir, "executing");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().context(SpawnSnafu { command })?;
        let pid = child.id();

        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), input) {
            let input = input.to_vec();
            // Written from a task so a large input can't deadlock against a full stdout pipe.
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
            });
        }

        let output = child.wait_with_output();
        tokio::pin!(output);

        match tokio::time::timeout(self.timeout, &mut output).await {
            Ok(result) => {
                let output = result.context(IoSnafu { command })?;
                Ok(CommandOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            Err(_) => {
                tracing::warn!(command, timeout = ?self.timeout, "killing timed out command");
                if let Some(pid) = pid {
                    signal_group(pid, "TERM").await;
                    if tokio::time::timeout(self.kill_grace, &mut output).await.is_ok() {
                        return error::TimedOutSnafu {
                            command,
                            timeout: self.timeout,
                        }
                        .fail();
                    }
                    signal_group(pid, "KILL").await;
                }
                match tokio::time::timeout(self.kill_grace, &mut output).await {
                    Ok(_) => error::TimedOutSnafu {
                        command,
                        timeout: self.timeout,
                    }
                    .fail(),
                    Err(_) => error::UnkillableSnafu { command }.fail(),
                }
            }
        }
    }
}

/// Deliver a signal to every process in the group led by `pid`.
async fn signal_group(pid: u32, signal: &str) {
    let result = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        tracing::warn!(pid, signal, "failed to signal process group: {}", e);
    }
}
