// ABOUTME: Command execution error types with SNAFU context selectors.
// ABOUTME: Every variant carries the command text so failures are self-describing.

use snafu::Snafu;
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecError {
    #[snafu(display("failed to spawn `{command}`: {source}"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("I/O error while running `{command}`: {source}"))]
    Io {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` timed out after {timeout:?}"))]
    TimedOut { command: String, timeout: Duration },

    #[snafu(display("`{command}` timed out and could not be killed"))]
    Unkillable { command: String },

    #[snafu(display(
        "failed executing `{command}`. Exit code: {exit_code}. Stdout: {stdout}. Stderr: {stderr}"
    ))]
    Failed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

impl ExecError {
    pub fn command(&self) -> &str {
        match self {
            ExecError::Spawn { command, .. }
            | ExecError::Io { command, .. }
            | ExecError::TimedOut { command, .. }
            | ExecError::Unkillable { command }
            | ExecError::Failed { command, .. } => command,
        }
    }

    /// Stderr of a command that ran to completion with a non-zero exit code.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::TimedOut { .. } | ExecError::Unkillable { .. })
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
