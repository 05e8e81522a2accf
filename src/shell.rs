// ABOUTME: Command runner that mirrors each command and its output into the running log.
// ABOUTME: Pipeline steps use it so operators can follow a deploy from the commit page.

use std::sync::Arc;

use crate::exec::{CommandRunner, Result};
use crate::github::RunningLog;

#[derive(Debug, Clone)]
pub struct LoggingShell {
    runner: CommandRunner,
    log: Arc<RunningLog>,
}

impl LoggingShell {
    pub fn new(runner: CommandRunner, log: Arc<RunningLog>) -> Self {
        Self { runner, log }
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Run and record the command with its output.
    pub async fn run(&self, command: &str) -> Result<String> {
        let output = self.runner.sh(command).await?;
        self.log.command(command, &output, false).await;
        Ok(output)
    }

    /// Run without touching the running log.
    pub async fn run_quiet(&self, command: &str) -> Result<String> {
        self.runner.sh(command).await
    }
}
