// ABOUTME: Startup commands and periodic credential refresh.
// ABOUTME: Also points git at the configured token so private repositories clone over https.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::BootstrapConfig;
use crate::exec::{CommandRunner, Result};

/// Reads the insteadOf base from stdin so the token never appears in a command line.
const GIT_REWRITE_COMMAND: &str = "git config --global \"url.$(cat).insteadOf\"";

/// Base url that embeds `token` for `domain`.
pub fn git_rewrite_url(domain: &str, token: &str) -> String {
    format!(
        "https://{}:x-oauth-basic@{domain}/",
        urlencoding::encode(token)
    )
}

#[derive(Debug)]
pub struct Bootstrap {
    runner: CommandRunner,
    commands: Vec<String>,
    credentials: Vec<String>,
    refresh_every: Duration,
    last_refresh: Option<Instant>,
    git_rewrite: Option<(String, String)>,
}

impl Bootstrap {
    pub fn new(runner: CommandRunner, config: &BootstrapConfig, refresh_every: Duration) -> Self {
        Self {
            runner,
            commands: config.commands.clone(),
            credentials: config.credentials.clone(),
            refresh_every,
            last_refresh: None,
            git_rewrite: None,
        }
    }

    /// Rewrite `https://<domain>/` clones to carry `token`.
    pub fn with_git_token(mut self, domain: &str, token: &str) -> Self {
        self.git_rewrite = Some((git_rewrite_url(domain, token), format!("https://{domain}/")));
        self
    }

    /// Run the startup commands, then the credential commands.
    pub async fn startup(&mut self) -> Result<()> {
        for command in &self.commands {
            tracing::info!(command = %command, "running startup command");
            self.runner.sh(command).await?;
        }
        if let Some((base, original)) = &self.git_rewrite {
            let command = format!("{GIT_REWRITE_COMMAND} '{original}'");
            self.runner.sh_with_input(&command, Some(base.as_bytes())).await?;
            tracing::info!(domain = %original, "configured git credentials");
        }
        self.refresh_credentials().await
    }

    /// Re-run the credential commands when the refresh interval has passed.
    pub async fn refresh_if_due(&mut self) -> Result<bool> {
        let due = self
            .last_refresh
            .is_none_or(|at| at.elapsed() >= self.refresh_every);
        if !due {
            return Ok(false);
        }
        self.refresh_credentials().await?;
        Ok(true)
    }

    async fn refresh_credentials(&mut self) -> Result<()> {
        if !self.credentials.is_empty() {
            tracing::info!("refreshing credentials");
        }
        for command in &self.credentials {
            self.runner.sh(command).await?;
        }
        self.last_refresh = Some(Instant::now());
        Ok(())
    }
}
