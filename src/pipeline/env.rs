// ABOUTME: Shared dependencies of the reference pipelines, built once at startup.
// ABOUTME: Hands out per-run logs, shells and chart tooling.

use std::sync::Arc;

use crate::charts::{HelmDeployer, KubeJobs, TestPolicy};
use crate::events::HandlerContext;
use crate::exec::CommandRunner;
use crate::github::{GithubClient, GithubComments, Result, RunningLog, StatusReporter};
use crate::notify::Notifier;
use crate::shell::LoggingShell;

use super::process::Pipeline;

/// How charts are resolved, deployed and tested in this cluster.
#[derive(Debug, Clone)]
pub struct ChartTooling {
    pub values_file: String,
    pub values_command: String,
    pub dry_run: bool,
    pub tests: TestPolicy,
}

impl ChartTooling {
    pub fn deployer(&self, shell: LoggingShell) -> HelmDeployer {
        HelmDeployer::new(shell, &self.values_file)
            .values_command(&self.values_command)
            .dry_run(self.dry_run)
    }

    pub fn jobs(&self, shell: LoggingShell) -> KubeJobs {
        KubeJobs::new(shell, &self.values_file).dry_run(self.dry_run)
    }
}

pub struct PipelineEnv {
    pub cluster_id: String,
    pub repo_url: String,
    pub github: Arc<GithubClient>,
    pub statuses: Arc<dyn StatusReporter>,
    pub notifier: Arc<dyn Notifier>,
    pub runner: CommandRunner,
    pub tooling: ChartTooling,
}

impl std::fmt::Debug for PipelineEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEnv")
            .field("cluster_id", &self.cluster_id)
            .field("repo_url", &self.repo_url)
            .field("tooling", &self.tooling)
            .finish()
    }
}

impl PipelineEnv {
    /// Open a running log on a commit, headed `<cluster id>: <handler>`.
    pub async fn start_log(&self, sha: &str, handler: &str) -> Result<Arc<RunningLog>> {
        let sink = Arc::new(GithubComments::for_commit(self.github.clone(), sha));
        let header = format!("{}: {handler}", self.cluster_id);
        Ok(Arc::new(RunningLog::start(sink, &header).await?))
    }

    /// Logging shell running in the handler's scratch directory.
    pub fn shell(&self, ctx: &HandlerContext, log: Arc<RunningLog>) -> LoggingShell {
        LoggingShell::new(self.runner.in_dir(&ctx.workdir), log)
    }

    pub fn pipeline<'a>(&'a self, deployer: &'a HelmDeployer, jobs: &'a KubeJobs) -> Pipeline<'a> {
        Pipeline {
            cluster_id: &self.cluster_id,
            deployer,
            jobs,
            statuses: self.statuses.as_ref(),
            notifier: self.notifier.as_ref(),
            tests: self.tooling.tests,
        }
    }
}
