// ABOUTME: The reference deploy pipeline: deploy, test, roll back on failure, report.
// ABOUTME: Every outcome is reported as a commit status; unexpected errors are reported and returned.

use nonempty::NonEmpty;

use crate::charts::{ChartError, DeployableDiff, Deployer, JobRunner, TestPolicy};
use crate::github::{BuildStatus, StatusReporter};
use crate::notify::{Address, Notifier};
use crate::shell::LoggingShell;

use super::error::{PipelineError, Result};

/// How a pipeline run ended when nothing unexpected happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Deployed,
    RolledBack,
    RollbackIncomplete,
}

pub struct Pipeline<'a> {
    pub cluster_id: &'a str,
    pub deployer: &'a dyn Deployer,
    pub jobs: &'a dyn JobRunner,
    pub statuses: &'a dyn StatusReporter,
    pub notifier: &'a dyn Notifier,
    pub tests: TestPolicy,
}

impl Pipeline<'_> {
    /// Discover the diff's charts in the checkout, then deploy them.
    ///
    /// A discovery failure is reported like any other pipeline error.
    pub async fn process_checkout(
        &self,
        diff: &mut DeployableDiff,
        shell: &LoggingShell,
    ) -> Result<Outcome> {
        self.status(diff, BuildStatus::Pending, "Starting deployment..")
            .await;
        if let Err(e) = diff.discover_charts(shell, self.deployer).await {
            return Err(self.report_error(diff, e).await);
        }
        self.run_phases(diff).await
    }

    /// Deploy a diff whose charts are already known.
    pub async fn process_diff(&self, diff: &mut DeployableDiff) -> Result<Outcome> {
        self.status(diff, BuildStatus::Pending, "Starting deployment..")
            .await;
        self.run_phases(diff).await
    }

    async fn run_phases(&self, diff: &mut DeployableDiff) -> Result<Outcome> {
        let mut error: Option<ChartError> = None;
        let mut passed = false;
        match diff.deploy(self.deployer).await {
            Ok(true) => {
                self.status(diff, BuildStatus::Pending, "Deployment OK, starting tests..")
                    .await;
                match diff.run_tests(self.jobs, self.tests).await {
                    Ok(ok) => passed = ok,
                    Err(e) => error = Some(e),
                }
            }
            Ok(false) => {}
            Err(e) => error = Some(e),
        }

        let mut rolled_back = false;
        if !passed {
            self.status(
                diff,
                BuildStatus::Failure,
                "Deployment or tests failed, starting rollback..",
            )
            .await;
            match diff.rollback(self.deployer).await {
                Ok(ok) => rolled_back = ok,
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }

        if passed {
            self.status(diff, BuildStatus::Success, "Deployment and tests successful!")
                .await;
        } else {
            let changes = if rolled_back {
                "were rolled"
            } else {
                "failed to roll"
            };
            self.email_authors(diff, changes).await;
            self.status(
                diff,
                BuildStatus::Failure,
                &format!("Deployment failed. Changes {changes} back."),
            )
            .await;
        }

        if let Some(e) = error {
            return Err(self.report_error(diff, e).await);
        }

        Ok(match (passed, rolled_back) {
            (true, _) => Outcome::Deployed,
            (false, true) => Outcome::RolledBack,
            (false, false) => Outcome::RollbackIncomplete,
        })
    }

    async fn report_error(&self, diff: &DeployableDiff, e: ChartError) -> PipelineError {
        tracing::error!(head = %diff.head, "pipeline error: {}", e);
        self.status(diff, BuildStatus::Failure, "Deployment failed due to an error.")
            .await;
        diff.log().section("Error", &e.to_string()).await;
        diff.log()
            .section("Chart status summary:", &diff.chart_status_summary())
            .await;
        e.into()
    }

    async fn status(&self, diff: &DeployableDiff, status: BuildStatus, description: &str) {
        self.statuses
            .set_status(&diff.head, status, description, diff.output_url())
            .await;
    }

    async fn email_authors(&self, diff: &DeployableDiff, changes: &str) {
        let addresses: Vec<Address> = diff.authors.iter().map(Address::from).collect();
        let Some(recipients) = NonEmpty::from_vec(addresses) else {
            tracing::warn!(head = %diff.head, "no authors to notify");
            return;
        };

        let subject = format!("Failed to deploy to {}", self.cluster_id);
        let body = format!(
            "Failed to deploy commit: {}\nCluster: {}\nChanges {changes} back.\n\
             Here is a link to the output:\n{}",
            diff.head,
            self.cluster_id,
            diff.output_url()
        );
        if let Err(e) = self.notifier.notify(&subject, &recipients, &body).await {
            tracing::warn!(head = %diff.head, "failed to notify authors: {}", e);
        }
    }
}
