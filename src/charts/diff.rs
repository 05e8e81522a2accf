// ABOUTME: The set of charts changed between two commits and the deploy/test/rollback phases over them.
// ABOUTME: Deploy is fail-fast, tests stop at the first failure, rollback visits every eligible chart.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::github::{Author, RunningLog};
use crate::shell::LoggingShell;

use super::chart::Chart;
use super::deployer::Deployer;
use super::error::Result;
use super::jobs::{JobRunner, JobStatus, release_name};
use super::status::ChartStatus;

/// File marking a first-level directory as a deployable chart.
pub const CHART_DESCRIPTOR: &str = "Chart.yaml";

/// How integration-test jobs are polled.
#[derive(Debug, Clone, Copy)]
pub struct TestPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for TestPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// First-level directories holding a changed file and a chart descriptor, sorted.
pub fn changed_units(changed_files: &str, root: &Path) -> Vec<String> {
    changed_files
        .lines()
        .filter_map(|file| file.split_once('/').map(|(dir, _)| dir))
        .filter(|dir| !dir.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|dir| root.join(dir).join(CHART_DESCRIPTOR).is_file())
        .map(String::from)
        .collect()
}

/// Charts changed between `base` and `merge`.
///
/// For a push `merge` equals `head`; for a pull request it is the local
/// speculative merge commit.
#[derive(Debug)]
pub struct DeployableDiff {
    pub base: String,
    pub head: String,
    pub merge: String,
    pub authors: Vec<Author>,
    pub charts: Vec<Chart>,
    log: Arc<RunningLog>,
}

impl DeployableDiff {
    pub fn new(
        base: impl Into<String>,
        head: impl Into<String>,
        merge: impl Into<String>,
        authors: Vec<Author>,
        charts: Vec<Chart>,
        log: Arc<RunningLog>,
    ) -> Self {
        Self {
            base: base.into(),
            head: head.into(),
            merge: merge.into(),
            authors,
            charts,
            log,
        }
    }

    /// Fill in the changed charts from the repository checked out in the shell's directory.
    pub async fn discover_charts(
        &mut self,
        shell: &LoggingShell,
        deployer: &dyn Deployer,
    ) -> Result<()> {
        let releases = deployer.releases().await?;
        let changed = shell
            .run(&format!("git diff --name-only {}..{}", self.base, self.merge))
            .await?;
        let root = shell.runner().dir().unwrap_or_else(|| Path::new("."));

        let mut charts = Vec::new();
        for name in changed_units(&changed, root) {
            charts.push(Chart::discover(&name, &releases, deployer, &self.log).await?);
        }
        tracing::info!(
            base = %self.base,
            merge = %self.merge,
            charts = charts.len(),
            "resolved deployable diff"
        );
        self.charts = charts;
        Ok(())
    }

    pub fn log(&self) -> &RunningLog {
        &self.log
    }

    /// Link to the running log for status target urls.
    pub fn output_url(&self) -> &str {
        self.log.html_url()
    }

    /// Upgrade every enabled chart in order; stop at the first failure.
    pub async fn deploy(&mut self, deployer: &dyn Deployer) -> Result<bool> {
        self.log.note("Chart deployment commencing.").await;
        for chart in &mut self.charts {
            if !chart.enabled {
                self.log
                    .note(&format!(
                        "Continuous deployment for chart {} not enabled, skipping.",
                        chart.name
                    ))
                    .await;
                continue;
            }
            if !chart.upgrade(deployer, &self.log).await? {
                return Ok(false);
            }
        }
        self.log.note("Chart deployment complete.").await;
        Ok(true)
    }

    /// Test names across enabled charts, de-duplicated.
    pub fn tests(&self) -> BTreeSet<&str> {
        self.charts
            .iter()
            .filter(|c| c.enabled)
            .flat_map(|c| c.tests.iter().map(String::as_str))
            .collect()
    }

    /// Run each integration test to completion; the first failure or timeout stops the phase.
    pub async fn run_tests(&self, jobs: &dyn JobRunner, policy: TestPolicy) -> Result<bool> {
        self.log.note("Tests commencing.").await;
        for test in self.tests() {
            if !self.run_test(jobs, test, policy).await? {
                return Ok(false);
            }
        }
        self.log.note("Tests complete.").await;
        Ok(true)
    }

    async fn run_test(&self, jobs: &dyn JobRunner, test: &str, policy: TestPolicy) -> Result<bool> {
        self.log
            .note(&format!("Launching integration test: {test}"))
            .await;
        let release = release_name(test, Utc::now());
        jobs.launch(test, &release).await?;

        let started = Instant::now();
        let deadline = started + policy.timeout;
        self.log.note("Job running... 0m").await;
        loop {
            let status = jobs.status(test, &release).await?;
            if status != JobStatus::Active {
                let ok = status == JobStatus::Succeeded;
                let outcome = if ok { "succeeded" } else { "failed" };
                tracing::info!(test, release = %release, "test job {}", outcome);
                self.log.note(&format!("{release} {outcome}!")).await;
                jobs.logs(test, &release).await?;
                return Ok(ok);
            }

            if Instant::now() + policy.poll_interval > deadline {
                tracing::warn!(test, release = %release, "test job timed out");
                self.log.note(&format!("Test {test} timed out...")).await;
                return Ok(false);
            }
            tokio::time::sleep(policy.poll_interval).await;
            let minutes = started.elapsed().as_secs() / 60;
            self.log
                .progress(&format!("Job running... {minutes}m"))
                .await;
        }
    }

    /// Roll back every chart that was upgraded or failed to upgrade.
    ///
    /// Every eligible chart is attempted; the first error is returned only after
    /// all of them ran. Success means every chart of the diff reached ROLLEDBACK,
    /// so a chart left READY by a fail-fast deploy counts against it.
    pub async fn rollback(&mut self, deployer: &dyn Deployer) -> Result<bool> {
        self.log.note("Starting rollbacks ...").await;

        let mut first_error = None;
        for chart in &mut self.charts {
            if !chart.status().can_roll_back() {
                continue;
            }
            if let Err(e) = chart.rollback(deployer, &self.log).await {
                tracing::error!(chart = %chart.name, "rollback failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        let summary = self.chart_status_summary();
        if let Some(e) = first_error {
            self.log
                .section("Rollback failed, chart summary:", &summary)
                .await;
            return Err(e);
        }
        self.log
            .section("Rollback complete, chart summary:", &summary)
            .await;

        Ok(self
            .charts
            .iter()
            .all(|c| c.status() == ChartStatus::RolledBack))
    }

    pub fn chart_status_summary(&self) -> String {
        self.charts
            .iter()
            .map(Chart::summary)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
