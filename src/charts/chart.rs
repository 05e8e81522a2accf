// ABOUTME: One deployable unit and its upgrade/rollback state machine.
// ABOUTME: Upgrade failures are captured in the status; invalid transitions are errors.

use std::collections::BTreeSet;

use crate::github::RunningLog;

use super::deployer::Deployer;
use super::error::{ChartError, Result};
use super::status::ChartStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub name: String,
    pub enabled: bool,
    pub tests: Vec<String>,
    pub last_deployed_revision: Option<u32>,
    status: ChartStatus,
}

impl Chart {
    pub fn new(
        name: impl Into<String>,
        enabled: bool,
        tests: Vec<String>,
        last_deployed_revision: Option<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            enabled,
            tests,
            last_deployed_revision,
            status: ChartStatus::Ready,
        }
    }

    /// Resolve enablement, tests and the rollback target for a changed chart.
    pub async fn discover(
        name: &str,
        releases: &BTreeSet<String>,
        deployer: &dyn Deployer,
        log: &RunningLog,
    ) -> Result<Self> {
        log.note(&format!("Examining changed chart: {name}")).await;
        let settings = deployer.settings(name).await?;
        let last_deployed_revision = if releases.contains(name) {
            deployer.last_deployed_revision(name).await?
        } else {
            None
        };
        Ok(Self::new(
            name,
            settings.enabled,
            settings.integration_tests.into_keys().collect(),
            last_deployed_revision,
        ))
    }

    pub fn status(&self) -> ChartStatus {
        self.status
    }

    /// Upgrade the chart. Returns whether it ended UPGRADED.
    pub async fn upgrade(&mut self, deployer: &dyn Deployer, log: &RunningLog) -> Result<bool> {
        if !self.enabled {
            return Err(ChartError::NotEnabled(self.name.clone()));
        }
        if self.status != ChartStatus::Ready {
            return Err(self.invalid("upgrade"));
        }

        log.note(&format!("Upgrading {}", self.name)).await;
        self.status = ChartStatus::Upgrading;
        match deployer.upgrade(&self.name).await {
            Ok(()) => self.status = ChartStatus::Upgraded,
            Err(e) => {
                tracing::warn!(chart = %self.name, "upgrade failed: {}", e);
                self.status = ChartStatus::UpgradeFailed;
                log.section(&format!("Error deploying chart {}", self.name), &e.to_string())
                    .await;
            }
        }
        Ok(self.status == ChartStatus::Upgraded)
    }

    /// Roll back to the last deployed revision, or mark CANTROLLBACK if there is none.
    ///
    /// If the rollback command errors the chart stays in ROLLINGBACK, which is then
    /// terminal and shows up as such in the status summary.
    pub async fn rollback(&mut self, deployer: &dyn Deployer, log: &RunningLog) -> Result<()> {
        if !self.status.can_roll_back() {
            return Err(self.invalid("roll back"));
        }

        let Some(revision) = self.last_deployed_revision else {
            self.status = ChartStatus::CantRollback;
            log.note(&format!(
                "Didn't roll back {} because no previous DEPLOYED revision found. \
                 Force delete manually if necessary.",
                self.name
            ))
            .await;
            return Ok(());
        };

        log.note(&format!("Rolling {} back to revision {revision}", self.name)).await;
        self.status = ChartStatus::RollingBack;
        deployer.rollback(&self.name, revision).await?;
        self.status = ChartStatus::RolledBack;
        Ok(())
    }

    /// One summary line: `Chart: <name> Status: <STATUS> Last revision: <rev|None>`.
    pub fn summary(&self) -> String {
        let revision = self
            .last_deployed_revision
            .map_or_else(|| "None".to_string(), |r| r.to_string());
        format!(
            "Chart: {} Status: {} Last revision: {revision}",
            self.name, self.status
        )
    }

    fn invalid(&self, action: &'static str) -> ChartError {
        ChartError::InvalidTransition {
            chart: self.name.clone(),
            from: self.status,
            action,
        }
    }
}
