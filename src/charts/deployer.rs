// ABOUTME: Package deployer seam: release listing, revision history, values, upgrade and rollback.
// ABOUTME: HelmDeployer drives kdep and helm through the logging shell.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::shell::LoggingShell;

use super::error::{ChartError, Result};

/// Values file for a chart in one cluster: `<region>-<environment>-values.yaml`.
pub fn values_file_name(region: &str, environment: &str) -> String {
    format!("{region}-{environment}-values.yaml")
}

/// The `continuousDeployment` section of a chart's resolved values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CdSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "integrationTests")]
    pub integration_tests: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolvedValues {
    #[serde(default, rename = "continuousDeployment")]
    continuous_deployment: Option<CdSettings>,
}

/// Parse resolved values (JSON or YAML) down to the deployment settings.
pub fn parse_cd_settings(chart: &str, raw: &str) -> Result<CdSettings> {
    if raw.trim().is_empty() {
        return Ok(CdSettings::default());
    }
    let values: ResolvedValues = serde_yaml::from_str(raw).map_err(|e| ChartError::Values {
        chart: chart.to_string(),
        reason: e.to_string(),
    })?;
    Ok(values.continuous_deployment.unwrap_or_default())
}

/// Highest revision currently marked deployed in `helm history` output.
///
/// Only rows with exactly five tab-separated columns count; the header row
/// fails the revision parse and is skipped.
pub fn last_deployed_revision(history: &str) -> Option<u32> {
    history
        .lines()
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .filter(|cols| cols.len() == 5 && cols[2].to_ascii_uppercase().contains("DEPLOYED"))
        .filter_map(|cols| cols[0].trim().parse::<u32>().ok())
        .max()
}

#[async_trait]
pub trait Deployer: Send + Sync {
    /// Names of every release known to the cluster.
    async fn releases(&self) -> Result<BTreeSet<String>>;

    /// Last revision marked deployed for a live release.
    async fn last_deployed_revision(&self, release: &str) -> Result<Option<u32>>;

    /// Deployment settings from the chart's inherited values.
    async fn settings(&self, chart: &str) -> Result<CdSettings>;

    async fn upgrade(&self, chart: &str) -> Result<()>;

    async fn rollback(&self, release: &str, revision: u32) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct HelmDeployer {
    shell: LoggingShell,
    values_file: String,
    values_command: String,
    dry_run: bool,
}

impl HelmDeployer {
    pub fn new(shell: LoggingShell, values_file: impl Into<String>) -> Self {
        Self {
            shell,
            values_file: values_file.into(),
            values_command: "kdep-merge-inherited-values".to_string(),
            dry_run: false,
        }
    }

    pub fn values_command(mut self, command: impl Into<String>) -> Self {
        self.values_command = command.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn values_path(&self, chart: &str) -> String {
        format!("./{chart}/{}", self.values_file)
    }

    fn kdep_flags(&self) -> &'static str {
        if self.dry_run { " -d" } else { "" }
    }

    fn helm_flags(&self) -> &'static str {
        if self.dry_run { " --debug --dry-run" } else { "" }
    }
}

#[async_trait]
impl Deployer for HelmDeployer {
    async fn releases(&self) -> Result<BTreeSet<String>> {
        let out = self.shell.run("helm ls --short --all").await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn last_deployed_revision(&self, release: &str) -> Result<Option<u32>> {
        let out = self.shell.run(&format!("helm history {release}")).await?;
        Ok(last_deployed_revision(&out))
    }

    async fn settings(&self, chart: &str) -> Result<CdSettings> {
        let raw = self
            .shell
            .run(&format!("{} {}", self.values_command, self.values_path(chart)))
            .await?;
        parse_cd_settings(chart, &raw)
    }

    async fn upgrade(&self, chart: &str) -> Result<()> {
        let cmd = format!("kdep -i{} {}", self.kdep_flags(), self.values_path(chart));
        self.shell.run(&cmd).await?;
        Ok(())
    }

    async fn rollback(&self, release: &str, revision: u32) -> Result<()> {
        let cmd = format!("helm rollback{} --force {release} {revision}", self.helm_flags());
        self.shell.run(&cmd).await?;
        Ok(())
    }
}
