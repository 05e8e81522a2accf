// ABOUTME: Integration-test job seam: launch, poll status and fetch logs.
// ABOUTME: KubeJobs launches tests with kdep and polls them with kubectl.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::shell::LoggingShell;

use super::error::{ChartError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Succeeded,
    Failed,
}

/// Unique job release for one run of a test: `<test>-%m-%d-%y--%H-%M-%S`.
pub fn release_name(test: &str, at: DateTime<Utc>) -> String {
    format!("{test}{}", at.format("-%m-%d-%y--%H-%M-%S"))
}

/// Namespace a test job runs in: the test name up to the first `-`.
pub fn squad(test: &str) -> &str {
    test.split('-').next().unwrap_or(test)
}

#[derive(Debug, Default, Deserialize)]
struct Job {
    #[serde(default)]
    status: JobState,
}

#[derive(Debug, Default, Deserialize)]
struct JobState {
    active: Option<u32>,
    succeeded: Option<u32>,
}

/// Interpret `kubectl get job -ojson` output.
pub fn parse_job_status(release: &str, raw: &str) -> Result<JobStatus> {
    let job: Job = serde_json::from_str(raw).map_err(|e| ChartError::JobStatus {
        release: release.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match job.status {
        JobState {
            active: Some(n), ..
        } if n > 0 => JobStatus::Active,
        JobState {
            succeeded: Some(n), ..
        } if n > 0 => JobStatus::Succeeded,
        _ => JobStatus::Failed,
    })
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn launch(&self, test: &str, release: &str) -> Result<()>;

    async fn status(&self, test: &str, release: &str) -> Result<JobStatus>;

    async fn logs(&self, test: &str, release: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct KubeJobs {
    shell: LoggingShell,
    values_file: String,
    dry_run: bool,
}

impl KubeJobs {
    pub fn new(shell: LoggingShell, values_file: impl Into<String>) -> Self {
        Self {
            shell,
            values_file: values_file.into(),
            dry_run: false,
        }
    }

    /// Dry-run launches with `kdep -d` and reports every job as succeeded.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[async_trait]
impl JobRunner for KubeJobs {
    async fn launch(&self, test: &str, release: &str) -> Result<()> {
        let flags = if self.dry_run { " -d" } else { "" };
        let cmd = format!("kdep -i{flags} -t {release} ./{test}/{}", self.values_file);
        self.shell.run(&cmd).await?;
        Ok(())
    }

    async fn status(&self, test: &str, release: &str) -> Result<JobStatus> {
        if self.dry_run {
            return Ok(JobStatus::Succeeded);
        }
        let cmd = format!("kubectl get job -n {} {release} -ojson", squad(test));
        let raw = self.shell.run_quiet(&cmd).await?;
        parse_job_status(release, &raw)
    }

    async fn logs(&self, test: &str, release: &str) -> Result<String> {
        if self.dry_run {
            return Ok(String::new());
        }
        let cmd = format!("kubectl logs -ljob-name={release} -n {}", squad(test));
        Ok(self.shell.run(&cmd).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn release_name_has_timestamp_suffix() {
        let at = Utc.with_ymd_and_hms(2018, 10, 3, 14, 5, 9).unwrap();
        assert_eq!(release_name("payments-smoke", at), "payments-smoke-10-03-18--14-05-09");
    }

    #[test]
    fn squad_is_first_dash_segment() {
        assert_eq!(squad("payments-smoke-eu"), "payments");
        assert_eq!(squad("solo"), "solo");
    }

    #[test]
    fn active_job_keeps_running() {
        let raw = r#"{"status": {"active": 1, "startTime": "2018-10-03T14:05:09Z"}}"#;
        assert_eq!(parse_job_status("r", raw).unwrap(), JobStatus::Active);
    }

    #[test]
    fn terminal_job_status() {
        let ok = r#"{"status": {"succeeded": 1}}"#;
        let failed = r#"{"status": {"failed": 1}}"#;
        assert_eq!(parse_job_status("r", ok).unwrap(), JobStatus::Succeeded);
        assert_eq!(parse_job_status("r", failed).unwrap(), JobStatus::Failed);
    }

    #[test]
    fn garbage_status_is_an_error() {
        assert!(matches!(
            parse_job_status("r", "not json"),
            Err(ChartError::JobStatus { .. })
        ));
    }
}
