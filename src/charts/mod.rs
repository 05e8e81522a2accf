// ABOUTME: Deployable diffs and the per-chart upgrade, test and rollback state machine.
// ABOUTME: External tools sit behind the Deployer and JobRunner traits.

mod chart;
mod deployer;
mod diff;
mod error;
mod jobs;
mod status;

pub use chart::Chart;
pub use deployer::{
    CdSettings, Deployer, HelmDeployer, last_deployed_revision, parse_cd_settings, values_file_name,
};
pub use diff::{CHART_DESCRIPTOR, DeployableDiff, TestPolicy, changed_units};
pub use error::{ChartError, Result};
pub use jobs::{JobRunner, JobStatus, KubeJobs, parse_job_status, release_name, squad};
pub use status::ChartStatus;
