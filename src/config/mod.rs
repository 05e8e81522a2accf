// ABOUTME: Configuration types and parsing for quickcd.yml.
// ABOUTME: Handles discovery, defaults, env var indirection and validation.

mod cluster;
mod env_value;
mod github;
mod init;
mod pipeline;

pub use cluster::ClusterConfig;
pub use env_value::EnvValue;
pub use github::GithubConfig;
pub use init::init_config;
pub use pipeline::PipelineConfig;

use crate::charts::{TestPolicy, values_file_name};
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::pipeline::ChartTooling;
use crate::types::ResourceNamer;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "quickcd.yml";
pub const CONFIG_FILENAME_ALT: &str = "quickcd.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".quickcd/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub github: GithubConfig,

    pub cluster: ClusterConfig,

    #[serde(default, rename = "loop")]
    pub polling: LoopConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    #[serde(default)]
    pub store: StoreKind,

    #[serde(default)]
    pub charts: ChartsConfig,

    #[serde(default)]
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_idle_interval", with = "humantime_serde")]
    pub idle_interval: Duration,
    #[serde(default = "default_dispatch_interval", with = "humantime_serde")]
    pub dispatch_interval: Duration,
    #[serde(default = "default_credentials_refresh", with = "humantime_serde")]
    pub credentials_refresh: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_interval: default_idle_interval(),
            dispatch_interval: default_dispatch_interval(),
            credentials_refresh: default_credentials_refresh(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_kill_grace", with = "humantime_serde")]
    pub kill_grace: Duration,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            timeout: default_command_timeout(),
            kill_grace: default_kill_grace(),
        }
    }
}

impl CommandsConfig {
    pub fn runner(&self) -> CommandRunner {
        CommandRunner::new(self.timeout).kill_grace(self.kill_grace)
    }
}

/// Where cursor and event records live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// ConfigMaps in `namespace`, driven through kubectl.
    #[default]
    Kubectl,
    /// Process memory; state is lost on exit.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartsConfig {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_values_command")]
    pub values_command: String,
    #[serde(default = "default_test_timeout", with = "humantime_serde")]
    pub test_timeout: Duration,
    #[serde(default = "default_test_poll_interval", with = "humantime_serde")]
    pub test_poll_interval: Duration,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            values_command: default_values_command(),
            test_timeout: default_test_timeout(),
            test_poll_interval: default_test_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub from: String,
    #[serde(default = "default_sendmail")]
    pub sendmail: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfig {
    /// Run once at startup.
    #[serde(default)]
    pub commands: Vec<String>,
    /// Run at startup and again every `loop.credentials_refresh`.
    #[serde(default)]
    pub credentials: Vec<String>,
}

fn default_namespace() -> String {
    "quickcd".to_string()
}

fn default_workspace() -> PathBuf {
    PathBuf::from("/tmp/quickcd-work")
}

fn default_idle_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_dispatch_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_credentials_refresh() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_kill_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_values_command() -> String {
    "kdep-merge-inherited-values".to_string()
}

fn default_test_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_test_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_sendmail() -> String {
    "sendmail -t".to_string()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("namespace", &self.namespace),
            ("github.domain", &self.github.domain),
            ("github.org", &self.github.org),
            ("github.repo", &self.github.repo),
            ("cluster.environment", &self.cluster.environment),
            ("cluster.region", &self.cluster.region),
            ("cluster.name", &self.cluster.name),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("{field} must not be empty")));
        }
        if self.polling.dispatch_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "loop.dispatch_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cluster_id(&self) -> String {
        self.cluster.id()
    }

    pub fn namer(&self) -> ResourceNamer {
        ResourceNamer::new(&self.github.org, &self.github.repo)
    }

    pub fn runner(&self) -> CommandRunner {
        self.commands.runner()
    }

    /// Values file each chart is deployed with in this cluster.
    pub fn values_file(&self) -> String {
        values_file_name(&self.cluster.region, &self.cluster.environment)
    }

    pub fn chart_tooling(&self) -> ChartTooling {
        ChartTooling {
            values_file: self.values_file(),
            values_command: self.charts.values_command.clone(),
            dry_run: self.charts.dry_run,
            tests: TestPolicy {
                poll_interval: self.charts.test_poll_interval,
                timeout: self.charts.test_timeout,
            },
        }
    }
}
