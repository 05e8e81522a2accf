// ABOUTME: Config scaffolding for new deployments.
// ABOUTME: Writes a commented quickcd.yml template.

use std::path::Path;

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"# Kubernetes namespace holding the event cursor and event records.
namespace: quickcd

github:
  domain: github.example.com
  org: my-org
  repo: my-charts
  token:
    env: QUICKCD_GITHUB_TOKEN

cluster:
  environment: production
  region: us-south
  name: my-cluster

# loop:
#   idle_interval: 60s
#   dispatch_interval: 1s
#   credentials_refresh: 1h

# commands:
#   timeout: 5m
#   kill_grace: 2s

# charts:
#   dry_run: false
#   test_timeout: 1h

# email:
#   from: quickcd@example.com
#   sendmail: sendmail -t

bootstrap:
  commands:
    - git config --global user.name quickcd
  # credentials:
  #   - ./refresh-kubeconfig.sh

pipelines:
  - kind: push
    branch: production
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    tracing::info!(path = %config_path.display(), "wrote config template");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn template_parses() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.cluster_id(), "production/us-south/my-cluster");
        assert_eq!(config.pipelines.len(), 1);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "keep").unwrap();
        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), true).unwrap();
        let written = std::fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(written.contains("pipelines:"));
    }
}
