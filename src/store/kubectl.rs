// ABOUTME: Durable store backed by Kubernetes ConfigMaps, driven through kubectl.
// ABOUTME: Labels live in object metadata; data holds the serialized payloads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::exec::{CommandRunner, ExecError};

use super::error::{Result, StoreError};
use super::record::{Labels, Record, Selector, validate_label};
use super::StateStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigMap {
    #[serde(default = "config_map_api_version")]
    api_version: String,
    #[serde(default = "config_map_kind")]
    kind: String,
    metadata: Metadata,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    labels: Labels,
}

#[derive(Debug, Deserialize)]
struct ConfigMapList {
    #[serde(default)]
    items: Vec<ConfigMap>,
}

fn config_map_api_version() -> String {
    "v1".to_string()
}

fn config_map_kind() -> String {
    "ConfigMap".to_string()
}

impl From<Record> for ConfigMap {
    fn from(record: Record) -> Self {
        ConfigMap {
            api_version: config_map_api_version(),
            kind: config_map_kind(),
            metadata: Metadata {
                name: record.name,
                labels: record.labels,
            },
            data: record.data,
        }
    }
}

impl From<ConfigMap> for Record {
    fn from(map: ConfigMap) -> Self {
        Record {
            name: map.metadata.name,
            labels: map.metadata.labels,
            data: map.data,
        }
    }
}

/// ConfigMap-backed store scoped to one namespace.
#[derive(Debug, Clone)]
pub struct KubectlStore {
    runner: CommandRunner,
    namespace: String,
}

impl KubectlStore {
    pub fn new(runner: CommandRunner, namespace: impl Into<String>) -> Self {
        Self {
            runner,
            namespace: namespace.into(),
        }
    }

    fn kubectl(&self, args: &str) -> String {
        format!("kubectl -n {} {}", self.namespace, args)
    }

    async fn submit(&self, verb: &str, record: Record) -> Result<()> {
        for (k, v) in &record.labels {
            validate_label(k, v)?;
        }
        let name = record.name.clone();
        let document = serde_json::to_vec(&ConfigMap::from(record))?;
        match self
            .runner
            .sh_with_input(&self.kubectl(&format!("{verb} -f-")), Some(document.as_slice()))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if stderr_contains(&e, &["AlreadyExists", "already exists"]) => {
                Err(StoreError::AlreadyExists(name))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn stderr_contains(error: &ExecError, needles: &[&str]) -> bool {
    error
        .stderr()
        .is_some_and(|stderr| needles.iter().any(|n| stderr.contains(n)))
}

#[async_trait]
impl StateStore for KubectlStore {
    async fn get(&self, name: &str) -> Result<Option<Record>> {
        match self
            .runner
            .sh(&self.kubectl(&format!("get configmap {name} -ojson")))
            .await
        {
            Ok(json) => Ok(Some(serde_json::from_str::<ConfigMap>(&json)?.into())),
            Err(e) if stderr_contains(&e, &["NotFound", "not found"]) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, record: Record) -> Result<()> {
        self.submit("create --save-config", record).await
    }

    async fn apply(&self, record: Record) -> Result<()> {
        self.submit("apply", record).await
    }

    async fn label(&self, name: &str, labels: &[(String, String)]) -> Result<()> {
        for (k, v) in labels {
            validate_label(k, v)?;
        }
        let pairs = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        match self
            .runner
            .sh(&self.kubectl(&format!("label --overwrite configmap {name} {pairs}")))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if stderr_contains(&e, &["NotFound", "not found"]) => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, selector: &Selector) -> Result<Vec<Record>> {
        let json = self
            .runner
            .sh(&self.kubectl(&format!(
                "get configmaps -l '{}' -ojson",
                selector.to_query()
            )))
            .await?;
        let list: ConfigMapList = serde_json::from_str(&json)?;
        Ok(list.items.into_iter().map(Record::from).collect())
    }
}
