// ABOUTME: Store objects: a name, a mutable label set and an immutable data map.
// ABOUTME: Label selectors are conjunctions of key=value equalities.

use std::collections::BTreeMap;

use crate::types::ResourceName;

use super::error::{Result, StoreError};

/// Longest label value a store accepts.
pub const MAX_LABEL_VALUE: usize = 63;

pub type Labels = BTreeMap<String, String>;

/// One named object in the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub labels: Labels,
    pub data: BTreeMap<String, String>,
}

impl Record {
    pub fn new(name: &ResourceName) -> Self {
        Self {
            name: name.to_string(),
            labels: Labels::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get_label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn get_data(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Equality-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector(Labels);

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.0
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }

    /// Render as `k1=v1,k2=v2` for command-line tools.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Reject labels that a store would refuse, before any write happens.
pub fn validate_label(key: &str, value: &str) -> Result<()> {
    let invalid = |reason| StoreError::InvalidLabel {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if value.len() > MAX_LABEL_VALUE {
        return Err(invalid("value longer than 63 characters"));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if !key.chars().all(allowed) {
        return Err(invalid("key contains invalid characters"));
    }
    if !value.chars().all(allowed) {
        return Err(invalid("value contains invalid characters"));
    }
    Ok(())
}
