// ABOUTME: In-process store backed by a mutex-guarded map.
// ABOUTME: Used for dry runs and as the store under test.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::error::{Result, StoreError};
use super::record::{Record, Selector, validate_label};
use super::StateStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Snapshot of every stored object, ordered by name.
    pub fn snapshot(&self) -> Vec<Record> {
        self.objects.lock().values().cloned().collect()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, name: &str) -> Result<Option<Record>> {
        Ok(self.objects.lock().get(name).cloned())
    }

    async fn create(&self, record: Record) -> Result<()> {
        for (k, v) in &record.labels {
            validate_label(k, v)?;
        }
        let mut objects = self.objects.lock();
        if objects.contains_key(&record.name) {
            return Err(StoreError::AlreadyExists(record.name));
        }
        objects.insert(record.name.clone(), record);
        Ok(())
    }

    async fn apply(&self, record: Record) -> Result<()> {
        for (k, v) in &record.labels {
            validate_label(k, v)?;
        }
        let mut objects = self.objects.lock();
        match objects.get_mut(&record.name) {
            Some(existing) => {
                existing.data = record.data;
                existing.labels.extend(record.labels);
            }
            None => {
                objects.insert(record.name.clone(), record);
            }
        }
        Ok(())
    }

    async fn label(&self, name: &str, labels: &[(String, String)]) -> Result<()> {
        for (k, v) in labels {
            validate_label(k, v)?;
        }
        let mut objects = self.objects.lock();
        let record = objects
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        record.labels.extend(labels.iter().cloned());
        Ok(())
    }

    async fn list(&self, selector: &Selector) -> Result<Vec<Record>> {
        Ok(self
            .objects
            .lock()
            .values()
            .filter(|r| selector.matches(&r.labels))
            .cloned()
            .collect())
    }
}
