// ABOUTME: Durable key/value object store used for the cursor and event records.
// ABOUTME: Objects carry a mergeable label set and are listed by label selector.

mod error;
mod kubectl;
mod memory;
mod record;

pub use error::{Result, StoreError};
pub use kubectl::KubectlStore;
pub use memory::MemoryStore;
pub use record::{Labels, MAX_LABEL_VALUE, Record, Selector, validate_label};

use async_trait::async_trait;

/// Object store capability.
///
/// Writes are last-writer-wins; nothing here is compare-and-swap.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Fetch an object by name. `Ok(None)` when it does not exist.
    async fn get(&self, name: &str) -> Result<Option<Record>>;

    /// Create an object. Fails with `StoreError::AlreadyExists` if the name is taken.
    async fn create(&self, record: Record) -> Result<()>;

    /// Create or update an object: data is replaced, labels are merged.
    async fn apply(&self, record: Record) -> Result<()>;

    /// Merge labels into an existing object, overwriting keys that are present.
    async fn label(&self, name: &str, labels: &[(String, String)]) -> Result<()>;

    /// List objects whose labels match every pair of the selector.
    async fn list(&self, selector: &Selector) -> Result<Vec<Record>>;

    /// Create an object unless one with the same name exists. Returns whether it was created.
    async fn create_if_absent(&self, record: Record) -> Result<bool> {
        match self.create(record).await {
            Ok(()) => Ok(true),
            Err(StoreError::AlreadyExists(name)) => {
                tracing::debug!(%name, "object already exists, leaving it untouched");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
