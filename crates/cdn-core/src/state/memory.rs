// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives a restart: the next deploy after a restart sees no state
// and creates a new distribution. Use it for tests and dry runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::{DistributionState, StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// Clones share the same map, so a test can keep a handle while the engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, DistributionState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of distributions in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, name: &str) -> Result<Option<DistributionState>, Error> {
        Ok(self.inner.read().await.get(name).cloned())
    }

    async fn set_state(&self, name: &str, state: &DistributionState) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(name.to_string(), state.clone());
        Ok(())
    }

    async fn delete_state(&self, name: &str) -> Result<(), Error> {
        self.inner.write().await.remove(name);
        Ok(())
    }

    async fn list_states(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for `StateStoreConfig::Memory`
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::Memory => Ok(Box::new(MemoryStateStore::new())),
            other => Err(Error::config(format!(
                "Memory state store cannot be created from a {} config",
                other.type_name()
            ))),
        }
    }
}
