//! In-memory implementation of the [`Storage`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageError;
use crate::storage::{Storage, StoreItems};

/// Process-local storage for development and tests. State is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<RwLock<StoreItems>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<StoreItems, StorageError> {
        let items = self.items.read().await;
        let found: StoreItems = keys
            .iter()
            .filter_map(|key| items.get(key).map(|v| (key.clone(), v.clone())))
            .collect();
        debug!(requested = keys.len(), found = found.len(), "Memory storage read");
        Ok(found)
    }

    async fn write(&self, changes: StoreItems) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        debug!(count = changes.len(), "Memory storage write");
        items.extend(changes);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}
