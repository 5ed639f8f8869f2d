//! Storage trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;

/// Items read from or written to storage, by key.
pub type StoreItems = HashMap<String, Value>;

/// Key/value persistence for bot state. Values are JSON documents.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the items found for `keys`; missing keys are absent from the result.
    async fn read(&self, keys: &[String]) -> Result<StoreItems, StorageError>;
    /// Inserts or replaces every item in `changes`.
    async fn write(&self, changes: StoreItems) -> Result<(), StorageError>;
    /// Removes `keys`; unknown keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<(), StorageError>;
}
