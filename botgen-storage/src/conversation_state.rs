//! Conversation-scoped state.
//!
//! State is keyed by channel and conversation id, so several users talking in one channel, or
//! threads inside a channel, get separate state as long as the adapter gives them distinct
//! conversation ids.

use std::sync::Arc;

use botgen_core::{Activity, HandlerError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::storage::{Storage, StoreItems};

/// The state document of one conversation.
pub type StateBag = Map<String, Value>;

#[derive(Clone)]
pub struct ConversationState {
    storage: Arc<dyn Storage>,
}

impl ConversationState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// `"{channel_id}/conversations/{conversation_id}"`. Fails when the activity has no
    /// conversation or an empty conversation id.
    pub fn storage_key(activity: &Activity) -> Result<String> {
        let conversation_id = activity
            .conversation_id()
            .ok_or(HandlerError::MissingConversation)?;
        Ok(format!(
            "{}/conversations/{}",
            activity.channel_id, conversation_id
        ))
    }

    /// Loads the state of the activity's conversation; empty when nothing was saved yet.
    pub async fn load(&self, activity: &Activity) -> Result<StateBag> {
        let key = Self::storage_key(activity)?;
        let mut items = self.storage.read(std::slice::from_ref(&key)).await?;
        let bag = match items.remove(&key) {
            Some(Value::Object(map)) => map,
            _ => StateBag::new(),
        };
        debug!(key = %key, properties = bag.len(), "Conversation state loaded");
        Ok(bag)
    }

    pub async fn save(&self, activity: &Activity, bag: StateBag) -> Result<()> {
        let key = Self::storage_key(activity)?;
        debug!(key = %key, properties = bag.len(), "Saving conversation state");
        let mut changes = StoreItems::new();
        changes.insert(key, Value::Object(bag));
        self.storage.write(changes).await?;
        Ok(())
    }

    pub async fn clear(&self, activity: &Activity) -> Result<()> {
        let key = Self::storage_key(activity)?;
        self.storage.delete(&[key]).await?;
        Ok(())
    }

    /// Returns an accessor for one named property of the state bag.
    pub fn create_property(&self, name: impl Into<String>) -> StatePropertyAccessor {
        StatePropertyAccessor { name: name.into() }
    }
}

/// Typed access to one property of a [`StateBag`].
#[derive(Debug, Clone)]
pub struct StatePropertyAccessor {
    name: String,
}

impl StatePropertyAccessor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get<T: DeserializeOwned>(&self, bag: &StateBag) -> Result<Option<T>> {
        match bag.get(&self.name) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get), falling back to `T::default()` when the property is unset.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, bag: &StateBag) -> Result<T> {
        Ok(self.get(bag)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&self, bag: &mut StateBag, value: &T) -> Result<()> {
        bag.insert(self.name.clone(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn delete(&self, bag: &mut StateBag) {
        bag.remove(&self.name);
    }
}
