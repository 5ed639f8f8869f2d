//! Conversation state over both storage backends.

use std::sync::Arc;

use botgen_core::{Activity, BotgenError, ConversationAccount, HandlerError};
use botgen_storage::{ConversationState, MemoryStorage, SqliteStorage, StateBag, Storage};
use serde_json::json;
use tempfile::TempDir;

fn activity(channel: &str, conversation: Option<&str>) -> Activity {
    Activity {
        activity_type: "message".to_string(),
        channel_id: channel.to_string(),
        conversation: conversation.map(ConversationAccount::new),
        ..Default::default()
    }
}

#[test]
fn test_storage_key_uses_channel_and_conversation() {
    let key = ConversationState::storage_key(&activity("test_channel", Some("test_conversation_id")))
        .unwrap();
    assert_eq!(key, "test_channel/conversations/test_conversation_id");
}

#[test]
fn test_storage_key_missing_conversation() {
    let err = ConversationState::storage_key(&activity("test_channel", None)).unwrap_err();
    assert!(matches!(
        err,
        BotgenError::Handler(HandlerError::MissingConversation)
    ));
}

#[test]
fn test_storage_key_missing_conversation_id() {
    let err = ConversationState::storage_key(&activity("test_channel", Some(""))).unwrap_err();
    assert!(matches!(
        err,
        BotgenError::Handler(HandlerError::MissingConversation)
    ));
}

async fn exercise(storage: Arc<dyn Storage>) {
    let state = ConversationState::new(storage);
    let a = activity("webhook", Some("alice"));
    let b = activity("webhook", Some("bob"));

    assert!(state.load(&a).await.unwrap().is_empty());

    let counter = state.create_property("counter");
    let mut bag = StateBag::new();
    counter.set(&mut bag, &3u32).unwrap();
    state.save(&a, bag).await.unwrap();

    let loaded = state.load(&a).await.unwrap();
    assert_eq!(counter.get::<u32>(&loaded).unwrap(), Some(3));
    assert!(state.load(&b).await.unwrap().is_empty());

    state.clear(&a).await.unwrap();
    assert!(state.load(&a).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_backed_state_is_per_conversation() {
    exercise(Arc::new(MemoryStorage::new())).await;
}

#[tokio::test]
async fn test_sqlite_backed_state_is_per_conversation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let storage = SqliteStorage::new(path.to_str().unwrap()).await.unwrap();
    exercise(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_sqlite_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let url = format!("sqlite://{}", path.display());
    let a = activity("slack", Some("C1"));

    {
        let state = ConversationState::new(Arc::new(SqliteStorage::new(&url).await.unwrap()));
        let mut bag = StateBag::new();
        bag.insert("dialogState".to_string(), json!({"dialog_stack": []}));
        state.save(&a, bag).await.unwrap();
    }

    let state = ConversationState::new(Arc::new(SqliteStorage::new(&url).await.unwrap()));
    let loaded = state.load(&a).await.unwrap();
    assert_eq!(loaded.get("dialogState"), Some(&json!({"dialog_stack": []})));
}

#[test]
fn test_property_accessor_defaults_and_delete() {
    let state = ConversationState::new(Arc::new(MemoryStorage::new()));
    let names = state.create_property("names");
    assert_eq!(names.name(), "names");

    let mut bag = StateBag::new();
    let empty: Vec<String> = names.get_or_default(&bag).unwrap();
    assert!(empty.is_empty());

    names.set(&mut bag, &vec!["a".to_string()]).unwrap();
    assert_eq!(names.get::<Vec<String>>(&bag).unwrap(), Some(vec!["a".to_string()]));
    names.delete(&mut bag);
    assert!(bag.is_empty());
}
