//! State storage for botgen.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`storage`] – [`Storage`] trait (key → JSON object)
//! - [`memory_storage`] – process-local [`MemoryStorage`]
//! - [`sqlite_storage`] – persistent [`SqliteStorage`]
//! - [`conversation_state`] – per-conversation state bags and property accessors

mod conversation_state;
mod error;
mod memory_storage;
mod sqlite_pool;
mod sqlite_storage;
mod storage;

pub use conversation_state::{ConversationState, StateBag, StatePropertyAccessor};
pub use error::StorageError;
pub use memory_storage::MemoryStorage;
pub use sqlite_pool::SqlitePoolManager;
pub use sqlite_storage::SqliteStorage;
pub use storage::{Storage, StoreItems};
