//! Storage error types.
//!
//! Returned by [`crate::Storage`] implementations; converts into [`botgen_core::BotgenError`]
//! so callers in the turn pipeline can use `?`.

use botgen_core::BotgenError;
use thiserror::Error;

/// Errors that can occur when reading or writing state.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<StorageError> for BotgenError {
    fn from(e: StorageError) -> Self {
        BotgenError::Storage(e.to_string())
    }
}
