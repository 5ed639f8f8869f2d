//! SQLite implementation of the [`Storage`] trait.
//!
//! One row per key in the `bot_state` table; values are stored as JSON text.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::sqlite_pool::SqlitePoolManager;
use crate::storage::{Storage, StoreItems};

#[derive(Clone)]
pub struct SqliteStorage {
    pool_manager: SqlitePoolManager,
}

impl SqliteStorage {
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        let storage = Self { pool_manager };
        storage.init().await?;
        Ok(storage)
    }

    async fn init(&self) -> Result<(), StorageError> {
        info!("Creating bot_state table if not exists");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool_manager.pool())
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn read(&self, keys: &[String]) -> Result<StoreItems, StorageError> {
        let pool = self.pool_manager.pool();
        let mut found = StoreItems::new();

        for key in keys {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT value FROM bot_state WHERE key = ?")
                    .bind(key)
                    .fetch_optional(pool)
                    .await?;
            if let Some((value,)) = row {
                found.insert(key.clone(), serde_json::from_str(&value)?);
            }
        }

        debug!(requested = keys.len(), found = found.len(), "SQLite storage read");
        Ok(found)
    }

    async fn write(&self, changes: StoreItems) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        let now = Utc::now().to_rfc3339();

        for (key, value) in &changes {
            sqlx::query(
                r#"
                INSERT INTO bot_state (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .bind(&now)
            .execute(pool)
            .await?;
        }

        debug!(count = changes.len(), "SQLite storage write");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let pool = self.pool_manager.pool();
        for key in keys {
            sqlx::query("DELETE FROM bot_state WHERE key = ?")
                .bind(key)
                .execute(pool)
                .await?;
        }
        Ok(())
    }
}
