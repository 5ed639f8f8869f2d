//! BotConfig: BaseConfig + AdapterConfig. Use load() for env-based loading, then build the
//! storage and adapter it describes.

use std::sync::Arc;

use anyhow::Result;
use botgen_core::BotAdapter;
use botgen_storage::{MemoryStorage, SqliteStorage, Storage};
use botgen_telegram::{TelegramAdapter, TelegramConfig};
use tracing::info;

use super::{AdapterConfig, AdapterKind, BaseConfig};
use crate::adapters::{SlackAdapter, SlackAdapterOptions, WebAdapter};
use crate::bot::BotOptions;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub base: BaseConfig,
    pub adapter: AdapterConfig,
}

impl BotConfig {
    /// Load full config from environment variables. `port` overrides PORT and `adapter`
    /// overrides ADAPTER. Call validate() after load to check config before init.
    pub fn load(port: Option<u16>, adapter: Option<String>) -> Result<Self> {
        let base = BaseConfig::load(port)?;
        let adapter = AdapterConfig::load(adapter)?;
        Ok(Self { base, adapter })
    }

    /// Validate config. Call after load() to fail fast before init.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        self.adapter.validate()
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.adapter.kind
    }

    pub fn port(&self) -> u16 {
        self.base.port
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn database_url(&self) -> &str {
        &self.base.database_url
    }
    pub fn storage_type(&self) -> &str {
        &self.base.storage_type
    }

    /// Opens the configured state storage.
    pub async fn build_storage(&self) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self.base.storage_type.as_str() {
            "sqlite" => {
                info!(database_url = %self.base.database_url, "Using SQLite storage");
                Arc::new(SqliteStorage::new(&self.base.database_url).await?)
            }
            "memory" => Arc::new(MemoryStorage::new()),
            other => anyhow::bail!("Unknown STORAGE_TYPE: {}", other),
        };
        Ok(storage)
    }

    /// Creates the configured adapter.
    pub fn build_adapter(&self) -> Result<Arc<dyn BotAdapter>> {
        let adapter: Arc<dyn BotAdapter> = match self.adapter.kind {
            AdapterKind::Web => Arc::new(WebAdapter::new()),
            AdapterKind::Slack => {
                let slack = &self.adapter.slack;
                Arc::new(SlackAdapter::new(SlackAdapterOptions {
                    verification_token: slack.verification_token.clone(),
                    client_signing_secret: slack.client_signing_secret.clone(),
                    bot_token: slack.bot_token.clone(),
                    client_id: slack.client_id.clone(),
                    client_secret: slack.client_secret.clone(),
                    scopes: slack.scopes.clone(),
                    oauth_version: slack.oauth_version.clone(),
                    redirect_uri: slack.redirect_uri.clone(),
                    enable_incomplete: slack.enable_incomplete,
                    api_url: slack.api_url.clone(),
                    ..Default::default()
                })?)
            }
            AdapterKind::Telegram => {
                let token = self
                    .adapter
                    .telegram_token
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("BOT_TOKEN not set"))?;
                let config = TelegramConfig {
                    bot_token: token,
                    telegram_api_url: self.adapter.telegram_api_url.clone(),
                };
                Arc::new(TelegramAdapter::from_config(&config))
            }
        };
        Ok(adapter)
    }

    /// Controller options for this config, using the given adapter and storage.
    pub fn bot_options(
        &self,
        adapter: Arc<dyn BotAdapter>,
        storage: Arc<dyn Storage>,
    ) -> BotOptions {
        BotOptions {
            webhook_uri: self.base.webhook_uri.clone(),
            dialog_state_property: self.base.dialog_state_property.clone(),
            disable_webserver: self.base.disable_webserver,
            disable_console: self.base.disable_console,
            json_limit: self.base.json_limit.clone(),
            url_encoded_limit: self.base.url_encoded_limit.clone(),
            port: self.base.port,
            ..Default::default()
        }
        .with_adapter(adapter)
        .with_storage(storage)
    }
}
