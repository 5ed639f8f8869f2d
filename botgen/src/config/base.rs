//! Base config: webhook server, logging, state storage. Loaded from env.

use anyhow::Result;
use std::env;

use crate::server::parse_size;

/// Storage backends selectable with STORAGE_TYPE.
pub const STORAGE_TYPES: [&str; 2] = ["memory", "sqlite"];

#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// WEBHOOK_URI
    pub webhook_uri: String,
    /// DIALOG_STATE_PROPERTY
    pub dialog_state_property: String,
    /// PORT
    pub port: u16,
    /// LOG_FILE
    pub log_file: String,
    /// JSON_LIMIT, e.g. `100kb`
    pub json_limit: String,
    /// URL_ENCODED_LIMIT
    pub url_encoded_limit: String,
    pub disable_webserver: bool,
    pub disable_console: bool,
    /// STORAGE_TYPE: `memory` or `sqlite`
    pub storage_type: String,
    /// DATABASE_URL, used by the sqlite storage
    pub database_url: String,
}

pub(crate) fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl BaseConfig {
    /// Load from environment variables. `port` overrides PORT if provided.
    pub fn load(port: Option<u16>) -> Result<Self> {
        let port = match port {
            Some(port) => port,
            None => match env::var("PORT") {
                Ok(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT is not a valid port: {}", value))?,
                Err(_) => 3000,
            },
        };

        Ok(Self {
            webhook_uri: env::var("WEBHOOK_URI").unwrap_or_else(|_| "/api/messages".to_string()),
            dialog_state_property: env::var("DIALOG_STATE_PROPERTY")
                .unwrap_or_else(|_| "dialogState".to_string()),
            port,
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "logs/botgen.log".to_string()),
            json_limit: env::var("JSON_LIMIT").unwrap_or_else(|_| "100kb".to_string()),
            url_encoded_limit: env::var("URL_ENCODED_LIMIT")
                .unwrap_or_else(|_| "100kb".to_string()),
            disable_webserver: env_flag("DISABLE_WEBSERVER"),
            disable_console: env_flag("DISABLE_CONSOLE"),
            storage_type: env::var("STORAGE_TYPE")
                .map(|s| s.trim().to_ascii_lowercase())
                .unwrap_or_else(|_| "memory".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./botgen.db".to_string()),
        })
    }

    /// Validate config (webhook path, body limits, storage type).
    pub fn validate(&self) -> Result<()> {
        if !self.webhook_uri.starts_with('/') {
            anyhow::bail!("WEBHOOK_URI must start with '/': {}", self.webhook_uri);
        }
        if parse_size(&self.json_limit).is_err() {
            anyhow::bail!("JSON_LIMIT is not a valid size: {}", self.json_limit);
        }
        if parse_size(&self.url_encoded_limit).is_err() {
            anyhow::bail!(
                "URL_ENCODED_LIMIT is not a valid size: {}",
                self.url_encoded_limit
            );
        }
        if !STORAGE_TYPES.contains(&self.storage_type.as_str()) {
            anyhow::bail!(
                "STORAGE_TYPE must be one of {:?}, got: {}",
                STORAGE_TYPES,
                self.storage_type
            );
        }
        Ok(())
    }
}
