//! Which platform adapter to run, and its credentials.

use anyhow::Result;
use std::env;
use std::fmt;
use std::str::FromStr;

use super::base::env_flag;
use crate::adapters::slack::DEFAULT_API_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Web,
    Slack,
    Telegram,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Web => "web",
            AdapterKind::Slack => "slack",
            AdapterKind::Telegram => "telegram",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" | "webhook" => Ok(AdapterKind::Web),
            "slack" => Ok(AdapterKind::Slack),
            "telegram" => Ok(AdapterKind::Telegram),
            other => anyhow::bail!("ADAPTER must be one of web, slack, telegram; got: {}", other),
        }
    }
}

/// SLACK_* variables.
#[derive(Clone, Default)]
pub struct SlackConfig {
    pub verification_token: Option<String>,
    pub client_signing_secret: Option<String>,
    pub bot_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// SLACK_SCOPES, comma separated
    pub scopes: Vec<String>,
    pub oauth_version: String,
    pub redirect_uri: Option<String>,
    pub enable_incomplete: bool,
    pub api_url: String,
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("has_verification_token", &self.verification_token.is_some())
            .field("has_bot_token", &self.bot_token.is_some())
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("oauth_version", &self.oauth_version)
            .field("enable_incomplete", &self.enable_incomplete)
            .field("api_url", &self.api_url)
            .finish()
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl SlackConfig {
    pub fn from_env() -> Self {
        Self {
            verification_token: non_empty("SLACK_VERIFICATION_TOKEN"),
            client_signing_secret: non_empty("SLACK_CLIENT_SIGNING_SECRET"),
            bot_token: non_empty("SLACK_BOT_TOKEN"),
            client_id: non_empty("SLACK_CLIENT_ID"),
            client_secret: non_empty("SLACK_CLIENT_SECRET"),
            scopes: env::var("SLACK_SCOPES")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|scope| !scope.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            oauth_version: non_empty("SLACK_OAUTH_VERSION").unwrap_or_else(|| "v1".to_string()),
            redirect_uri: non_empty("SLACK_REDIRECT_URI"),
            enable_incomplete: env_flag("SLACK_ENABLE_INCOMPLETE"),
            api_url: non_empty("SLACK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }
}

/// Adapter selection (ADAPTER) plus the settings of every adapter.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub kind: AdapterKind,
    pub slack: SlackConfig,
    /// BOT_TOKEN, for Telegram
    pub telegram_token: Option<String>,
    /// TELEGRAM_API_URL or TELOXIDE_API_URL
    pub telegram_api_url: Option<String>,
}

impl AdapterConfig {
    /// Load from environment variables. `adapter` overrides ADAPTER if provided.
    pub fn load(adapter: Option<String>) -> Result<Self> {
        let kind = match adapter.or_else(|| env::var("ADAPTER").ok()) {
            Some(name) => name.parse()?,
            None => AdapterKind::Web,
        };
        Ok(Self {
            kind,
            slack: SlackConfig::from_env(),
            telegram_token: non_empty("BOT_TOKEN"),
            telegram_api_url: env::var("TELEGRAM_API_URL")
                .or_else(|_| env::var("TELOXIDE_API_URL"))
                .ok(),
        })
    }

    /// Checks the credentials the selected adapter needs.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            AdapterKind::Web => Ok(()),
            AdapterKind::Slack => {
                let slack = &self.slack;
                if slack.enable_incomplete {
                    return Ok(());
                }
                if slack.verification_token.is_none() && slack.client_signing_secret.is_none() {
                    anyhow::bail!(
                        "SLACK_VERIFICATION_TOKEN or SLACK_CLIENT_SIGNING_SECRET is required"
                    );
                }
                if slack.bot_token.is_none() {
                    anyhow::bail!("SLACK_BOT_TOKEN is required for the slack adapter");
                }
                if reqwest::Url::parse(&slack.api_url).is_err() {
                    anyhow::bail!("SLACK_API_URL is not a valid URL: {}", slack.api_url);
                }
                Ok(())
            }
            AdapterKind::Telegram => {
                if self.telegram_token.is_none() {
                    anyhow::bail!("BOT_TOKEN is required for the telegram adapter");
                }
                if let Some(ref url_str) = self.telegram_api_url {
                    if reqwest::Url::parse(url_str).is_err() {
                        anyhow::bail!(
                            "TELEGRAM_API_URL (or TELOXIDE_API_URL) is set but not a valid URL: {}",
                            url_str
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
