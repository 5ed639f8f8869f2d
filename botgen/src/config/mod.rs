//! Bot configuration: BaseConfig (webhook server, logging, storage) + AdapterConfig (which
//! platform, and its credentials).

mod adapter;
mod base;
mod bot_config;

#[cfg(test)]
mod tests;

pub use adapter::{AdapterConfig, AdapterKind, SlackConfig};
pub use base::{BaseConfig, STORAGE_TYPES};
pub use bot_config::BotConfig;
