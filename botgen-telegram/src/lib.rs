//! # botgen-telegram
//!
//! Telegram adapter: turns webhook [`teloxide::types::Update`]s into [`botgen_core::Activity`]
//! values and sends outgoing activities through the Bot API. No bot logic lives here.

mod adapters;
mod bot_adapter;
mod config;

pub use adapters::{update_to_activity, TelegramMessageWrapper, TelegramUserWrapper, TELEGRAM_CHANNEL};
pub use bot_adapter::TelegramAdapter;
pub use config::TelegramConfig;
