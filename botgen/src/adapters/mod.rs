//! Platform adapters bundled with the controller. Telegram lives in `botgen-telegram`.

pub mod slack;
pub mod web;

pub use slack::{SlackAdapter, SlackAdapterOptions, TeamLookup, SLACK_CHANNEL};
pub use web::{WebAdapter, WEBHOOK_CHANNEL, WEBSOCKET_CHANNEL};
