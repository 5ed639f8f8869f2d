//! # botgen-core
//!
//! Core types and traits shared by every botgen crate: [`Activity`] and [`BotMessage`],
//! the platform-facing [`BotAdapter`] trait, the per-turn [`TurnContext`], errors,
//! and tracing initialization. Transport-agnostic; adapters live in their own crates/modules.

pub mod adapter;
pub mod context;
pub mod error;
pub mod logger;
pub mod types;

pub use adapter::{run_pipeline, BotAdapter, TurnHandler, WebhookRequest, WebhookResponse};
pub use context::{TurnContext, TurnState};
pub use error::{BotgenError, HandlerError, Result};
pub use logger::{init_tracing, open_log_file};
pub use types::{
    activity_types, Activity, BotMessage, ChannelAccount, ConversationAccount,
    ConversationReference, DialogRequest, ResourceResponse,
};
