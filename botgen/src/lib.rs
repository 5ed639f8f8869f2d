//! # botgen
//!
//! Bot controller in the Botkit style: adapters turn platform webhooks into activities, the
//! [`Bot`] runs middleware, interrupts, dialogs, `hears` triggers and events for each turn, and
//! [`BotWorker`]s send replies.
//!
//! Platform-independent types live in `botgen-core`, the middleware chain in `botgen-chain`,
//! state storage in `botgen-storage`, the dialog stack in `botgen-dialogs` and the Telegram
//! adapter in `botgen-telegram`; they are re-exported here.

pub mod adapters;
pub mod bot;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod handler;
pub mod plugin;
pub mod runner;
pub mod server;
pub mod trigger;
pub mod worker;

pub use bot::{Bot, BotOptions, WeakBot};
pub use cli::{load_config, Cli, Commands};
pub use config::{AdapterKind, BotConfig};
pub use conversation::{
    Conversation, ConvoTrigger, DialogWrapper, MessageTemplate, DEFAULT_THREAD,
};
pub use handler::{BoxFuture, EventHandler, MessagePredicate, TriggerHandler};
pub use plugin::BotPlugin;
pub use runner::{build_bot, run_bot};
pub use server::{parse_size, status_for};
pub use trigger::{BotTrigger, Pattern};
pub use worker::{BotWorker, WorkerConfig};

pub use adapters::{SlackAdapter, SlackAdapterOptions, WebAdapter};
pub use botgen_chain::{Middleware, MiddlewareChain, TurnOutcome};
pub use botgen_core::{
    activity_types, Activity, BotAdapter, BotMessage, BotgenError, ChannelAccount,
    ConversationAccount, ConversationReference, HandlerError, ResourceResponse, Result,
    TurnContext, WebhookRequest, WebhookResponse,
};
pub use botgen_dialogs::{Dialog, DialogContext, DialogTurnResult, DialogTurnStatus};
pub use botgen_storage::{MemoryStorage, SqliteStorage, Storage};
pub use botgen_telegram::{TelegramAdapter, TelegramConfig};
