//! Callback types for triggers, events, conversation hooks and boot handlers.
//!
//! Handlers take owned arguments ([`BotWorker`] and [`BotMessage`] are cheap to clone) so any
//! `async move` closure can be registered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use botgen_core::{BotMessage, Result};

use crate::bot::Bot;
use crate::worker::BotWorker;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Handler run when a `hears` or `interrupts` trigger matches.
pub type TriggerHandler =
    Arc<dyn Fn(BotWorker, BotMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Handler bound with `on`. Returning `true` stops later handlers for the same event.
pub type EventHandler =
    Arc<dyn Fn(BotWorker, BotMessage) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Async test over an incoming message.
pub type MessagePredicate = Arc<dyn Fn(BotMessage) -> BoxFuture<'static, bool> + Send + Sync>;

/// Runs once the controller finished booting.
pub type BootHandler = Box<dyn FnOnce(&Bot) + Send>;

pub(crate) fn trigger_handler<F, Fut>(handler: F) -> TriggerHandler
where
    F: Fn(BotWorker, BotMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |bot, message| Box::pin(handler(bot, message)))
}

pub(crate) fn event_handler<F, Fut>(handler: F) -> EventHandler
where
    F: Fn(BotWorker, BotMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(move |bot, message| Box::pin(handler(bot, message)))
}
