//! # Middleware chain
//!
//! Runs an ordered list of [`Middleware`] around each turn. Incoming messages pass through the
//! ingest, receive and interpret stages (each stage across all middleware, in order); outgoing
//! activities pass through `send`; `after` runs in reverse order once the turn is done.
//! Any stage returning `false` stops the chain for that message or activity.

use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{Activity, BotMessage, Result, TurnContext};
use tracing::{debug, info, instrument};

/// How a turn was handled. Passed to [`Middleware::after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Nothing matched the message.
    Unhandled,
    /// A middleware stage returned false.
    Stopped,
    /// An interrupt handled the message.
    Interrupted,
    /// An active dialog consumed the message.
    Dialog,
    /// A `hears` trigger handled the message.
    Trigger,
    /// Event handlers ran for the message type.
    Event,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Unhandled => "Unhandled",
            TurnOutcome::Stopped => "Stopped",
            TurnOutcome::Interrupted => "Interrupted",
            TurnOutcome::Dialog => "Dialog",
            TurnOutcome::Trigger => "Trigger",
            TurnOutcome::Event => "Event",
        }
    }
}

/// Hooks into every stage of message processing. All stages default to pass-through.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// First look at an incoming message, before anything else. Return false to drop it.
    async fn ingest(&self, _context: &TurnContext, _message: &mut BotMessage) -> Result<bool> {
        Ok(true)
    }

    /// Runs before dialogs and triggers see the message.
    async fn receive(&self, _context: &TurnContext, _message: &mut BotMessage) -> Result<bool> {
        Ok(true)
    }

    /// Enriches the message (e.g. intent detection) right before triggers are tested.
    async fn interpret(&self, _context: &TurnContext, _message: &mut BotMessage) -> Result<bool> {
        Ok(true)
    }

    /// Runs for every outgoing activity. Return false to drop the activity.
    async fn send(&self, _context: &TurnContext, _activity: &mut Activity) -> Result<bool> {
        Ok(true)
    }

    /// Runs each time a worker is spawned for the turn.
    async fn spawn(&self, _context: &TurnContext) -> Result<()> {
        Ok(())
    }

    /// Runs after the turn (reverse order), with how the turn was handled.
    async fn after(
        &self,
        _context: &TurnContext,
        _message: &BotMessage,
        _outcome: TurnOutcome,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
enum IncomingStage {
    Ingest,
    Receive,
    Interpret,
}

impl IncomingStage {
    fn as_str(&self) -> &'static str {
        match self {
            IncomingStage::Ingest => "ingest",
            IncomingStage::Receive => "receive",
            IncomingStage::Interpret => "interpret",
        }
    }
}

/// Ordered middleware list.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
        }
    }

    /// Appends a middleware (builder style).
    pub fn add_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs ingest, receive and interpret. Returns false as soon as any middleware stops the message.
    #[instrument(skip(self, context, message))]
    pub async fn run_incoming(&self, context: &TurnContext, message: &mut BotMessage) -> Result<bool> {
        for stage in [
            IncomingStage::Ingest,
            IncomingStage::Receive,
            IncomingStage::Interpret,
        ] {
            for mw in &self.middleware {
                let should_continue = match stage {
                    IncomingStage::Ingest => mw.ingest(context, message).await?,
                    IncomingStage::Receive => mw.receive(context, message).await?,
                    IncomingStage::Interpret => mw.interpret(context, message).await?,
                };
                debug!(
                    middleware = %mw.name(),
                    stage = stage.as_str(),
                    should_continue,
                    "step: middleware stage done"
                );
                if !should_continue {
                    info!(
                        user = ?message.user,
                        middleware = %mw.name(),
                        stage = stage.as_str(),
                        "step: middleware returned false, chain stopped"
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Runs `send` for an outgoing activity. Returns false if a middleware dropped it.
    pub async fn run_send(&self, context: &TurnContext, activity: &mut Activity) -> Result<bool> {
        for mw in &self.middleware {
            if !mw.send(context, activity).await? {
                info!(
                    middleware = %mw.name(),
                    text = ?activity.text,
                    "step: middleware dropped outgoing activity"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn run_spawn(&self, context: &TurnContext) -> Result<()> {
        for mw in &self.middleware {
            mw.spawn(context).await?;
        }
        Ok(())
    }

    /// Runs `after` in reverse order (last added runs first).
    #[instrument(skip(self, context, message))]
    pub async fn run_after(
        &self,
        context: &TurnContext,
        message: &BotMessage,
        outcome: TurnOutcome,
    ) -> Result<()> {
        for mw in self.middleware.iter().rev() {
            mw.after(context, message, outcome).await?;
            debug!(
                middleware = %mw.name(),
                outcome = outcome.as_str(),
                "step: middleware after done"
            );
        }
        Ok(())
    }
}
