//! [`BotWorker`]: the handle handlers use to act within the turn they were spawned for.

use std::sync::Arc;

use botgen_core::{
    Activity, BotMessage, ConversationReference, DialogRequest, ResourceResponse, Result,
    TurnContext,
};
use serde_json::Value;
use tracing::debug;

use crate::bot::Bot;

/// What a worker was spawned with.
#[derive(Clone)]
pub struct WorkerConfig {
    pub context: Arc<TurnContext>,
    pub reference: ConversationReference,
    pub activity: Activity,
}

#[derive(Clone)]
pub struct BotWorker {
    controller: Bot,
    config: WorkerConfig,
}

impl BotWorker {
    pub(crate) fn new(controller: Bot, context: Arc<TurnContext>) -> Self {
        let activity = context.activity().clone();
        let reference = activity.conversation_reference();
        Self {
            controller,
            config: WorkerConfig {
                context,
                reference,
                activity,
            },
        }
    }

    pub fn controller(&self) -> &Bot {
        &self.controller
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Sends a message in the worker's conversation. Returns `None` when `send` middleware
    /// dropped it.
    pub async fn say(&self, message: impl Into<Activity>) -> Result<Option<ResourceResponse>> {
        let mut activity = message.into();
        let context = &self.config.context;
        if !self
            .controller
            .middleware()
            .run_send(context, &mut activity)
            .await?
        {
            return Ok(None);
        }
        let response = context.send_activity(activity).await?;
        Ok(Some(response))
    }

    /// Replies to `source`, addressed with the source message's conversation reference.
    pub async fn reply(
        &self,
        source: &BotMessage,
        message: impl Into<Activity>,
    ) -> Result<Option<ResourceResponse>> {
        let reference = source
            .reference
            .clone()
            .or_else(|| {
                source
                    .incoming_message
                    .as_ref()
                    .map(Activity::conversation_reference)
            })
            .unwrap_or_else(|| self.config.reference.clone());
        let activity = message
            .into()
            .apply_conversation_reference(&reference, false);
        self.say(activity).await
    }

    /// Begins a dialog once the current handler returns.
    pub fn begin_dialog(&self, dialog_id: &str, options: Option<Value>) {
        debug!(dialog_id = %dialog_id, "Queued begin_dialog");
        self.config.context.queue_dialog_request(DialogRequest::Begin {
            dialog_id: dialog_id.to_string(),
            options,
        });
    }

    /// Cancels every active dialog once the current handler returns.
    pub fn cancel_all_dialogs(&self) {
        debug!("Queued cancel_all_dialogs");
        self.config
            .context
            .queue_dialog_request(DialogRequest::CancelAll);
    }
}
