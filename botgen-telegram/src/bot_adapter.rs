//! [`BotAdapter`] implementation over teloxide::Bot. Incoming webhook bodies are Telegram
//! updates; outgoing activities become Bot API calls.

use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{
    activity_types, run_pipeline, Activity, BotAdapter, BotgenError, ChannelAccount,
    ConversationReference, HandlerError, ResourceResponse, Result, TurnContext, TurnHandler,
    WebhookRequest, WebhookResponse,
};
use teloxide::{
    prelude::*,
    types::{ChatId, MessageId, Update},
};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::update_to_activity;
use crate::config::TelegramConfig;

pub struct TelegramAdapter {
    bot: teloxide::Bot,
    bot_account: Option<ChannelAccount>,
}

impl TelegramAdapter {
    /// Creates an adapter from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self {
            bot,
            bot_account: None,
        }
    }

    /// Builds the teloxide Bot from config. An invalid API URL is logged and the default is used.
    pub fn from_config(config: &TelegramConfig) -> Self {
        let bot = teloxide::Bot::new(config.bot_token.clone());
        let bot = match config.telegram_api_url {
            Some(ref url_str) => match reqwest::Url::parse(url_str) {
                Ok(url) => bot.set_api_url(url),
                Err(e) => {
                    error!(error = %e, url = %url_str, "Invalid TELEGRAM_API_URL, using default");
                    bot
                }
            },
            None => bot,
        };
        Self::new(bot)
    }

    /// Account used as the recipient of incoming activities.
    pub fn with_bot_account(mut self, account: ChannelAccount) -> Self {
        self.bot_account = Some(account);
        self
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

fn chat_id(conversation_id: Option<&str>) -> Result<ChatId> {
    let id = conversation_id.ok_or(HandlerError::MissingConversation)?;
    id.parse::<i64>()
        .map(ChatId)
        .map_err(|_| BotgenError::Adapter(format!("Invalid Telegram chat id: {}", id)))
}

fn message_id(id: Option<&str>) -> Result<MessageId> {
    let id = id.ok_or_else(|| BotgenError::Adapter("Missing Telegram message id".to_string()))?;
    id.parse::<i32>()
        .map(MessageId)
        .map_err(|_| BotgenError::Adapter(format!("Invalid Telegram message id: {}", id)))
}

fn api_error(e: teloxide::RequestError) -> BotgenError {
    BotgenError::Adapter(e.to_string())
}

#[async_trait]
impl BotAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_activities(
        &self,
        _context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            if activity.activity_type != activity_types::MESSAGE {
                debug!(activity_type = %activity.activity_type, "Skipping non-message activity");
                continue;
            }
            let Some(text) = activity.text.as_deref().filter(|t| !t.is_empty()) else {
                warn!("Skipping message activity without text");
                continue;
            };
            let chat = chat_id(activity.conversation_id())?;
            let sent = self
                .bot
                .send_message(chat, text.to_string())
                .await
                .map_err(api_error)?;
            info!(chat_id = chat.0, message_id = sent.id.0, "Telegram message sent");
            responses.push(ResourceResponse::new(sent.id.0.to_string()));
        }
        Ok(responses)
    }

    async fn update_activity(&self, _context: &TurnContext, activity: Activity) -> Result<()> {
        let chat = chat_id(activity.conversation_id())?;
        let id = message_id(activity.id.as_deref())?;
        let text = activity.text.unwrap_or_default();
        self.bot
            .edit_message_text(chat, id, text)
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn delete_activity(
        &self,
        _context: &TurnContext,
        reference: &ConversationReference,
    ) -> Result<()> {
        let chat = chat_id(reference.conversation.as_ref().map(|c| c.id.as_str()))?;
        let id = message_id(reference.activity_id.as_deref())?;
        self.bot.delete_message(chat, id).await.map_err(api_error)?;
        Ok(())
    }

    #[instrument(skip(self, request, logic))]
    async fn process_activity(
        self: Arc<Self>,
        request: WebhookRequest,
        logic: Arc<dyn TurnHandler>,
    ) -> Result<WebhookResponse> {
        let update: Update = request.body_json()?;
        let Some(activity) = update_to_activity(&update, self.bot_account.as_ref()) else {
            debug!(update_id = update.id.0, "Non-message update acknowledged");
            return Ok(WebhookResponse::ok(None));
        };

        let context = Arc::new(TurnContext::new(self.clone(), activity));
        run_pipeline(&context, &logic).await?;
        Ok(WebhookResponse::with_status(context.http_status(), None))
    }
}
