//! Webhook adapter: plain JSON in, plain JSON out.
//!
//! The request body is a [`BotMessage`] (`user`, `text`, `type` plus extra fields). Replies sent
//! during the turn are collected and returned as the HTTP response body.

use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{
    run_pipeline, Activity, BotAdapter, BotMessage, BotgenError, ChannelAccount,
    ConversationAccount, HandlerError, ResourceResponse, Result, TurnContext, TurnHandler,
    WebhookRequest, WebhookResponse,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

pub const WEBHOOK_CHANNEL: &str = "webhook";
pub const WEBSOCKET_CHANNEL: &str = "websocket";

#[derive(Debug, Default, Clone)]
pub struct WebAdapter;

impl WebAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Casts an outgoing activity to the simple client format: `type` and `text` plus every
    /// field of `channel_data`.
    pub fn activity_to_message(activity: &Activity) -> Value {
        let mut message = Map::new();
        message.insert(
            "type".to_string(),
            Value::String(activity.activity_type.clone()),
        );
        message.insert(
            "text".to_string(),
            activity.text.clone().map(Value::String).unwrap_or(Value::Null),
        );
        if !activity.attachments.is_empty() {
            message.insert(
                "attachments".to_string(),
                Value::Array(activity.attachments.clone()),
            );
        }
        if let Some(Value::Object(channel_data)) = &activity.channel_data {
            for (key, value) in channel_data {
                message.insert(key.clone(), value.clone());
            }
        }
        Value::Object(message)
    }
}

#[async_trait]
impl BotAdapter for WebAdapter {
    fn name(&self) -> &str {
        "web"
    }

    async fn send_activities(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        let channel = context.activity().channel_id.as_str();
        let mut responses = Vec::with_capacity(activities.len());
        for activity in activities {
            match channel {
                WEBSOCKET_CHANNEL => {
                    return Err(BotgenError::NotImplemented(
                        "websocket transport".to_string(),
                    ))
                }
                WEBHOOK_CHANNEL => {
                    context.push_http_body(Self::activity_to_message(&activity));
                    responses.push(ResourceResponse::new(uuid::Uuid::new_v4().to_string()));
                }
                other => {
                    warn!(channel = %other, "Web adapter cannot deliver to channel");
                }
            }
        }
        Ok(responses)
    }

    #[instrument(skip(self, request, logic))]
    async fn process_activity(
        self: Arc<Self>,
        request: WebhookRequest,
        logic: Arc<dyn TurnHandler>,
    ) -> Result<WebhookResponse> {
        let body: Value = request.body_json()?;
        let message: BotMessage = serde_json::from_value(body.clone())
            .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
        let user = message
            .user
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| HandlerError::InvalidRequest("missing field `user`".to_string()))?;

        let activity = Activity {
            activity_type: message.message_type.clone(),
            timestamp: Some(chrono::Utc::now()),
            channel_id: WEBHOOK_CHANNEL.to_string(),
            conversation: Some(ConversationAccount::new(user.clone())),
            from: Some(ChannelAccount::new(user.clone())),
            recipient: Some(ChannelAccount::new("bot")),
            text: message.text.clone(),
            value: message.value.clone(),
            channel_data: Some(body),
            ..Default::default()
        };
        debug!(user = %user, activity_type = %activity.activity_type, "Webhook activity received");

        let context = Arc::new(TurnContext::new(self.clone(), activity));
        run_pipeline(&context, &logic).await?;

        let outbound = context.take_http_body();
        Ok(WebhookResponse::with_status(
            context.http_status(),
            Some(Value::Array(outbound)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_activity_to_message_merges_channel_data() {
        let mut activity = Activity::message("hi");
        activity.channel_data = Some(json!({ "quick_replies": [{ "title": "yes" }] }));

        let message = WebAdapter::activity_to_message(&activity);

        assert_eq!(message["type"], "message");
        assert_eq!(message["text"], "hi");
        assert_eq!(message["quick_replies"][0]["title"], "yes");
    }

    #[test]
    fn test_activity_to_message_for_plain_string() {
        let message = WebAdapter::activity_to_message(&Activity::from("plain"));
        assert_eq!(message, json!({ "type": "message", "text": "plain" }));
    }
}
