//! Per-turn context: the incoming activity, the adapter that received it, and mutable turn state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::adapter::BotAdapter;
use crate::error::Result;
use crate::types::{
    activity_types, Activity, BotMessage, ConversationReference, DialogRequest, ResourceResponse,
};

/// Mutable state scoped to one turn.
#[derive(Debug)]
pub struct TurnState {
    /// Status the webhook answers with.
    pub http_status: u16,
    /// Outbound messages collected for a synchronous HTTP response.
    pub http_body: Vec<Value>,
    /// Whether anything was sent during this turn.
    pub responded: bool,
    pub bot_message: Option<BotMessage>,
    pub dialog_requests: Vec<DialogRequest>,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            http_status: 200,
            http_body: Vec::new(),
            responded: false,
            bot_message: None,
            dialog_requests: Vec::new(),
        }
    }
}

pub struct TurnContext {
    adapter: Arc<dyn BotAdapter>,
    activity: Activity,
    state: Mutex<TurnState>,
}

impl TurnContext {
    pub fn new(adapter: Arc<dyn BotAdapter>, activity: Activity) -> Self {
        Self {
            adapter,
            activity,
            state: Mutex::new(TurnState::default()),
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn adapter(&self) -> &Arc<dyn BotAdapter> {
        &self.adapter
    }

    fn lock_state(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the turn state. Do not await inside `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut TurnState) -> R) -> R {
        f(&mut self.lock_state())
    }

    pub fn responded(&self) -> bool {
        self.lock_state().responded
    }

    pub fn http_status(&self) -> u16 {
        self.lock_state().http_status
    }

    pub fn set_http_status(&self, status: u16) {
        self.lock_state().http_status = status;
    }

    pub fn push_http_body(&self, message: Value) {
        self.lock_state().http_body.push(message);
    }

    pub fn take_http_body(&self) -> Vec<Value> {
        std::mem::take(&mut self.lock_state().http_body)
    }

    pub fn bot_message(&self) -> Option<BotMessage> {
        self.lock_state().bot_message.clone()
    }

    pub fn set_bot_message(&self, message: BotMessage) {
        self.lock_state().bot_message = Some(message);
    }

    pub fn queue_dialog_request(&self, request: DialogRequest) {
        self.lock_state().dialog_requests.push(request);
    }

    pub fn take_dialog_requests(&self) -> Vec<DialogRequest> {
        std::mem::take(&mut self.lock_state().dialog_requests)
    }

    /// Sends one activity and returns the platform's response for it.
    pub async fn send_activity(&self, activity: impl Into<Activity>) -> Result<ResourceResponse> {
        let responses = self.send_activities(vec![activity.into()]).await?;
        Ok(responses.into_iter().next().unwrap_or_default())
    }

    /// Sends activities through the adapter. Activities without a conversation are addressed
    /// to the conversation of the incoming activity.
    pub async fn send_activities(&self, activities: Vec<Activity>) -> Result<Vec<ResourceResponse>> {
        let reference = self.activity.conversation_reference();
        let activities: Vec<Activity> = activities
            .into_iter()
            .map(|mut activity| {
                if activity.activity_type.is_empty() {
                    activity.activity_type = activity_types::MESSAGE.to_string();
                }
                if activity.conversation.is_none() {
                    activity = activity.apply_conversation_reference(&reference, false);
                }
                activity
            })
            .collect();

        debug!(
            adapter = %self.adapter.name(),
            count = activities.len(),
            "Sending activities"
        );
        let responses = self.adapter.send_activities(self, activities).await?;
        self.lock_state().responded = true;
        Ok(responses)
    }

    pub async fn update_activity(&self, activity: Activity) -> Result<()> {
        self.adapter.update_activity(self, activity).await
    }

    pub async fn delete_activity(&self, reference: &ConversationReference) -> Result<()> {
        self.adapter.delete_activity(self, reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{TurnHandler, WebhookRequest, WebhookResponse};
    use crate::error::BotgenError;
    use crate::types::{ChannelAccount, ConversationAccount};
    use async_trait::async_trait;

    /// Records every sent activity.
    struct RecordingAdapter {
        sent: Mutex<Vec<Activity>>,
    }

    #[async_trait]
    impl BotAdapter for RecordingAdapter {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_activities(
            &self,
            _context: &TurnContext,
            activities: Vec<Activity>,
        ) -> Result<Vec<ResourceResponse>> {
            let mut sent = self.sent.lock().unwrap();
            let responses = activities
                .iter()
                .enumerate()
                .map(|(i, _)| ResourceResponse::new(format!("r{}", sent.len() + i)))
                .collect();
            sent.extend(activities);
            Ok(responses)
        }

        async fn process_activity(
            self: Arc<Self>,
            _request: WebhookRequest,
            _logic: Arc<dyn TurnHandler>,
        ) -> Result<WebhookResponse> {
            Ok(WebhookResponse::ok(None))
        }
    }

    fn context() -> (Arc<RecordingAdapter>, TurnContext) {
        let adapter = Arc::new(RecordingAdapter {
            sent: Mutex::new(Vec::new()),
        });
        let activity = Activity {
            activity_type: "message".to_string(),
            id: Some("in-1".to_string()),
            channel_id: "webhook".to_string(),
            conversation: Some(ConversationAccount::new("conv")),
            from: Some(ChannelAccount::new("user")),
            recipient: Some(ChannelAccount::new("bot")),
            text: Some("hi".to_string()),
            ..Default::default()
        };
        let ctx = TurnContext::new(adapter.clone(), activity);
        (adapter, ctx)
    }

    #[tokio::test]
    async fn test_send_activity_addresses_incoming_conversation() {
        let (adapter, ctx) = context();
        assert!(!ctx.responded());

        let response = ctx.send_activity("hello back").await.unwrap();
        assert_eq!(response.id, "r0");
        assert!(ctx.responded());

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].conversation_id(), Some("conv"));
        assert_eq!(sent[0].recipient, Some(ChannelAccount::new("user")));
        assert_eq!(sent[0].reply_to_id.as_deref(), Some("in-1"));
    }

    #[tokio::test]
    async fn test_send_activity_keeps_explicit_conversation() {
        let (adapter, ctx) = context();
        let mut activity = Activity::message("elsewhere");
        activity.conversation = Some(ConversationAccount::new("other"));
        activity.activity_type.clear();

        ctx.send_activity(activity).await.unwrap();

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent[0].conversation_id(), Some("other"));
        assert_eq!(sent[0].activity_type, "message");
    }

    #[tokio::test]
    async fn test_update_and_delete_default_to_not_implemented() {
        let (_adapter, ctx) = context();
        let err = ctx.update_activity(Activity::message("x")).await.unwrap_err();
        assert!(matches!(err, BotgenError::NotImplemented(_)));
        let reference = ctx.activity().conversation_reference();
        let err = ctx.delete_activity(&reference).await.unwrap_err();
        assert!(matches!(err, BotgenError::NotImplemented(_)));
    }

    #[test]
    fn test_turn_state_defaults_and_queues() {
        let (_adapter, ctx) = context();
        assert_eq!(ctx.http_status(), 200);
        ctx.push_http_body(serde_json::json!({"text": "a"}));
        ctx.push_http_body(serde_json::json!({"text": "b"}));
        assert_eq!(ctx.take_http_body().len(), 2);
        assert!(ctx.take_http_body().is_empty());

        ctx.queue_dialog_request(DialogRequest::CancelAll);
        assert_eq!(ctx.take_dialog_requests(), vec![DialogRequest::CancelAll]);
        assert!(ctx.take_dialog_requests().is_empty());
    }
}
