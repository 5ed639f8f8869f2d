//! Adapter abstraction: the bridge between bot logic and a messaging platform.
//!
//! [`BotAdapter`] is transport-agnostic; implementations translate platform requests into
//! [`Activity`] values and send outgoing activities back through the platform API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::error;

use crate::context::TurnContext;
use crate::error::{BotgenError, HandlerError, Result};
use crate::types::{Activity, ConversationReference, ResourceResponse};

/// Bot logic run once per incoming activity. The controller implements this.
#[async_trait]
pub trait TurnHandler: Send + Sync {
    async fn on_turn(&self, context: Arc<TurnContext>) -> Result<()>;
}

/// Connects the bot to one messaging platform.
#[async_trait]
pub trait BotAdapter: Send + Sync {
    /// Short platform name used in logs (e.g. `webhook`, `slack`).
    fn name(&self) -> &str;

    /// Sends outgoing activities to the platform.
    async fn send_activities(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>>;

    /// Replaces a previously sent activity.
    async fn update_activity(&self, _context: &TurnContext, _activity: Activity) -> Result<()> {
        Err(BotgenError::NotImplemented(format!(
            "{}: update_activity",
            self.name()
        )))
    }

    /// Deletes a previously sent activity.
    async fn delete_activity(
        &self,
        _context: &TurnContext,
        _reference: &ConversationReference,
    ) -> Result<()> {
        Err(BotgenError::NotImplemented(format!(
            "{}: delete_activity",
            self.name()
        )))
    }

    /// Accepts an incoming webhook request, turns it into a [`TurnContext`] and runs `logic`.
    async fn process_activity(
        self: Arc<Self>,
        request: WebhookRequest,
        logic: Arc<dyn TurnHandler>,
    ) -> Result<WebhookResponse>;
}

/// Runs the turn logic for a context; a failed turn is logged and marks the HTTP status as 500.
pub async fn run_pipeline(context: &Arc<TurnContext>, logic: &Arc<dyn TurnHandler>) -> Result<()> {
    if let Err(e) = logic.on_turn(Arc::clone(context)).await {
        error!(
            error = %e,
            channel_id = %context.activity().channel_id,
            "Turn failed"
        );
        context.set_http_status(500);
        return Err(e);
    }
    Ok(())
}

/// A raw incoming HTTP request, as seen by an adapter. Header names are stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            headers: HashMap::new(),
            body,
        }
    }

    /// A request carrying `value` as a JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(value.to_string().into_bytes())
            .with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Parses the body as JSON; a malformed body is an invalid request.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HandlerError::InvalidRequest(format!("malformed JSON body: {}", e)).into())
    }
}

/// What the adapter wants written back to the HTTP caller.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl WebhookResponse {
    pub fn ok(body: Option<Value>) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = WebhookRequest::new(Vec::new()).with_header("X-Slack-Signature", "v0=abc");
        assert_eq!(request.header("x-slack-signature"), Some("v0=abc"));
        assert_eq!(request.header("X-SLACK-SIGNATURE"), Some("v0=abc"));
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_json_request_sets_content_type() {
        let request = WebhookRequest::json(&json!({"text": "hi"}));
        assert_eq!(request.content_type(), Some("application/json"));
        let body: Value = request.body_json().unwrap();
        assert_eq!(body, json!({"text": "hi"}));
    }

    #[test]
    fn test_malformed_body_is_invalid_request() {
        let request = WebhookRequest::new(b"{not json".to_vec());
        let err = request.body_json::<Value>().unwrap_err();
        assert!(matches!(
            err,
            BotgenError::Handler(HandlerError::InvalidRequest(_))
        ));
    }
}
