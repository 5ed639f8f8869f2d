//! Slack adapter: Events API webhooks in, Slack Web API calls out.
//!
//! Works either as a single-workspace integration (`bot_token`) or as a multi-team app
//! (`get_token_for_team` / `get_bot_user_by_team`). Incoming requests are checked against the
//! legacy verification token only.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{
    activity_types, run_pipeline, Activity, BotAdapter, BotgenError, ChannelAccount,
    ConversationAccount, ConversationReference, HandlerError, ResourceResponse, Result,
    TurnContext, TurnHandler, WebhookRequest, WebhookResponse,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

pub const SLACK_CHANNEL: &str = "slack";
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Looks up a per-team value (bot token or bot user id) by Slack team id.
pub type TeamLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub struct SlackAdapterOptions {
    /// Legacy token used to check that webhooks come from Slack.
    pub verification_token: Option<String>,
    pub client_signing_secret: Option<String>,
    /// Bot token for a single workspace.
    pub bot_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
    /// `v1` or `v2`.
    pub oauth_version: String,
    pub redirect_uri: Option<String>,
    pub get_token_for_team: Option<TeamLookup>,
    pub get_bot_user_by_team: Option<TeamLookup>,
    /// Start even when the configuration is incomplete.
    pub enable_incomplete: bool,
    /// Web API base url.
    pub api_url: String,
}

impl Default for SlackAdapterOptions {
    fn default() -> Self {
        Self {
            verification_token: None,
            client_signing_secret: None,
            bot_token: None,
            client_id: None,
            client_secret: None,
            scopes: Vec::new(),
            oauth_version: "v1".to_string(),
            redirect_uri: None,
            get_token_for_team: None,
            get_bot_user_by_team: None,
            enable_incomplete: false,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl fmt::Debug for SlackAdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackAdapterOptions")
            .field("has_verification_token", &self.verification_token.is_some())
            .field("has_bot_token", &self.bot_token.is_some())
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("oauth_version", &self.oauth_version)
            .field("enable_incomplete", &self.enable_incomplete)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl SlackAdapterOptions {
    /// Problems that make the adapter unusable or insecure.
    fn problems(&self) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.verification_token.is_none() && self.client_signing_secret.is_none() {
            problems.push("verification_token or client_signing_secret is required");
        }
        let has_team_lookups =
            self.get_token_for_team.is_some() && self.get_bot_user_by_team.is_some();
        if self.bot_token.is_none() && !has_team_lookups {
            problems.push("bot_token, or get_token_for_team and get_bot_user_by_team, is required");
        }
        if self.client_id.is_some()
            && (self.client_secret.is_none() || self.redirect_uri.is_none() || self.scopes.is_empty())
        {
            problems.push("client_id requires client_secret, redirect_uri and scopes");
        }
        problems
    }
}

pub struct SlackAdapter {
    options: SlackAdapterOptions,
    http: reqwest::Client,
}

impl fmt::Debug for SlackAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackAdapter")
            .field("options", &self.options)
            .finish()
    }
}

impl SlackAdapter {
    /// Fails on incomplete configuration unless `enable_incomplete` is set, in which case the
    /// problems are logged.
    pub fn new(options: SlackAdapterOptions) -> Result<Self> {
        let problems = options.problems();
        if !problems.is_empty() {
            if !options.enable_incomplete {
                return Err(BotgenError::Config(format!(
                    "Slack adapter configuration incomplete: {}",
                    problems.join("; ")
                )));
            }
            for problem in &problems {
                warn!(problem = %problem, "Slack adapter started with incomplete configuration");
            }
        }
        Ok(Self {
            options,
            http: reqwest::Client::new(),
        })
    }

    pub fn options(&self) -> &SlackAdapterOptions {
        &self.options
    }

    /// Token to call the Web API with for `activity`: the bot token, else the team's token.
    pub fn get_api(&self, activity: &Activity) -> Result<String> {
        if let Some(token) = &self.options.bot_token {
            return Ok(token.clone());
        }
        let team_id = activity
            .conversation
            .as_ref()
            .and_then(|c| c.team_id.as_deref())
            .ok_or_else(|| {
                BotgenError::Adapter("Unable to create API based on activity".to_string())
            })?;
        self.options
            .get_token_for_team
            .as_ref()
            .and_then(|lookup| lookup(team_id))
            .ok_or_else(|| BotgenError::Adapter(format!("Missing credentials for team {}", team_id)))
    }

    /// Formats an outgoing activity as a Slack message: `ts`, `text`, `attachments`, `channel`,
    /// `thread_ts`, overridden by any `channel_data` fields.
    pub fn activity_to_slack(&self, activity: &Activity) -> Map<String, Value> {
        let mut message = Map::new();
        if let Some(id) = &activity.id {
            message.insert("ts".to_string(), json!(id));
        }
        if let Some(text) = &activity.text {
            message.insert("text".to_string(), json!(text));
        }
        if !activity.attachments.is_empty() {
            message.insert("attachments".to_string(), json!(activity.attachments));
        }
        if let Some(conversation) = &activity.conversation {
            message.insert("channel".to_string(), json!(conversation.id));
            if let Some(thread_ts) = &conversation.thread_id {
                message.insert("thread_ts".to_string(), json!(thread_ts));
            }
        }

        if let Some(Value::Object(channel_data)) = &activity.channel_data {
            for (key, value) in channel_data {
                message.insert(key.clone(), value.clone());
            }
        }

        if is_truthy(message.get("ephemeral")) {
            if let Some(recipient) = &activity.recipient {
                message.insert("user".to_string(), json!(recipient.id));
            }
        }

        if ["icon_url", "icon_emoji", "username"]
            .iter()
            .any(|key| is_truthy(message.get(*key)))
        {
            message.insert("as_user".to_string(), Value::Bool(false));
        }

        // as_user is deprecated for oauth v2 apps
        if message.get("as_user") == Some(&Value::Bool(false)) && self.options.oauth_version == "v2" {
            message.remove("as_user");
        }

        message
    }

    /// POSTs to a Web API method and returns the decoded JSON response.
    async fn call(&self, token: &str, method: &str, body: &Map<String, Value>) -> Result<Value> {
        let url = format!("{}/{}", self.options.api_url.trim_end_matches('/'), method);
        debug!(method = %method, "Slack API call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| BotgenError::Adapter(format!("{}: {}", method, e)))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| BotgenError::Adapter(format!("{}: {}", method, e)))
    }

    /// Like [`SlackAdapter::call`] but turns `ok: false` into an error.
    async fn call_ok(&self, token: &str, method: &str, body: &Map<String, Value>) -> Result<Value> {
        let result = self.call(token, method, body).await?;
        if result.get("ok") == Some(&Value::Bool(true)) {
            Ok(result)
        } else {
            Err(BotgenError::Adapter(format!(
                "{} failed: {}",
                method,
                result.get("error").and_then(Value::as_str).unwrap_or("unknown error")
            )))
        }
    }

    fn event_to_activity(&self, body: &Value, event: &Value) -> Activity {
        let team_id = body
            .get("team_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let bot_user = match (&self.options.get_bot_user_by_team, &team_id) {
            (Some(lookup), Some(team)) => lookup(team),
            _ => None,
        };
        let text_field = |key: &str| event.get(key).and_then(Value::as_str).map(str::to_string);

        let is_user_message = text_field("type").as_deref() == Some("message")
            && event.get("subtype").is_none();

        Activity {
            activity_type: if is_user_message {
                activity_types::MESSAGE.to_string()
            } else {
                activity_types::EVENT.to_string()
            },
            id: text_field("ts").or_else(|| text_field("event_ts")),
            timestamp: Some(chrono::Utc::now()),
            channel_id: SLACK_CHANNEL.to_string(),
            conversation: Some(ConversationAccount {
                id: text_field("channel").unwrap_or_default(),
                name: None,
                thread_id: text_field("thread_ts"),
                team_id,
            }),
            from: Some(ChannelAccount::new(
                text_field("user")
                    .or_else(|| text_field("bot_id"))
                    .unwrap_or_default(),
            )),
            recipient: Some(ChannelAccount::new(bot_user.unwrap_or_default())),
            text: text_field("text"),
            channel_data: Some(event.clone()),
            ..Default::default()
        }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

#[async_trait]
impl BotAdapter for SlackAdapter {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send_activities(
        &self,
        context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        let mut responses = Vec::new();
        for activity in activities {
            if activity.activity_type != activity_types::MESSAGE {
                debug!(
                    activity_type = %activity.activity_type,
                    "Unknown message type encountered in send_activities"
                );
                continue;
            }

            let message = self.activity_to_slack(&activity);
            let method = if is_truthy(message.get("ephemeral")) {
                "chat.postEphemeral"
            } else {
                "chat.postMessage"
            };

            let token = match self.get_api(context.activity()) {
                Ok(token) => token,
                Err(e) => {
                    error!(error = %e, "Error sending activity to API");
                    continue;
                }
            };
            match self.call(&token, method, &message).await {
                Ok(result) if result.get("ok") == Some(&Value::Bool(true)) => {
                    let ts = result
                        .get("ts")
                        .or_else(|| result.get("message_ts"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    info!(method = %method, ts = %ts, "Slack message sent");
                    responses.push(ResourceResponse::new(ts));
                }
                Ok(result) => {
                    error!(method = %method, response = %result, "Error sending activity to API");
                }
                Err(e) => {
                    error!(method = %method, error = %e, "Error sending activity to API");
                }
            }
        }
        Ok(responses)
    }

    async fn update_activity(&self, context: &TurnContext, activity: Activity) -> Result<()> {
        let channel = activity
            .conversation_id()
            .ok_or(HandlerError::MissingConversation)?;
        let ts = activity
            .id
            .as_deref()
            .ok_or_else(|| BotgenError::Adapter("update_activity requires activity.id".to_string()))?;
        let mut message = self.activity_to_slack(&activity);
        message.insert("channel".to_string(), json!(channel));
        message.insert("ts".to_string(), json!(ts));

        let token = self.get_api(context.activity())?;
        self.call_ok(&token, "chat.update", &message).await?;
        Ok(())
    }

    async fn delete_activity(
        &self,
        context: &TurnContext,
        reference: &ConversationReference,
    ) -> Result<()> {
        let channel = reference
            .conversation
            .as_ref()
            .map(|c| c.id.clone())
            .filter(|id| !id.is_empty())
            .ok_or(HandlerError::MissingConversation)?;
        let ts = reference.activity_id.clone().ok_or_else(|| {
            BotgenError::Adapter("delete_activity requires reference.activity_id".to_string())
        })?;
        let mut body = Map::new();
        body.insert("channel".to_string(), json!(channel));
        body.insert("ts".to_string(), json!(ts));

        let token = self.get_api(context.activity())?;
        self.call_ok(&token, "chat.delete", &body).await?;
        Ok(())
    }

    #[instrument(skip(self, request, logic))]
    async fn process_activity(
        self: Arc<Self>,
        request: WebhookRequest,
        logic: Arc<dyn TurnHandler>,
    ) -> Result<WebhookResponse> {
        let body: Value = request.body_json()?;
        let body_type = body.get("type").and_then(Value::as_str).unwrap_or_default();

        if body_type == "url_verification" {
            let challenge = body.get("challenge").cloned().unwrap_or(Value::Null);
            return Ok(WebhookResponse::ok(Some(json!({ "challenge": challenge }))));
        }

        if let Some(expected) = &self.options.verification_token {
            if body.get("token").and_then(Value::as_str) != Some(expected.as_str()) {
                warn!("Rejected Slack request with invalid verification token");
                return Err(HandlerError::Unauthorized.into());
            }
        }

        if body_type != "event_callback" {
            debug!(body_type = %body_type, "Slack request acknowledged without processing");
            return Ok(WebhookResponse::ok(None));
        }

        let Some(event) = body.get("event") else {
            return Err(HandlerError::InvalidRequest("event_callback without event".to_string()).into());
        };
        let activity = self.event_to_activity(&body, event);
        debug!(
            activity_type = %activity.activity_type,
            channel = ?activity.conversation_id(),
            "Slack event received"
        );

        let context = Arc::new(TurnContext::new(self.clone(), activity));
        run_pipeline(&context, &logic).await?;
        Ok(WebhookResponse::with_status(context.http_status(), None))
    }
}
