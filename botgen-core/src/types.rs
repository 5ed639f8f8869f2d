//! Core types: activities, conversation addressing, and the simplified message handed to handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known values of [`Activity::activity_type`].
pub mod activity_types {
    pub const MESSAGE: &str = "message";
    pub const EVENT: &str = "event";
    pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
}

/// A user or bot identity on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// The conversation an activity belongs to. `thread_id` and `team_id` carry sub-channel
/// addressing for platforms that have it (e.g. Slack threads and workspaces).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Enough addressing information to send a message into an existing conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReference {
    pub activity_id: Option<String>,
    pub user: Option<ChannelAccount>,
    pub bot: Option<ChannelAccount>,
    pub conversation: Option<ConversationAccount>,
    pub channel_id: String,
    pub service_url: Option<String>,
}

/// A single unit of communication between a platform and the bot, in either direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: String,
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel_id: String,
    pub conversation: Option<ConversationAccount>,
    pub from: Option<ChannelAccount>,
    pub recipient: Option<ChannelAccount>,
    pub text: Option<String>,
    pub value: Option<Value>,
    /// Platform-specific payload; outgoing fields here override the adapter's defaults.
    pub channel_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    pub reply_to_id: Option<String>,
    pub service_url: Option<String>,
}

impl Activity {
    /// A plain text message with empty channel data.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            activity_type: activity_types::MESSAGE.to_string(),
            text: Some(text.into()),
            channel_data: Some(Value::Object(Map::new())),
            ..Default::default()
        }
    }

    pub fn is_message(&self) -> bool {
        self.activity_type == activity_types::MESSAGE
    }

    /// Conversation id, if the activity has a non-empty one.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Extracts the addressing of an incoming activity so replies can be routed back to it.
    pub fn conversation_reference(&self) -> ConversationReference {
        ConversationReference {
            activity_id: self.id.clone(),
            user: self.from.clone(),
            bot: self.recipient.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// Addresses this activity using `reference`.
    ///
    /// Outgoing activities are sent from the bot to the user and reply to the referenced
    /// activity; incoming ones (`is_incoming`) keep the user as sender and take its id.
    pub fn apply_conversation_reference(
        mut self,
        reference: &ConversationReference,
        is_incoming: bool,
    ) -> Self {
        self.channel_id = reference.channel_id.clone();
        self.service_url = reference.service_url.clone();
        self.conversation = reference.conversation.clone();
        if is_incoming {
            self.from = reference.user.clone();
            self.recipient = reference.bot.clone();
            if reference.activity_id.is_some() {
                self.id = reference.activity_id.clone();
            }
        } else {
            self.from = reference.bot.clone();
            self.recipient = reference.user.clone();
            if reference.activity_id.is_some() {
                self.reply_to_id = reference.activity_id.clone();
            }
        }
        self
    }
}

/// Builds a text message activity from a bare string.
impl From<&str> for Activity {
    fn from(text: &str) -> Self {
        Activity::message(text)
    }
}

impl From<String> for Activity {
    fn from(text: String) -> Self {
        Activity::message(text)
    }
}

/// Maps a loosely formed [`BotMessage`] into an activity. Every extra field of the message is
/// kept in `channel_data` so adapters can forward platform-specific options (quick replies,
/// blocks, ephemeral flags...).
impl From<BotMessage> for Activity {
    fn from(message: BotMessage) -> Self {
        let BotMessage {
            message_type,
            text,
            value,
            user,
            channel,
            reference,
            incoming_message: _,
            mut fields,
        } = message;

        let attachments = match fields.remove("attachments") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                fields.insert("attachments".to_string(), other);
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut activity = Activity {
            activity_type: if message_type.is_empty() {
                activity_types::MESSAGE.to_string()
            } else {
                message_type
            },
            text,
            value,
            channel_data: Some(Value::Object(fields)),
            attachments,
            ..Default::default()
        };

        if let Some(reference) = reference {
            activity = activity.apply_conversation_reference(&reference, false);
        } else if let Some(channel) = channel {
            activity.conversation = Some(ConversationAccount::new(channel));
            activity.recipient = user.map(ChannelAccount::new);
        }

        activity
    }
}

impl From<&BotMessage> for Activity {
    fn from(message: &BotMessage) -> Self {
        Activity::from(message.clone())
    }
}

/// The simplified message handed to triggers, event handlers and dialogs.
///
/// This is also the JSON shape accepted by the web adapter (`user`, `text`, `type`, plus any
/// extra fields, which are kept in [`BotMessage::fields`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotMessage {
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ConversationReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_message: Option<Activity>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn default_message_type() -> String {
    activity_types::MESSAGE.to_string()
}

impl Default for BotMessage {
    fn default() -> Self {
        Self {
            message_type: default_message_type(),
            text: None,
            value: None,
            user: None,
            channel: None,
            reference: None,
            incoming_message: None,
            fields: Map::new(),
        }
    }
}

impl BotMessage {
    /// A `message`-typed message with the given text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Builds the message for an incoming activity: sender, conversation, text and value are
    /// lifted to top-level fields and everything in `channel_data` is kept as extra fields.
    pub fn from_activity(activity: &Activity) -> Self {
        let fields = match &activity.channel_data {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "type" | "text" | "user" | "channel" | "value"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Map::new(),
        };

        Self {
            message_type: activity.activity_type.clone(),
            text: activity.text.clone(),
            value: activity.value.clone(),
            user: activity.from.as_ref().map(|u| u.id.clone()),
            channel: activity.conversation.as_ref().map(|c| c.id.clone()),
            reference: Some(activity.conversation_reference()),
            incoming_message: Some(activity.clone()),
            fields,
        }
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Id of a message created on the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: String,
}

impl ResourceResponse {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A dialog operation queued by a worker during a turn and applied by the controller
/// once the current handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogRequest {
    Begin {
        dialog_id: String,
        options: Option<Value>,
    },
    CancelAll,
}
