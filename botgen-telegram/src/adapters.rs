//! Conversion from Telegram (teloxide) types to botgen activities.

use botgen_core::{activity_types, Activity, ChannelAccount, ConversationAccount};
use serde_json::json;
use teloxide::types::{Update, UpdateKind};

/// Channel id of activities produced by the Telegram adapter.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Wraps a teloxide User for conversion to a [`ChannelAccount`].
pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl<'a> TelegramUserWrapper<'a> {
    pub fn to_channel_account(&self) -> ChannelAccount {
        ChannelAccount {
            id: self.0.id.0.to_string(),
            name: Some(
                self.0
                    .username
                    .clone()
                    .unwrap_or_else(|| self.0.full_name()),
            ),
        }
    }
}

/// Wraps a teloxide Message for conversion to an incoming [`Activity`].
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> TelegramMessageWrapper<'a> {
    /// The conversation is the chat; `bot` becomes the recipient when known.
    pub fn to_activity(&self, bot: Option<&ChannelAccount>) -> Activity {
        let message = self.0;
        let conversation = ConversationAccount {
            id: message.chat.id.0.to_string(),
            name: message
                .chat
                .title()
                .or_else(|| message.chat.username())
                .map(str::to_string),
            thread_id: None,
            team_id: None,
        };

        Activity {
            activity_type: activity_types::MESSAGE.to_string(),
            id: Some(message.id.0.to_string()),
            timestamp: Some(message.date),
            channel_id: TELEGRAM_CHANNEL.to_string(),
            conversation: Some(conversation),
            from: message
                .from
                .as_ref()
                .map(|u| TelegramUserWrapper(u).to_channel_account()),
            recipient: bot.cloned(),
            text: message.text().map(str::to_string),
            channel_data: Some(json!({
                "chat_type": if message.chat.is_private() { "private" } else { "group" },
                "reply_to_message_id": self.reply_to_message_id(),
                "reply_to_message_from_bot": self.reply_to_message_from_bot(),
                "reply_to_message_text": self.reply_to_message_text(),
            })),
            ..Default::default()
        }
    }

    fn reply_to_message_id(&self) -> Option<String> {
        self.0.reply_to_message().map(|msg| msg.id.0.to_string())
    }

    fn reply_to_message_from_bot(&self) -> bool {
        self.0
            .reply_to_message()
            .and_then(|m| m.from.as_ref())
            .map(|u| u.is_bot)
            .unwrap_or(false)
    }

    fn reply_to_message_text(&self) -> Option<String> {
        self.0
            .reply_to_message()
            .and_then(|m| m.text())
            .map(|s| s.to_string())
    }
}

/// Message updates become activities; every other update kind yields `None`.
pub fn update_to_activity(update: &Update, bot: Option<&ChannelAccount>) -> Option<Activity> {
    match &update.kind {
        UpdateKind::Message(message) => Some(TelegramMessageWrapper(message).to_activity(bot)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_update(value: serde_json::Value) -> Update {
        serde_json::from_str(&value.to_string()).unwrap()
    }

    #[test]
    fn test_telegram_user_wrapper_to_channel_account() {
        let user = teloxide::types::User {
            id: teloxide::types::UserId(123),
            is_bot: false,
            first_name: "Test".to_string(),
            last_name: Some("User".to_string()),
            username: Some("testuser".to_string()),
            language_code: Some("en".to_string()),
            is_premium: false,
            added_to_attachment_menu: false,
        };

        let account = TelegramUserWrapper(&user).to_channel_account();

        assert_eq!(account.id, "123");
        assert_eq!(account.name.as_deref(), Some("testuser"));
    }

    #[test]
    fn test_message_update_becomes_activity() {
        let update = parse_update(json!({
            "update_id": 10,
            "message": {
                "message_id": 5,
                "date": 1_700_000_000,
                "chat": { "id": 42, "type": "private", "first_name": "Ada", "username": "ada" },
                "from": { "id": 7, "is_bot": false, "first_name": "Ada", "username": "ada" },
                "text": "hello"
            }
        }));
        let bot = ChannelAccount::new("999");

        let activity = update_to_activity(&update, Some(&bot)).unwrap();

        assert_eq!(activity.activity_type, "message");
        assert_eq!(activity.channel_id, TELEGRAM_CHANNEL);
        assert_eq!(activity.id.as_deref(), Some("5"));
        assert_eq!(activity.conversation_id(), Some("42"));
        assert_eq!(activity.from.as_ref().map(|f| f.id.as_str()), Some("7"));
        assert_eq!(activity.recipient, Some(bot));
        assert_eq!(activity.text.as_deref(), Some("hello"));
        let channel_data = activity.channel_data.unwrap();
        assert_eq!(channel_data["chat_type"], "private");
        assert_eq!(channel_data["reply_to_message_from_bot"], false);
    }

    #[test]
    fn test_non_message_update_is_ignored() {
        let update = parse_update(json!({
            "update_id": 11,
            "edited_message": {
                "message_id": 5,
                "date": 1_700_000_000,
                "edit_date": 1_700_000_100,
                "chat": { "id": 42, "type": "private", "first_name": "Ada" },
                "from": { "id": 7, "is_bot": false, "first_name": "Ada" },
                "text": "hello again"
            }
        }));
        assert!(update_to_activity(&update, None).is_none());
    }
}
