//! Trigger patterns used by `hears` and `interrupts`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use botgen_core::BotMessage;
use regex::Regex;

use crate::handler::{MessagePredicate, TriggerHandler};

/// What a trigger listens for.
#[derive(Clone)]
pub enum Pattern {
    /// Message text equals the string exactly.
    Text(String),
    /// Message text equals any of the strings.
    AnyOf(Vec<String>),
    /// Message text matches the regex.
    Regex(Regex),
    /// Async test over the whole message.
    Predicate(MessagePredicate),
}

impl Pattern {
    pub fn predicate<F, Fut>(test: F) -> Self
    where
        F: Fn(BotMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Pattern::Predicate(Arc::new(move |message| Box::pin(test(message))))
    }

    pub async fn matches(&self, message: &BotMessage) -> bool {
        match self {
            Pattern::Text(text) => message.text.as_deref() == Some(text.as_str()),
            Pattern::AnyOf(texts) => message
                .text
                .as_deref()
                .map(|t| texts.iter().any(|candidate| candidate == t))
                .unwrap_or(false),
            Pattern::Regex(re) => message
                .text
                .as_deref()
                .map(|t| re.is_match(t))
                .unwrap_or(false),
            Pattern::Predicate(test) => test(message.clone()).await,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Pattern::AnyOf(texts) => f.debug_tuple("AnyOf").field(texts).finish(),
            Pattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Pattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::Text(text.to_string())
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Pattern::Text(text)
    }
}

impl From<Vec<&str>> for Pattern {
    fn from(texts: Vec<&str>) -> Self {
        Pattern::AnyOf(texts.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Pattern {
    fn from(texts: Vec<String>) -> Self {
        Pattern::AnyOf(texts)
    }
}

impl<const N: usize> From<[&str; N]> for Pattern {
    fn from(texts: [&str; N]) -> Self {
        Pattern::AnyOf(texts.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re)
    }
}

/// A pattern bound to a handler.
#[derive(Clone)]
pub struct BotTrigger {
    pub pattern: Pattern,
    pub handler: TriggerHandler,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_pattern_is_exact() {
        let pattern = Pattern::from("hello");
        assert!(pattern.matches(&BotMessage::text("hello")).await);
        assert!(!pattern.matches(&BotMessage::text("hello there")).await);
        assert!(!pattern.matches(&BotMessage::default()).await);
    }

    #[tokio::test]
    async fn test_any_of_pattern() {
        let pattern = Pattern::from(["bye", "goodbye", "see you"]);
        assert!(pattern.matches(&BotMessage::text("see you")).await);
        assert!(!pattern.matches(&BotMessage::text("hello")).await);
    }

    #[tokio::test]
    async fn test_regex_and_predicate_patterns() {
        let pattern = Pattern::from(Regex::new(r"^order \d+$").unwrap());
        assert!(pattern.matches(&BotMessage::text("order 42")).await);
        assert!(!pattern.matches(&BotMessage::text("order x")).await);

        let pattern = Pattern::predicate(|message: BotMessage| async move {
            message.user.as_deref() == Some("admin")
        });
        let mut message = BotMessage::text("anything");
        assert!(!pattern.matches(&message).await);
        message.user = Some("admin".to_string());
        assert!(pattern.matches(&message).await);
    }
}
