//! Script lines and answer handlers of a [`Conversation`](super::Conversation).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use botgen_core::Result;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::handler::BoxFuture;
use crate::worker::BotWorker;

use super::wrapper::DialogWrapper;

/// Builds line text from the conversation vars.
pub type TextFn = Arc<dyn Fn(&Map<String, Value>) -> String + Send + Sync>;

/// Handles an answer: `(answer text, convo, bot)`.
pub type ConvoHandler =
    Arc<dyn Fn(String, DialogWrapper, BotWorker) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Async test over an answer text.
pub type AnswerPredicate = Arc<dyn Fn(String) -> BoxFuture<'static, bool> + Send + Sync>;

#[derive(Clone)]
pub enum TextTemplate {
    /// One entry is picked at random each time the line is sent.
    Choices(Vec<String>),
    Dynamic(TextFn),
}

impl fmt::Debug for TextTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextTemplate::Choices(choices) => f.debug_tuple("Choices").field(choices).finish(),
            TextTemplate::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Target of an `execute_script` or `beginDialog` action.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteScript {
    pub script: String,
    pub thread: Option<String>,
}

/// Marks a line as a question.
#[derive(Debug, Clone, Default)]
pub struct Collect {
    /// Variable the answer is stored in.
    pub key: Option<String>,
    pub options: Vec<ConvoTrigger>,
}

/// One line of a thread.
#[derive(Debug, Clone, Default)]
pub struct MessageTemplate {
    pub text: Option<TextTemplate>,
    pub action: Option<String>,
    pub execute: Option<ExecuteScript>,
    pub quick_replies: Option<Value>,
    pub attachments: Option<Value>,
    pub blocks: Option<Value>,
    pub attachment: Option<Value>,
    pub attachment_layout: Option<String>,
    pub channel_data: Option<Map<String, Value>>,
    pub collect: Option<Collect>,
}

impl MessageTemplate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(TextTemplate::Choices(vec![text.into()])),
            ..Default::default()
        }
    }

    /// Text picked at random from `choices`.
    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: Some(TextTemplate::Choices(
                choices.into_iter().map(Into::into).collect(),
            )),
            ..Default::default()
        }
    }

    pub fn dynamic<F>(text: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> String + Send + Sync + 'static,
    {
        Self {
            text: Some(TextTemplate::Dynamic(Arc::new(text))),
            ..Default::default()
        }
    }

    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    pub fn with_quick_replies(mut self, quick_replies: Value) -> Self {
        self.quick_replies = Some(quick_replies);
        self
    }

    pub fn with_attachments(mut self, attachments: Value) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_blocks(mut self, blocks: Value) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn with_channel_data(mut self, channel_data: Map<String, Value>) -> Self {
        self.channel_data = Some(channel_data);
        self
    }

    /// Whether sending this line produces a message.
    pub(crate) fn has_content(&self) -> bool {
        let text = match &self.text {
            Some(TextTemplate::Choices(choices)) => choices.iter().any(|c| !c.is_empty()),
            Some(TextTemplate::Dynamic(_)) => true,
            None => false,
        };
        text || self.attachments.is_some()
            || self.attachment.is_some()
            || self.blocks.is_some()
            || self.quick_replies.is_some()
            || self.channel_data.as_ref().is_some_and(|data| !data.is_empty())
    }
}

impl From<&str> for MessageTemplate {
    fn from(text: &str) -> Self {
        MessageTemplate::text(text)
    }
}

impl From<String> for MessageTemplate {
    fn from(text: String) -> Self {
        MessageTemplate::text(text)
    }
}

/// How an answer option is matched.
#[derive(Clone)]
pub enum AnswerPattern {
    /// Case-insensitive regex built from the string.
    Text(String),
    Regex(Regex),
    Predicate(AnswerPredicate),
}

impl AnswerPattern {
    pub async fn matches(&self, answer: &str) -> bool {
        match self {
            AnswerPattern::Text(pattern) => {
                text_regex(pattern).is_some_and(|re| re.is_match(answer))
            }
            AnswerPattern::Regex(re) => re.is_match(answer),
            AnswerPattern::Predicate(test) => test(answer.to_string()).await,
        }
    }
}

/// Strings are used as regexes; ones that do not compile are matched literally.
fn text_regex(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(true)
                .build()
        })
        .ok()
}

impl fmt::Debug for AnswerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerPattern::Text(text) => f.debug_tuple("Text").field(text).finish(),
            AnswerPattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            AnswerPattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for AnswerPattern {
    fn from(pattern: &str) -> Self {
        AnswerPattern::Text(pattern.to_string())
    }
}

impl From<String> for AnswerPattern {
    fn from(pattern: String) -> Self {
        AnswerPattern::Text(pattern)
    }
}

impl From<Regex> for AnswerPattern {
    fn from(re: Regex) -> Self {
        AnswerPattern::Regex(re)
    }
}

/// An answer option of a question: a pattern, or the default, with either a handler or an
/// action to run when it is picked.
#[derive(Clone, Default)]
pub struct ConvoTrigger {
    pub pattern: Option<AnswerPattern>,
    pub handler: Option<ConvoHandler>,
    pub action: Option<String>,
    pub default: bool,
}

fn convo_handler<F, Fut>(handler: F) -> ConvoHandler
where
    F: Fn(String, DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |answer, convo, bot| Box::pin(handler(answer, convo, bot)))
}

impl ConvoTrigger {
    /// Runs `handler` when the answer matches `pattern`.
    pub fn new<F, Fut>(pattern: impl Into<AnswerPattern>, handler: F) -> Self
    where
        F: Fn(String, DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            pattern: Some(pattern.into()),
            handler: Some(convo_handler(handler)),
            ..Default::default()
        }
    }

    /// Runs `handler` when the answer passes the async `test`.
    pub fn predicate<P, PFut, F, Fut>(test: P, handler: F) -> Self
    where
        P: Fn(String) -> PFut + Send + Sync + 'static,
        PFut: Future<Output = bool> + Send + 'static,
        F: Fn(String, DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            pattern: Some(AnswerPattern::Predicate(Arc::new(move |answer| {
                Box::pin(test(answer))
            }))),
            handler: Some(convo_handler(handler)),
            ..Default::default()
        }
    }

    /// Runs a script action (`next`, `stop`, a thread name...) when the answer matches.
    pub fn action(pattern: impl Into<AnswerPattern>, action: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            action: Some(action.into()),
            ..Default::default()
        }
    }

    /// Used when no other option matched.
    pub fn fallback<F, Fut>(handler: F) -> Self
    where
        F: Fn(String, DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            handler: Some(convo_handler(handler)),
            default: true,
            ..Default::default()
        }
    }

    /// Default option running an action.
    pub fn fallback_action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            default: true,
            ..Default::default()
        }
    }
}

impl fmt::Debug for ConvoTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvoTrigger")
            .field("pattern", &self.pattern)
            .field("has_handler", &self.handler.is_some())
            .field("action", &self.action)
            .field("default", &self.default)
            .finish()
    }
}

/// A single handler passed to `add_question` becomes the default option.
impl From<ConvoTrigger> for Vec<ConvoTrigger> {
    fn from(trigger: ConvoTrigger) -> Self {
        vec![trigger]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_pattern_is_case_insensitive_regex() {
        assert!(AnswerPattern::from("^yes").matches("YES please").await);
        assert!(!AnswerPattern::from("^yes").matches("oh yes").await);
        assert!(AnswerPattern::from("maybe").matches("well, Maybe").await);
    }

    #[tokio::test]
    async fn test_invalid_regex_is_matched_literally() {
        let pattern = AnswerPattern::from("(yes");
        assert!(pattern.matches("(YES)").await);
        assert!(!pattern.matches("yes").await);
    }

    #[tokio::test]
    async fn test_predicate_pattern() {
        let trigger = ConvoTrigger::predicate(
            |answer: String| async move { answer.len() > 3 },
            |_, _, _| async { Ok(()) },
        );
        let Some(pattern) = trigger.pattern else {
            panic!("predicate trigger has a pattern");
        };
        assert!(pattern.matches("long answer").await);
        assert!(!pattern.matches("no").await);
    }

    #[test]
    fn test_has_content() {
        assert!(MessageTemplate::text("hi").has_content());
        assert!(!MessageTemplate::action("next").has_content());
        assert!(!MessageTemplate::text("").has_content());
        assert!(MessageTemplate::default()
            .with_quick_replies(serde_json::json!([{ "title": "yes" }]))
            .has_content());
    }
}
