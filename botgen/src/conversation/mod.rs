//! Scripted multi-turn dialogs.
//!
//! A [`Conversation`] is a set of named threads, each a list of [`MessageTemplate`] lines. Lines
//! are sent in order; a question line waits for the answer, stores it under its key and picks
//! one of its [`ConvoTrigger`] options. Actions jump between threads, start child dialogs or
//! end the conversation.
//!
//! ```ignore
//! let mut convo = Conversation::new("onboarding", &bot);
//! convo.say("Welcome!");
//! convo.ask("What is your name?", ConvoTrigger::fallback(|_, _, _| async { Ok(()) }), Some("name"));
//! convo.say("Nice to meet you, {{vars.name}}");
//! bot.add_dialog(convo);
//! ```

mod render;
mod template;
mod wrapper;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{BotMessage, BotgenError, HandlerError, Result, TurnContext};
use botgen_dialogs::{Dialog, DialogContext, DialogInstance, DialogReason, DialogTurnResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::bot::{Bot, WeakBot};
use crate::handler::BoxFuture;
use crate::worker::BotWorker;

pub use render::{render, render_text, render_value};
pub use template::{
    AnswerPattern, AnswerPredicate, Collect, ConvoHandler, ConvoTrigger, ExecuteScript,
    MessageTemplate, TextFn, TextTemplate,
};
pub use wrapper::DialogWrapper;

use wrapper::ConvoStep;

pub const DEFAULT_THREAD: &str = "default";

/// Runs when a thread starts.
pub type BeforeHook =
    Arc<dyn Fn(DialogWrapper, BotWorker) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Runs when the conversation ends, with its vars.
pub type AfterHook =
    Arc<dyn Fn(Map<String, Value>, BotWorker) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Runs when a collected var is set, with the new value.
pub type ChangeHook =
    Arc<dyn Fn(Value, DialogWrapper, BotWorker) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// What a conversation keeps on the dialog stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConvoState {
    #[serde(default)]
    options: Value,
    #[serde(default)]
    values: Map<String, Value>,
    #[serde(default)]
    thread: String,
    #[serde(default)]
    step_index: usize,
}

pub struct Conversation {
    id: String,
    controller: WeakBot,
    script: HashMap<String, Vec<MessageTemplate>>,
    before_hooks: HashMap<String, Vec<BeforeHook>>,
    after_hooks: Vec<AfterHook>,
    change_hooks: HashMap<String, Vec<ChangeHook>>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, controller: &Bot) -> Self {
        Self {
            id: id.into(),
            controller: controller.downgrade(),
            script: HashMap::new(),
            before_hooks: HashMap::new(),
            after_hooks: Vec::new(),
            change_hooks: HashMap::new(),
        }
    }

    /// Lines of `thread`, if it has any.
    pub fn thread(&self, thread: &str) -> Option<&[MessageTemplate]> {
        self.script.get(thread).map(Vec::as_slice)
    }

    // --- script builders ---

    /// Appends a line to `thread`. Lines without a question are sent one after another.
    pub fn add_message(&mut self, message: impl Into<MessageTemplate>, thread: &str) -> &mut Self {
        self.script
            .entry(thread.to_string())
            .or_default()
            .push(message.into());
        self
    }

    /// Appends a line to the default thread.
    pub fn say(&mut self, message: impl Into<MessageTemplate>) -> &mut Self {
        self.add_message(message, DEFAULT_THREAD)
    }

    /// Appends an action: a thread name, or `next`, `complete`, `stop`, `timeout`, `repeat`.
    pub fn add_action(&mut self, action: impl Into<String>, thread: &str) -> &mut Self {
        self.add_message(MessageTemplate::action(action), thread)
    }

    /// Appends a question. The answer is stored under `key` and matched against `handlers`.
    pub fn add_question(
        &mut self,
        message: impl Into<MessageTemplate>,
        handlers: impl Into<Vec<ConvoTrigger>>,
        key: Option<&str>,
        thread: &str,
    ) -> &mut Self {
        let mut message = message.into();
        let collect = message.collect.get_or_insert_with(Collect::default);
        if let Some(key) = key {
            collect.key = Some(key.to_string());
        }
        collect.options = handlers.into();

        self.add_message(message, thread);
        self.add_action("next", thread)
    }

    /// Appends a question to the default thread.
    pub fn ask(
        &mut self,
        message: impl Into<MessageTemplate>,
        handlers: impl Into<Vec<ConvoTrigger>>,
        key: Option<&str>,
    ) -> &mut Self {
        self.add_question(message, handlers, key, DEFAULT_THREAD)
    }

    /// Runs dialog `dialog_id` as a child and stores its result under `key` (default: the id).
    pub fn add_child_dialog(
        &mut self,
        dialog_id: &str,
        key: Option<&str>,
        thread: &str,
    ) -> &mut Self {
        let template = MessageTemplate {
            action: Some("beginDialog".to_string()),
            execute: Some(ExecuteScript {
                script: dialog_id.to_string(),
                thread: None,
            }),
            ..Default::default()
        };
        self.add_question(template, Vec::new(), Some(key.unwrap_or(dialog_id)), thread)
    }

    /// Hands the conversation over to dialog `dialog_id`. This dialog does not resume.
    pub fn add_goto_dialog(&mut self, dialog_id: &str, thread: &str) -> &mut Self {
        let template = MessageTemplate {
            action: Some("execute_script".to_string()),
            execute: Some(ExecuteScript {
                script: dialog_id.to_string(),
                thread: None,
            }),
            ..Default::default()
        };
        self.add_message(template, thread)
    }

    // --- hooks ---

    /// Runs `handler` each time `thread` starts. The handler may redirect with
    /// [`DialogWrapper::goto_thread`].
    pub fn before<F, Fut>(&mut self, thread: &str, handler: F) -> &mut Self
    where
        F: Fn(DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.before_hooks
            .entry(thread.to_string())
            .or_default()
            .push(Arc::new(move |convo, bot| Box::pin(handler(convo, bot))));
        self
    }

    /// Runs `handler` with the final vars once the conversation ends.
    pub fn after<F, Fut>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(Map<String, Value>, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.after_hooks
            .push(Arc::new(move |vars, bot| Box::pin(handler(vars, bot))));
        self
    }

    /// Runs `handler` when the answer collected under `key` is stored.
    pub fn on_change<F, Fut>(&mut self, key: &str, handler: F) -> &mut Self
    where
        F: Fn(Value, DialogWrapper, BotWorker) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.change_hooks
            .entry(key.to_string())
            .or_default()
            .push(Arc::new(move |value, convo, bot| {
                Box::pin(handler(value, convo, bot))
            }));
        self
    }

    // --- runtime ---

    fn controller(&self) -> Result<Bot> {
        self.controller.upgrade().ok_or_else(|| {
            BotgenError::Dialog(format!("Controller of dialog '{}' was dropped", self.id))
        })
    }

    async fn spawn(&self, context: &Arc<TurnContext>) -> Result<BotWorker> {
        self.controller()?.spawn(context).await
    }

    fn lines(&self, thread: &str) -> Result<&[MessageTemplate]> {
        self.thread(thread).ok_or_else(|| {
            BotgenError::Dialog(format!(
                "Thread '{}' not found, did you add any messages to it?",
                thread
            ))
        })
    }

    fn load_state(&self, dc: &DialogContext) -> Result<ConvoState> {
        let instance = dc
            .active_dialog()
            .filter(|instance| instance.id == self.id)
            .ok_or(HandlerError::NoActiveDialog)?;
        Ok(serde_json::from_value(instance.state.clone())?)
    }

    fn store_state(&self, dc: &mut DialogContext, state: &ConvoState) -> Result<()> {
        if let Some(instance) = dc
            .active_dialog_mut()
            .filter(|instance| instance.id == self.id)
        {
            instance.state = serde_json::to_value(state)?;
        }
        Ok(())
    }

    /// Writes the vars changed by handlers back to the dialog state.
    fn store_values(&self, dc: &mut DialogContext, step: &DialogWrapper) -> Result<()> {
        let Ok(mut state) = self.load_state(dc) else {
            return Ok(());
        };
        state.values = step.vars();
        self.store_state(dc, &state)
    }

    fn run_step<'a>(
        &'a self,
        dc: &'a mut DialogContext,
        index: usize,
        thread: String,
        result: Option<Value>,
    ) -> BoxFuture<'a, Result<DialogTurnResult>> {
        Box::pin(async move {
            let mut state = self.load_state(dc)?;
            state.step_index = index;
            state.thread = thread.clone();
            self.store_state(dc, &state)?;

            let step = DialogWrapper::new(ConvoStep {
                index,
                thread: thread.clone(),
                thread_length: self.lines(&thread)?.len(),
                values: state.values,
            });
            debug!(dialog_id = %self.id, thread = %thread, index, "Conversation step");

            if index == 0 {
                self.run_before(&thread, dc, &step).await?;
                let (new_index, new_thread) = step.position();
                if new_index != index || new_thread != thread {
                    return self.run_step(dc, new_index, new_thread, None).await;
                }
            }

            self.on_step(dc, step, result).await
        })
    }

    async fn on_step(
        &self,
        dc: &mut DialogContext,
        step: DialogWrapper,
        result: Option<Value>,
    ) -> Result<DialogTurnResult> {
        let (index, thread) = step.position();
        let lines = self.lines(&thread)?;

        // capture the answer to the previous line
        let previous = index.checked_sub(1).and_then(|i| lines.get(i));
        if let (Some(collect), Some(result)) = (previous.and_then(|line| line.collect.as_ref()), result) {
            // empty answers are matched against the options but never stored
            let answer = Some(result).filter(|value| match value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            });
            if let (Some(answer), Some(key)) = (&answer, &collect.key) {
                step.set_var(key.clone(), answer.clone());
                self.store_values(dc, &step)?;
                self.run_on_change(key, answer, dc, &step).await?;

                let (new_index, new_thread) = step.position();
                if new_index != index || new_thread != thread {
                    return self.run_step(dc, new_index, new_thread, None).await;
                }
            }

            if !collect.options.is_empty() {
                let text = match &answer {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                if let Some(option) = pick_option(&collect.options, &text).await {
                    if let Some(done) = self.run_option(option, &text, dc, &step).await? {
                        return Ok(done);
                    }
                }
            }
        }

        if dc.active_dialog().is_none() {
            return self.end(dc).await;
        }

        let Some(line) = lines.get(index) else {
            return self.end(dc).await;
        };

        if line.collect.is_some() && line.action.as_deref() != Some("beginDialog") {
            self.send_line(dc, line, &step).await?;
            return Ok(DialogTurnResult::waiting());
        }

        if line.has_content() {
            self.send_line(dc, line, &step).await?;
        } else if line.action.is_none() {
            error!(dialog_id = %self.id, thread = %thread, index, "Dialog contains invalid message");
        }

        if let Some(action) = &line.action {
            if let Some(done) = self
                .handle_action(action, line.execute.as_ref(), dc, &step)
                .await?
            {
                return Ok(done);
            }
        }

        self.run_step(dc, index + 1, thread, None).await
    }

    /// Runs the picked answer option. `None` means carry on with the current line.
    async fn run_option(
        &self,
        option: &ConvoTrigger,
        answer: &str,
        dc: &mut DialogContext,
        step: &DialogWrapper,
    ) -> Result<Option<DialogTurnResult>> {
        if let Some(handler) = &option.handler {
            let (index, thread) = step.position();
            let bot = self.spawn(dc.context()).await?;
            handler(answer.to_string(), step.clone(), bot).await?;
            self.store_values(dc, step)?;

            let (new_index, new_thread) = step.position();
            if new_index != index || new_thread != thread {
                return Ok(Some(self.run_step(dc, new_index, new_thread, None).await?));
            }
            return Ok(None);
        }

        match &option.action {
            Some(action) => self.handle_action(action, None, dc, step).await,
            None => Ok(None),
        }
    }

    /// Runs a script action. `None` means advance to the next line.
    async fn handle_action(
        &self,
        action: &str,
        execute: Option<&ExecuteScript>,
        dc: &mut DialogContext,
        step: &DialogWrapper,
    ) -> Result<Option<DialogTurnResult>> {
        let status = match action {
            "next" => return Ok(None),
            "complete" => Some("completed"),
            "stop" => Some("canceled"),
            "timeout" => Some("timeout"),
            _ => None,
        };
        if let Some(status) = status {
            step.set_var("_status", status);
            self.store_values(dc, step)?;
            return Ok(Some(self.end(dc).await?));
        }

        match action {
            "execute_script" | "beginDialog" => {
                let target = execute.ok_or_else(|| {
                    BotgenError::Dialog(format!("Action '{}' needs a script to run", action))
                })?;
                let options = Value::Object(child_options(target, step));
                info!(
                    dialog_id = %self.id,
                    action = %action,
                    script = %target.script,
                    "Handing over to dialog"
                );
                let result = if action == "beginDialog" {
                    dc.begin_dialog(&target.script, Some(options)).await?
                } else {
                    dc.replace_dialog(&target.script, Some(options)).await?
                };
                Ok(Some(result))
            }
            "repeat" => {
                let (index, thread) = step.position();
                let lines = self.lines(&thread)?;
                let mut target = index.saturating_sub(1);
                // the `next` line appended after a question belongs to the question
                let implicit_next = |line: &MessageTemplate| {
                    line.action.as_deref() == Some("next") && !line.has_content()
                };
                if target > 0 && lines.get(target).is_some_and(implicit_next) {
                    target -= 1;
                }
                Ok(Some(self.run_step(dc, target, thread, None).await?))
            }
            thread if self.script.contains_key(thread) => {
                debug!(dialog_id = %self.id, thread = %thread, "Goto thread");
                Ok(Some(self.run_step(dc, 0, thread.to_string(), None).await?))
            }
            other => {
                warn!(dialog_id = %self.id, action = %other, "Unknown conversation action");
                Ok(None)
            }
        }
    }

    /// Ends the conversation with its vars as the result.
    async fn end(&self, dc: &mut DialogContext) -> Result<DialogTurnResult> {
        let Ok(state) = self.load_state(dc) else {
            return Ok(DialogTurnResult::complete(None));
        };
        info!(dialog_id = %self.id, "Conversation ended");
        dc.end_dialog(Some(Value::Object(state.values))).await
    }

    async fn send_line(
        &self,
        dc: &mut DialogContext,
        line: &MessageTemplate,
        step: &DialogWrapper,
    ) -> Result<()> {
        let message = make_outgoing(line, &step.vars());
        let bot = self.spawn(dc.context()).await?;
        bot.say(message).await?;
        Ok(())
    }

    async fn run_before(
        &self,
        thread: &str,
        dc: &mut DialogContext,
        step: &DialogWrapper,
    ) -> Result<()> {
        let Some(hooks) = self.before_hooks.get(thread) else {
            return Ok(());
        };
        let bot = self.spawn(dc.context()).await?;
        for hook in hooks {
            hook(step.clone(), bot.clone()).await?;
        }
        self.store_values(dc, step)
    }

    async fn run_on_change(
        &self,
        key: &str,
        value: &Value,
        dc: &mut DialogContext,
        step: &DialogWrapper,
    ) -> Result<()> {
        let Some(hooks) = self.change_hooks.get(key) else {
            return Ok(());
        };
        let bot = self.spawn(dc.context()).await?;
        for hook in hooks {
            hook(value.clone(), step.clone(), bot.clone()).await?;
        }
        self.store_values(dc, step)
    }

    async fn run_after(&self, context: &Arc<TurnContext>, values: Map<String, Value>) -> Result<()> {
        if self.after_hooks.is_empty() {
            return Ok(());
        }
        let bot = self.spawn(context).await?;
        for hook in &self.after_hooks {
            hook(values.clone(), bot.clone()).await?;
        }
        Ok(())
    }
}

/// First non-default option matching the answer, else the default option.
async fn pick_option<'a>(options: &'a [ConvoTrigger], answer: &str) -> Option<&'a ConvoTrigger> {
    for option in options.iter().filter(|option| !option.default) {
        if let Some(pattern) = &option.pattern {
            if pattern.matches(answer).await {
                return Some(option);
            }
        }
    }
    options.iter().find(|option| option.default)
}

/// Options for a child dialog: the current vars, with the target thread.
fn child_options(target: &ExecuteScript, step: &DialogWrapper) -> Map<String, Value> {
    let mut options = step.vars();
    match &target.thread {
        Some(thread) => {
            options.insert("thread".to_string(), Value::String(thread.clone()));
        }
        None => {
            options.remove("thread");
        }
    }
    options
}

/// Renders a line into an outgoing message. Extra fields end up in the activity's channel data.
fn make_outgoing(line: &MessageTemplate, vars: &Map<String, Value>) -> BotMessage {
    let mut message = BotMessage {
        text: line.text.as_ref().and_then(|text| render_text(text, vars)),
        ..Default::default()
    };

    if let Some(channel_data) = &line.channel_data {
        for (key, value) in channel_data {
            message
                .fields
                .insert(key.clone(), render_value(value, vars));
        }
    }
    let extras = [
        ("quick_replies", &line.quick_replies),
        ("attachments", &line.attachments),
        ("blocks", &line.blocks),
        ("attachment", &line.attachment),
    ];
    for (key, value) in extras {
        if let Some(value) = value {
            message
                .fields
                .insert(key.to_string(), render_value(value, vars));
        }
    }
    if let Some(layout) = &line.attachment_layout {
        message
            .fields
            .insert("attachment_layout".to_string(), Value::String(layout.clone()));
    }
    message
}

#[async_trait]
impl Dialog for Conversation {
    fn id(&self) -> &str {
        &self.id
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> Result<DialogTurnResult> {
        let options = options.unwrap_or_else(|| Value::Object(Map::new()));
        let values = match &options {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let thread = options
            .get("thread")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_THREAD)
            .to_string();

        self.store_state(
            dc,
            &ConvoState {
                options,
                values,
                thread: thread.clone(),
                step_index: 0,
            },
        )?;
        self.run_step(dc, 0, thread, None).await
    }

    /// Only messages answer a question; other activities keep the conversation waiting.
    async fn continue_dialog(&self, dc: &mut DialogContext) -> Result<DialogTurnResult> {
        let context = Arc::clone(dc.context());
        if !context.activity().is_message() {
            return Ok(DialogTurnResult::waiting());
        }
        let text = context
            .bot_message()
            .and_then(|message| message.text)
            .or_else(|| context.activity().text.clone())
            .unwrap_or_default();

        let state = self.load_state(dc)?;
        self.run_step(dc, state.step_index + 1, state.thread, Some(Value::String(text)))
            .await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> Result<DialogTurnResult> {
        let state = self.load_state(dc)?;
        self.run_step(dc, state.step_index + 1, state.thread, result)
            .await
    }

    async fn end_dialog(
        &self,
        context: &Arc<TurnContext>,
        instance: &DialogInstance,
        reason: DialogReason,
    ) -> Result<()> {
        if reason != DialogReason::EndCalled {
            return Ok(());
        }
        let values = serde_json::from_value::<ConvoState>(instance.state.clone())
            .map(|state| state.values)
            .unwrap_or_default();
        self.run_after(context, values).await
    }
}
