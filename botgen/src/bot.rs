//! The bot controller: owns the adapter, middleware, triggers, events, dialogs and
//! conversation state, and runs the turn logic for every incoming activity.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use botgen_chain::{Middleware, MiddlewareChain, TurnOutcome};
use botgen_core::{
    activity_types, BotAdapter, BotMessage, BotgenError, DialogRequest, HandlerError, Result,
    TurnContext, TurnHandler,
};
use botgen_dialogs::{Dialog, DialogContext, DialogSet, DialogState, DialogTurnStatus};
use botgen_storage::{ConversationState, MemoryStorage, StatePropertyAccessor, Storage};
use tracing::{debug, info, instrument, warn};

use crate::handler::{event_handler, trigger_handler, BootHandler, EventHandler};
use crate::plugin::BotPlugin;
use crate::server::parse_size;
use crate::trigger::{BotTrigger, Pattern};
use crate::worker::BotWorker;

/// Controller options. `Default` gives the standard webhook setup on port 3000.
#[derive(Clone)]
pub struct BotOptions {
    pub webhook_uri: String,
    pub dialog_state_property: String,
    pub adapter: Option<Arc<dyn BotAdapter>>,
    /// Defaults to [`MemoryStorage`].
    pub storage: Option<Arc<dyn Storage>>,
    pub disable_webserver: bool,
    pub disable_console: bool,
    pub json_limit: String,
    pub url_encoded_limit: String,
    pub port: u16,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            webhook_uri: "/api/messages".to_string(),
            dialog_state_property: "dialogState".to_string(),
            adapter: None,
            storage: None,
            disable_webserver: false,
            disable_console: false,
            json_limit: "100kb".to_string(),
            url_encoded_limit: "100kb".to_string(),
            port: 3000,
        }
    }
}

impl BotOptions {
    pub fn with_adapter(mut self, adapter: Arc<dyn BotAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }
}

#[derive(Default)]
struct BootState {
    dependencies: HashMap<String, bool>,
    booted: bool,
    handlers: Vec<BootHandler>,
}

struct BotInner {
    webhook_uri: String,
    port: u16,
    disable_webserver: bool,
    disable_console: bool,
    json_limit: usize,
    url_encoded_limit: usize,
    adapter: Option<Arc<dyn BotAdapter>>,
    conversation_state: ConversationState,
    dialog_state: StatePropertyAccessor,
    dialogs: RwLock<DialogSet>,
    middleware: RwLock<MiddlewareChain>,
    triggers: RwLock<HashMap<String, Vec<BotTrigger>>>,
    interrupts: RwLock<HashMap<String, Vec<BotTrigger>>>,
    events: RwLock<HashMap<String, Vec<EventHandler>>>,
    boot: Mutex<BootState>,
    plugins: RwLock<Vec<String>>,
}

/// Cheap-to-clone handle to the controller.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

/// Non-owning handle, held by dialogs registered on the controller.
#[derive(Clone)]
pub struct WeakBot {
    inner: Weak<BotInner>,
}

impl WeakBot {
    pub fn upgrade(&self) -> Option<Bot> {
        self.inner.upgrade().map(|inner| Bot { inner })
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Bot {
    /// Builds the controller and runs its boot sequence (`booted`, plus `webadapter` unless the
    /// webserver is disabled). Fails on malformed body limits or webhook path.
    pub fn new(options: BotOptions) -> Result<Self> {
        if !options.webhook_uri.starts_with('/') {
            return Err(BotgenError::Config(format!(
                "webhook_uri must start with '/': {}",
                options.webhook_uri
            )));
        }
        let json_limit = parse_size(&options.json_limit)?;
        let url_encoded_limit = parse_size(&options.url_encoded_limit)?;
        let storage = options
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let conversation_state = ConversationState::new(storage);
        let dialog_state = conversation_state.create_property(&options.dialog_state_property);

        let bot = Self {
            inner: Arc::new(BotInner {
                webhook_uri: options.webhook_uri,
                port: options.port,
                disable_webserver: options.disable_webserver,
                disable_console: options.disable_console,
                json_limit,
                url_encoded_limit,
                adapter: options.adapter,
                conversation_state,
                dialog_state,
                dialogs: RwLock::new(DialogSet::new()),
                middleware: RwLock::new(MiddlewareChain::new()),
                triggers: RwLock::new(HashMap::new()),
                interrupts: RwLock::new(HashMap::new()),
                events: RwLock::new(HashMap::new()),
                boot: Mutex::new(BootState::default()),
                plugins: RwLock::new(Vec::new()),
            }),
        };

        bot.add_dep("booted");
        if !bot.inner.disable_webserver {
            bot.configure_webhook();
        }
        bot.complete_dep("booted");
        Ok(bot)
    }

    pub fn downgrade(&self) -> WeakBot {
        WeakBot {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn webhook_uri(&self) -> &str {
        &self.inner.webhook_uri
    }

    pub fn dialog_state_property(&self) -> &str {
        self.inner.dialog_state.name()
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn adapter(&self) -> Option<&Arc<dyn BotAdapter>> {
        self.inner.adapter.as_ref()
    }

    pub fn conversation_state(&self) -> &ConversationState {
        &self.inner.conversation_state
    }

    pub fn disable_webserver(&self) -> bool {
        self.inner.disable_webserver
    }

    pub fn disable_console(&self) -> bool {
        self.inner.disable_console
    }

    pub fn json_limit(&self) -> usize {
        self.inner.json_limit
    }

    pub fn url_encoded_limit(&self) -> usize {
        self.inner.url_encoded_limit
    }

    fn configure_webhook(&self) {
        self.add_dep("webadapter");
        info!(webhook_uri = %self.inner.webhook_uri, "Webhook endpoint configured");
        self.complete_dep("webadapter");
    }

    // --- boot dependencies ---

    /// Registers a dependency that must be completed with [`Bot::complete_dep`] before boot.
    pub fn add_dep(&self, name: &str) {
        debug!(dependency = %name, "Waiting for dependency");
        lock(&self.inner.boot)
            .dependencies
            .insert(name.to_string(), false);
    }

    /// Marks a dependency complete. Returns true once every dependency is complete; boot
    /// handlers run the first time that happens.
    pub fn complete_dep(&self, name: &str) -> bool {
        debug!(dependency = %name, "Dependency ready");
        let handlers = {
            let mut boot = lock(&self.inner.boot);
            boot.dependencies.insert(name.to_string(), true);
            if !boot.dependencies.values().all(|done| *done) {
                return false;
            }
            if boot.booted {
                return true;
            }
            boot.booted = true;
            std::mem::take(&mut boot.handlers)
        };
        info!("Bot booted");
        for handler in handlers {
            handler(self);
        }
        true
    }

    /// Runs `handler` now if booted, otherwise once boot completes.
    pub fn ready<F>(&self, handler: F)
    where
        F: FnOnce(&Bot) + Send + 'static,
    {
        {
            let mut boot = lock(&self.inner.boot);
            if !boot.booted {
                boot.handlers.push(Box::new(handler));
                return;
            }
        }
        handler(self);
    }

    pub fn booted(&self) -> bool {
        lock(&self.inner.boot).booted
    }

    // --- middleware, dialogs, plugins ---

    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        write(&self.inner.middleware).push(middleware);
    }

    pub(crate) fn middleware(&self) -> MiddlewareChain {
        read(&self.inner.middleware).clone()
    }

    /// Registers a dialog so workers can begin it by id.
    pub fn add_dialog<D>(&self, dialog: D)
    where
        D: Dialog + 'static,
    {
        info!(dialog_id = %dialog.id(), "Dialog registered");
        write(&self.inner.dialogs).add(Arc::new(dialog));
    }

    pub fn has_dialog(&self, dialog_id: &str) -> bool {
        read(&self.inner.dialogs).contains(dialog_id)
    }

    /// Enables a plugin once per name: adds its middleware and runs its init. Failures are
    /// logged and do not abort.
    pub fn use_plugin(&self, plugin: BotPlugin) {
        {
            let mut plugins = write(&self.inner.plugins);
            if plugins.iter().any(|name| name == &plugin.name) {
                debug!(plugin = %plugin.name, "Plugin already enabled");
                return;
            }
            plugins.push(plugin.name.clone());
        }

        for middleware in plugin.middlewares {
            self.add_middleware(middleware);
        }
        if let Some(init) = plugin.init {
            if let Err(e) = init(self) {
                warn!(plugin = %plugin.name, error = %e, "Plugin init failed");
                return;
            }
        }
        debug!(plugin = %plugin.name, "Plugin enabled");
    }

    pub fn plugins(&self) -> Vec<String> {
        read(&self.inner.plugins).clone()
    }

    // --- triggers and events ---

    /// Runs `handler` for `event` activities matching `pattern`. The first matching trigger
    /// handles the message.
    pub fn hears<F, Fut>(&self, pattern: impl Into<Pattern>, event: &str, handler: F)
    where
        F: Fn(BotWorker, BotMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let pattern = pattern.into();
        debug!(?pattern, event = %event, "Trigger registered");
        write(&self.inner.triggers)
            .entry(event.to_string())
            .or_default()
            .push(BotTrigger {
                pattern,
                handler: trigger_handler(handler),
            });
    }

    /// Like [`Bot::hears`], but tested before an active dialog sees the message.
    pub fn interrupts<F, Fut>(&self, pattern: impl Into<Pattern>, event: &str, handler: F)
    where
        F: Fn(BotWorker, BotMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let pattern = pattern.into();
        debug!(?pattern, event = %event, "Interrupt registered");
        write(&self.inner.interrupts)
            .entry(event.to_string())
            .or_default()
            .push(BotTrigger {
                pattern,
                handler: trigger_handler(handler),
            });
    }

    /// Binds a handler to an event (usually an activity type).
    pub fn on<F, Fut>(&self, event: &str, handler: F)
    where
        F: Fn(BotWorker, BotMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        debug!(event = %event, "Event handler registered");
        write(&self.inner.events)
            .entry(event.to_string())
            .or_default()
            .push(event_handler(handler));
    }

    /// Runs the handlers bound to `event` in order until one returns true. Returns whether
    /// any handler was bound.
    pub async fn trigger(&self, event: &str, bot: &BotWorker, message: &BotMessage) -> Result<bool> {
        let handlers = read(&self.inner.events)
            .get(event)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            return Ok(false);
        }
        for handler in handlers {
            if handler(bot.clone(), message.clone()).await? {
                debug!(event = %event, "Event handled, stopping");
                break;
            }
        }
        Ok(true)
    }

    async fn listen_for(
        &self,
        registry: &RwLock<HashMap<String, Vec<BotTrigger>>>,
        bot: &BotWorker,
        message: &BotMessage,
    ) -> Result<bool> {
        let triggers = read(registry)
            .get(&message.message_type)
            .cloned()
            .unwrap_or_default();
        for trigger in triggers {
            if trigger.pattern.matches(message).await {
                debug!(pattern = ?trigger.pattern, "Trigger matched");
                (trigger.handler)(bot.clone(), message.clone()).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    // --- turn processing ---

    /// Creates a worker bound to the turn and runs `spawn` middleware.
    pub async fn spawn(&self, context: &Arc<TurnContext>) -> Result<BotWorker> {
        let worker = BotWorker::new(self.clone(), Arc::clone(context));
        self.middleware().run_spawn(context).await?;
        Ok(worker)
    }

    /// Turn logic: middleware, interrupts, active dialog, triggers, events, then persist
    /// dialog state.
    #[instrument(skip(self, context), fields(channel_id = %context.activity().channel_id))]
    pub async fn handle_turn(&self, context: Arc<TurnContext>) -> Result<()> {
        let activity = context.activity();
        if activity.conversation_id().is_none() {
            return Err(HandlerError::MissingConversation.into());
        }

        let mut message = BotMessage::from_activity(activity);
        let middleware = self.middleware();
        let should_continue = middleware.run_incoming(&context, &mut message).await?;
        context.set_bot_message(message.clone());
        if !should_continue {
            middleware
                .run_after(&context, &message, TurnOutcome::Stopped)
                .await?;
            return Ok(());
        }

        let mut bag = self.inner.conversation_state.load(activity).await?;
        let dialog_state: DialogState = self.inner.dialog_state.get_or_default(&bag)?;
        let dialogs = Arc::new(read(&self.inner.dialogs).clone());
        let mut dc = dialogs.create_context(Arc::clone(&context), dialog_state);

        let bot = self.spawn(&context).await?;
        let outcome = self.process_turn(&mut dc, &bot, &message).await?;
        info!(
            user = ?message.user,
            outcome = outcome.as_str(),
            dialog_depth = dc.stack().len(),
            "Turn handled"
        );

        self.inner.dialog_state.set(&mut bag, &dc.into_state())?;
        self.inner.conversation_state.save(activity, bag).await?;

        middleware.run_after(&context, &message, outcome).await
    }

    async fn process_turn(
        &self,
        dc: &mut DialogContext,
        bot: &BotWorker,
        message: &BotMessage,
    ) -> Result<TurnOutcome> {
        if self.listen_for(&self.inner.interrupts, bot, message).await? {
            self.apply_dialog_requests(dc).await?;
            return Ok(TurnOutcome::Interrupted);
        }

        if message.message_type == activity_types::MESSAGE && dc.active_dialog().is_some() {
            let result = dc.continue_dialog().await?;
            self.apply_dialog_requests(dc).await?;
            if result.status != DialogTurnStatus::Empty {
                return Ok(TurnOutcome::Dialog);
            }
        }

        if self.listen_for(&self.inner.triggers, bot, message).await? {
            self.apply_dialog_requests(dc).await?;
            return Ok(TurnOutcome::Trigger);
        }

        let handled = self.trigger(&message.message_type, bot, message).await?;
        self.apply_dialog_requests(dc).await?;
        Ok(if handled {
            TurnOutcome::Event
        } else {
            TurnOutcome::Unhandled
        })
    }

    /// Applies dialog operations queued by workers, including ones queued while applying.
    async fn apply_dialog_requests(&self, dc: &mut DialogContext) -> Result<()> {
        loop {
            let requests = dc.context().take_dialog_requests();
            if requests.is_empty() {
                return Ok(());
            }
            for request in requests {
                match request {
                    DialogRequest::Begin { dialog_id, options } => {
                        dc.begin_dialog(&dialog_id, options).await?;
                    }
                    DialogRequest::CancelAll => {
                        dc.cancel_all_dialogs().await?;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl TurnHandler for Bot {
    async fn on_turn(&self, context: Arc<TurnContext>) -> Result<()> {
        self.handle_turn(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bot() -> Bot {
        Bot::new(BotOptions {
            disable_webserver: true,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let bot = Bot::new(BotOptions::default()).unwrap();
        assert_eq!(bot.webhook_uri(), "/api/messages");
        assert_eq!(bot.dialog_state_property(), "dialogState");
        assert_eq!(bot.port(), 3000);
        assert_eq!(bot.json_limit(), 100 * 1024);
        assert!(bot.adapter().is_none());
        assert!(bot.booted());
    }

    #[test]
    fn test_invalid_limit_fails_construction() {
        let result = Bot::new(BotOptions {
            json_limit: "lots".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(BotgenError::Config(_))));
    }

    #[test]
    fn test_boot_dependencies() {
        let bot = bot();
        let calls = Arc::new(AtomicUsize::new(0));

        // construction completed boot, so ready handlers run immediately
        let c = calls.clone();
        bot.ready(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bot.add_dep("database");
        bot.add_dep("cache");
        assert!(!bot.complete_dep("database"));
        assert!(bot.complete_dep("cache"));
        assert!(bot.booted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_use_plugin_registers_once_and_survives_init_failure() {
        let bot = bot();
        let inits = Arc::new(AtomicUsize::new(0));
        let counter = inits.clone();
        let plugin = BotPlugin::new("greeter").with_init(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bot.use_plugin(plugin.clone());
        bot.use_plugin(plugin);
        assert_eq!(inits.load(Ordering::SeqCst), 1);

        bot.use_plugin(
            BotPlugin::new("broken")
                .with_init(|_| Err(BotgenError::Unknown("boom".to_string()))),
        );
        assert_eq!(bot.plugins(), vec!["greeter", "broken"]);
    }

    #[test]
    fn test_weak_bot_upgrade() {
        let bot = bot();
        let weak = bot.downgrade();
        assert!(weak.upgrade().is_some());
        drop(bot);
        assert!(weak.upgrade().is_none());
    }
}
