//! Plugins bundle middleware with an init function run against the controller.

use std::sync::Arc;

use botgen_chain::Middleware;
use botgen_core::Result;

use crate::bot::Bot;

pub type PluginInit = Arc<dyn Fn(&Bot) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct BotPlugin {
    pub name: String,
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub init: Option<PluginInit>,
}

impl BotPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            middlewares: Vec::new(),
            init: None,
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&Bot) -> Result<()> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }
}
