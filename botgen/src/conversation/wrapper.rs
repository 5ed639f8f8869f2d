//! [`DialogWrapper`]: the `convo` handle given to conversation handlers and hooks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

/// Cursor and vars of the running step.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConvoStep {
    pub index: usize,
    pub thread: String,
    pub thread_length: usize,
    pub values: Map<String, Value>,
}

/// Lets handlers move the conversation cursor and read or write vars. Changes apply once the
/// handler returns.
#[derive(Debug, Clone)]
pub struct DialogWrapper {
    step: Arc<Mutex<ConvoStep>>,
}

impl DialogWrapper {
    pub(crate) fn new(step: ConvoStep) -> Self {
        Self {
            step: Arc::new(Mutex::new(step)),
        }
    }

    fn step(&self) -> MutexGuard<'_, ConvoStep> {
        self.step.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn position(&self) -> (usize, String) {
        let step = self.step();
        (step.index, step.thread.clone())
    }

    /// Jumps to the first line of `thread`.
    pub fn goto_thread(&self, thread: impl Into<String>) {
        let mut step = self.step();
        step.index = 0;
        step.thread = thread.into();
    }

    /// Sends the previous line again.
    pub fn repeat(&self) {
        let mut step = self.step();
        step.index = step.index.saturating_sub(1);
    }

    /// Moves past the end of the thread, ending the dialog.
    pub fn stop(&self) {
        let mut step = self.step();
        step.index = step.thread_length + 1;
    }

    /// Sets a var, available to templates as `{{vars.<key>}}`.
    pub fn set_var(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.step().values.insert(key.into(), value.into());
    }

    pub fn var(&self, key: &str) -> Option<Value> {
        self.step().values.get(key).cloned()
    }

    /// Copy of all vars.
    pub fn vars(&self) -> Map<String, Value> {
        self.step().values.clone()
    }

    pub fn index(&self) -> usize {
        self.step().index
    }

    pub fn thread(&self) -> String {
        self.step().thread.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrapper() -> DialogWrapper {
        DialogWrapper::new(ConvoStep {
            index: 2,
            thread: "default".to_string(),
            thread_length: 4,
            values: Map::new(),
        })
    }

    #[test]
    fn test_cursor_moves() {
        let convo = wrapper();
        convo.repeat();
        assert_eq!(convo.position(), (1, "default".to_string()));

        convo.stop();
        assert_eq!(convo.index(), 5);

        convo.goto_thread("bad_answer");
        assert_eq!(convo.position(), (0, "bad_answer".to_string()));
    }

    #[test]
    fn test_vars_are_shared_between_clones() {
        let convo = wrapper();
        let handle = convo.clone();
        handle.set_var("name", "Ada");
        handle.set_var("age", 36);

        assert_eq!(convo.var("name"), Some(json!("Ada")));
        assert_eq!(convo.vars().len(), 2);
    }
}
