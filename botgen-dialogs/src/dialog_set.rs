use std::collections::HashMap;
use std::sync::Arc;

use botgen_core::TurnContext;
use tracing::warn;

use crate::dialog::{Dialog, DialogState};
use crate::dialog_context::DialogContext;

/// Registry of dialogs by id.
#[derive(Clone, Default)]
pub struct DialogSet {
    dialogs: HashMap<String, Arc<dyn Dialog>>,
}

impl DialogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dialog. A dialog with the same id is replaced.
    pub fn add(&mut self, dialog: Arc<dyn Dialog>) {
        let id = dialog.id().to_string();
        if self.dialogs.insert(id.clone(), dialog).is_some() {
            warn!(dialog_id = %id, "Dialog replaced an existing dialog with the same id");
        }
    }

    pub fn find(&self, dialog_id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs.get(dialog_id).cloned()
    }

    pub fn contains(&self, dialog_id: &str) -> bool {
        self.dialogs.contains_key(dialog_id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Creates the dialog context for one turn from the conversation's persisted stack.
    pub fn create_context(
        self: &Arc<Self>,
        context: Arc<TurnContext>,
        state: DialogState,
    ) -> DialogContext {
        DialogContext::new(Arc::clone(self), context, state)
    }
}
