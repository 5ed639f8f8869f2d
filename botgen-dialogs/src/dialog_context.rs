use std::sync::Arc;

use botgen_core::{HandlerError, Result, TurnContext};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::dialog::{Dialog, DialogInstance, DialogReason, DialogState, DialogTurnResult};
use crate::dialog_set::DialogSet;

/// Drives the dialog stack of one conversation for the current turn.
pub struct DialogContext {
    dialogs: Arc<DialogSet>,
    context: Arc<TurnContext>,
    stack: Vec<DialogInstance>,
}

impl DialogContext {
    pub fn new(dialogs: Arc<DialogSet>, context: Arc<TurnContext>, state: DialogState) -> Self {
        Self {
            dialogs,
            context,
            stack: state.dialog_stack,
        }
    }

    pub fn context(&self) -> &Arc<TurnContext> {
        &self.context
    }

    pub fn dialogs(&self) -> &Arc<DialogSet> {
        &self.dialogs
    }

    pub fn active_dialog(&self) -> Option<&DialogInstance> {
        self.stack.last()
    }

    pub fn active_dialog_mut(&mut self) -> Option<&mut DialogInstance> {
        self.stack.last_mut()
    }

    pub fn stack(&self) -> &[DialogInstance] {
        &self.stack
    }

    /// Snapshot of the stack for persisting.
    pub fn state(&self) -> DialogState {
        DialogState {
            dialog_stack: self.stack.clone(),
        }
    }

    pub fn into_state(self) -> DialogState {
        DialogState {
            dialog_stack: self.stack,
        }
    }

    fn find_dialog(&self, dialog_id: &str) -> Result<Arc<dyn Dialog>> {
        self.dialogs
            .find(dialog_id)
            .ok_or_else(|| HandlerError::UnknownDialog(dialog_id.to_string()).into())
    }

    /// Pushes a new instance of `dialog_id` and begins it.
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> Result<DialogTurnResult> {
        let dialog = self.find_dialog(dialog_id)?;
        self.stack.push(DialogInstance {
            id: dialog_id.to_string(),
            state: Value::Object(Map::new()),
        });
        info!(
            dialog_id = %dialog_id,
            depth = self.stack.len(),
            "Dialog begin"
        );
        dialog.begin_dialog(self, options).await
    }

    /// Passes the current message to the active dialog, if any.
    pub async fn continue_dialog(&mut self) -> Result<DialogTurnResult> {
        let Some(active_id) = self.active_dialog().map(|instance| instance.id.clone()) else {
            return Ok(DialogTurnResult::empty());
        };
        let dialog = self.find_dialog(&active_id)?;
        debug!(dialog_id = %active_id, "Dialog continue");
        dialog.continue_dialog(self).await
    }

    /// Pops the active dialog and resumes its parent with `result`. With no parent left the
    /// turn completes with `result`.
    pub async fn end_dialog(&mut self, result: Option<Value>) -> Result<DialogTurnResult> {
        self.end_active_dialog(DialogReason::EndCalled).await?;

        let Some(parent_id) = self.active_dialog().map(|instance| instance.id.clone()) else {
            return Ok(DialogTurnResult::complete(result));
        };
        let parent = self.find_dialog(&parent_id)?;
        debug!(dialog_id = %parent_id, "Dialog resume");
        parent
            .resume_dialog(self, DialogReason::EndCalled, result)
            .await
    }

    /// Ends the active dialog and begins `dialog_id` in its place.
    pub async fn replace_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> Result<DialogTurnResult> {
        self.end_active_dialog(DialogReason::ReplaceCalled).await?;
        self.begin_dialog(dialog_id, options).await
    }

    /// Ends every dialog on the stack, innermost first.
    pub async fn cancel_all_dialogs(&mut self) -> Result<DialogTurnResult> {
        if self.stack.is_empty() {
            return Ok(DialogTurnResult::empty());
        }
        while !self.stack.is_empty() {
            self.end_active_dialog(DialogReason::CancelCalled).await?;
        }
        info!("Dialog stack cancelled");
        Ok(DialogTurnResult::cancelled())
    }

    async fn end_active_dialog(&mut self, reason: DialogReason) -> Result<()> {
        if let Some(instance) = self.stack.pop() {
            debug!(dialog_id = %instance.id, ?reason, "Dialog end");
            if let Some(dialog) = self.dialogs.find(&instance.id) {
                dialog.end_dialog(&self.context, &instance, reason).await?;
            }
        }
        Ok(())
    }
}
