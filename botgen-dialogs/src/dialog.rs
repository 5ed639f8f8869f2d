//! Dialog trait and the serializable dialog stack.

use std::sync::Arc;

use async_trait::async_trait;
use botgen_core::{Result, TurnContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialog_context::DialogContext;

/// One entry of the dialog stack: which dialog, and its private state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    pub id: String,
    #[serde(default)]
    pub state: Value,
}

/// The persisted dialog stack of a conversation. The last entry is the active dialog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    #[serde(default)]
    pub dialog_stack: Vec<DialogInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogTurnStatus {
    /// No dialog was active.
    Empty,
    /// The active dialog is waiting for the next message.
    Waiting,
    /// The dialog stack finished this turn.
    Complete,
    /// The dialog stack was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn empty() -> Self {
        Self {
            status: DialogTurnStatus::Empty,
            result: None,
        }
    }

    /// End of turn: the active dialog waits for more input.
    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: DialogTurnStatus::Cancelled,
            result: None,
        }
    }
}

/// Why a dialog is being started, resumed or ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogReason {
    BeginCalled,
    ContinueCalled,
    EndCalled,
    ReplaceCalled,
    CancelCalled,
    NextCalled,
}

/// A multi-turn conversation unit living on the dialog stack.
#[async_trait]
pub trait Dialog: Send + Sync {
    fn id(&self) -> &str;

    /// Called when the dialog is pushed on the stack. Its instance is already the active dialog.
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> Result<DialogTurnResult>;

    /// Called with each new message while this dialog is active. Default: end the dialog.
    async fn continue_dialog(&self, dc: &mut DialogContext) -> Result<DialogTurnResult> {
        dc.end_dialog(None).await
    }

    /// Called when a child dialog ended and this dialog is active again. Default: end with the
    /// child's result.
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> Result<DialogTurnResult> {
        dc.end_dialog(result).await
    }

    /// Called after the instance was popped from the stack.
    async fn end_dialog(
        &self,
        _context: &Arc<TurnContext>,
        _instance: &DialogInstance,
        _reason: DialogReason,
    ) -> Result<()> {
        Ok(())
    }
}
