//! # botgen-dialogs
//!
//! Multi-turn dialog runtime. Dialogs are registered in a [`DialogSet`]; a [`DialogContext`]
//! drives the dialog stack of one conversation for one turn. The stack is plain JSON
//! ([`DialogState`]) so the controller can persist it in conversation state between turns.

mod dialog;
mod dialog_context;
mod dialog_set;

pub use dialog::{
    Dialog, DialogInstance, DialogReason, DialogState, DialogTurnResult, DialogTurnStatus,
};
pub use dialog_context::DialogContext;
pub use dialog_set::DialogSet;
