//! Integration tests for the dialog stack: begin, continue, child dialogs resuming their
//! parent, replace, cancel, and persisting the stack as JSON between turns.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use botgen_core::{
    Activity, BotAdapter, BotgenError, HandlerError, ResourceResponse, Result, TurnContext,
    TurnHandler, WebhookRequest, WebhookResponse,
};
use botgen_dialogs::{
    Dialog, DialogContext, DialogInstance, DialogReason, DialogSet, DialogState,
    DialogTurnResult, DialogTurnStatus,
};
use serde_json::{json, Value};

struct NullAdapter;

#[async_trait]
impl BotAdapter for NullAdapter {
    fn name(&self) -> &str {
        "null"
    }

    async fn send_activities(
        &self,
        _context: &TurnContext,
        activities: Vec<Activity>,
    ) -> Result<Vec<ResourceResponse>> {
        Ok(activities.iter().map(|_| ResourceResponse::default()).collect())
    }

    async fn process_activity(
        self: Arc<Self>,
        _request: WebhookRequest,
        _logic: Arc<dyn TurnHandler>,
    ) -> Result<WebhookResponse> {
        Ok(WebhookResponse::ok(None))
    }
}

fn turn(text: &str) -> Arc<TurnContext> {
    Arc::new(TurnContext::new(Arc::new(NullAdapter), Activity::message(text)))
}

/// Asks once, then ends with whatever the user typed.
struct AskDialog {
    ended: Arc<Mutex<Vec<(String, DialogReason)>>>,
}

#[async_trait]
impl Dialog for AskDialog {
    fn id(&self) -> &str {
        "ask"
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> Result<DialogTurnResult> {
        dc.context().send_activity("what is your name?").await?;
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> Result<DialogTurnResult> {
        let answer = dc.context().activity().text.clone().unwrap_or_default();
        if let Some(active) = dc.active_dialog_mut() {
            active.state = json!({ "answer": answer });
        }
        dc.end_dialog(Some(json!(answer))).await
    }

    async fn end_dialog(
        &self,
        _context: &Arc<TurnContext>,
        instance: &DialogInstance,
        reason: DialogReason,
    ) -> Result<()> {
        self.ended
            .lock()
            .unwrap()
            .push((instance.state.to_string(), reason));
        Ok(())
    }
}

/// Starts `ask` as a child and ends with the child's result wrapped.
struct ParentDialog;

#[async_trait]
impl Dialog for ParentDialog {
    fn id(&self) -> &str {
        "parent"
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> Result<DialogTurnResult> {
        dc.begin_dialog("ask", None).await
    }

    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        reason: DialogReason,
        result: Option<Value>,
    ) -> Result<DialogTurnResult> {
        assert_eq!(reason, DialogReason::EndCalled);
        dc.end_dialog(Some(json!({ "child": result }))).await
    }
}

fn dialog_set(ended: Arc<Mutex<Vec<(String, DialogReason)>>>) -> Arc<DialogSet> {
    let mut set = DialogSet::new();
    set.add(Arc::new(AskDialog { ended }));
    set.add(Arc::new(ParentDialog));
    Arc::new(set)
}

#[tokio::test]
async fn test_continue_without_active_dialog_is_empty() {
    let set = dialog_set(Arc::default());
    let mut dc = set.create_context(turn("hi"), DialogState::default());
    let result = dc.continue_dialog().await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Empty);
}

#[tokio::test]
async fn test_begin_then_continue_across_turns() {
    let ended = Arc::new(Mutex::new(Vec::new()));
    let set = dialog_set(ended.clone());

    let first = turn("start");
    let mut dc = set.create_context(first.clone(), DialogState::default());
    let result = dc.begin_dialog("ask", None).await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Waiting);
    assert!(first.responded());

    // persist and reload the stack as the controller does between turns
    let persisted = serde_json::to_value(dc.into_state()).unwrap();
    assert_eq!(persisted["dialog_stack"][0]["id"], "ask");
    let reloaded: DialogState = serde_json::from_value(persisted).unwrap();

    let mut dc = set.create_context(turn("Ada"), reloaded);
    let result = dc.continue_dialog().await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Complete);
    assert_eq!(result.result, Some(json!("Ada")));
    assert!(dc.active_dialog().is_none());

    let ended = ended.lock().unwrap();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].1, DialogReason::EndCalled);
    assert!(ended[0].0.contains("Ada"));
}

#[tokio::test]
async fn test_child_result_resumes_parent() {
    let set = dialog_set(Arc::default());

    let mut dc = set.create_context(turn("start"), DialogState::default());
    dc.begin_dialog("parent", None).await.unwrap();
    let ids: Vec<&str> = dc.stack().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["parent", "ask"]);

    let mut dc = set.create_context(turn("Grace"), dc.into_state());
    let result = dc.continue_dialog().await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Complete);
    assert_eq!(result.result, Some(json!({ "child": "Grace" })));
    assert!(dc.stack().is_empty());
}

#[tokio::test]
async fn test_replace_and_cancel_report_reasons() {
    let ended = Arc::new(Mutex::new(Vec::new()));
    let set = dialog_set(ended.clone());

    let mut dc = set.create_context(turn("start"), DialogState::default());
    dc.begin_dialog("ask", None).await.unwrap();
    dc.replace_dialog("ask", None).await.unwrap();
    assert_eq!(dc.stack().len(), 1);

    let result = dc.cancel_all_dialogs().await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Cancelled);
    assert!(dc.stack().is_empty());

    let reasons: Vec<DialogReason> = ended.lock().unwrap().iter().map(|e| e.1).collect();
    assert_eq!(
        reasons,
        vec![DialogReason::ReplaceCalled, DialogReason::CancelCalled]
    );

    // cancelling an empty stack is a no-op
    let result = dc.cancel_all_dialogs().await.unwrap();
    assert_eq!(result.status, DialogTurnStatus::Empty);
}

#[tokio::test]
async fn test_unknown_dialog_is_an_error() {
    let set = dialog_set(Arc::default());
    let mut dc = set.create_context(turn("start"), DialogState::default());
    let err = dc.begin_dialog("missing", None).await.unwrap_err();
    assert!(matches!(
        err,
        BotgenError::Handler(HandlerError::UnknownDialog(ref id)) if id == "missing"
    ));
    assert!(dc.stack().is_empty());
}
