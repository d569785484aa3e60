//! A handler set that reduces every callback to one summary line.

use std::sync::Arc;

use beacon_events::{
    AppServerHandlers, ErrorEvent, ItemEvent, ModelReroutedEvent, TextDelta, ThreadEvent,
    TokenUsageEvent, TurnEvent, UnsupportedMethodEvent, WorkspaceEvent,
};
use beacon_protocol::{ApprovalRequest, UserInputRequest};

/// Receives summary lines.
pub type LineSink = Arc<dyn Fn(String) + Send + Sync>;

/// Writes `<callback> key=value ...` for every handler invocation.
#[derive(Clone)]
pub struct SummaryHandlers {
    sink: LineSink,
}

impl SummaryHandlers {
    /// Summaries go to `sink`.
    pub fn new(sink: LineSink) -> Self {
        Self { sink }
    }

    /// Summaries go to stdout.
    pub fn stdout() -> Self {
        Self::new(Arc::new(|line| println!("{line}")))
    }

    fn emit(&self, line: String) {
        (self.sink)(line);
    }

    fn workspace(&self, name: &str, e: &WorkspaceEvent) {
        self.emit(format!("{name} ws={}", e.workspace_id));
    }

    fn thread(&self, name: &str, e: &ThreadEvent) {
        self.emit(format!("{name} ws={} thread={}", e.workspace_id, e.thread_id));
    }

    fn turn(&self, name: &str, e: &TurnEvent) {
        self.emit(format!(
            "{name} ws={} thread={} turn={}",
            e.workspace_id,
            e.thread_id,
            e.turn_id.as_deref().unwrap_or("-")
        ));
    }

    fn item(&self, name: &str, e: &ItemEvent) {
        self.emit(format!(
            "{name} ws={} thread={} item={}",
            e.workspace_id,
            e.thread_id,
            e.item_id.as_deref().unwrap_or("-")
        ));
    }

    fn delta(&self, name: &str, d: &TextDelta) {
        self.emit(format!(
            "{name} ws={} thread={} item={} text={:?}",
            d.workspace_id, d.thread_id, d.item_id, d.text
        ));
    }
}

impl AppServerHandlers for SummaryHandlers {
    fn on_connected(&self, e: &WorkspaceEvent) {
        self.workspace("connected", e);
    }
    fn on_background_thread(&self, e: &ThreadEvent) {
        self.thread("background_thread", e);
    }
    fn on_error(&self, e: &ErrorEvent) {
        self.emit(format!(
            "error ws={} thread={} will_retry={} message={:?}",
            e.workspace_id,
            e.thread_id.as_deref().unwrap_or("-"),
            e.will_retry,
            e.message
        ));
    }
    fn on_account_updated(&self, e: &WorkspaceEvent) {
        self.workspace("account_updated", e);
    }
    fn on_rate_limits_updated(&self, e: &WorkspaceEvent) {
        self.workspace("rate_limits_updated", e);
    }
    fn on_login_completed(&self, e: &WorkspaceEvent) {
        self.workspace("login_completed", e);
    }
    fn on_thread_started(&self, e: &ThreadEvent) {
        self.thread("thread_started", e);
    }
    fn on_thread_name_updated(&self, e: &ThreadEvent) {
        self.thread("thread_name_updated", e);
    }
    fn on_thread_archived(&self, e: &ThreadEvent) {
        self.thread("thread_archived", e);
    }
    fn on_thread_unarchived(&self, e: &ThreadEvent) {
        self.thread("thread_unarchived", e);
    }
    fn on_thread_closed(&self, e: &ThreadEvent) {
        self.thread("thread_closed", e);
    }
    fn on_thread_status_changed(&self, e: &ThreadEvent) {
        self.thread("thread_status_changed", e);
    }
    fn on_token_usage_updated(&self, e: &TokenUsageEvent) {
        self.emit(format!(
            "token_usage_updated ws={} thread={} usage={}",
            e.workspace_id, e.thread_id, e.token_usage
        ));
    }
    fn on_thread_live_attached(&self, e: &ThreadEvent) {
        self.thread("thread_live_attached", e);
    }
    fn on_thread_live_detached(&self, e: &ThreadEvent) {
        self.thread("thread_live_detached", e);
    }
    fn on_thread_live_heartbeat(&self, e: &ThreadEvent) {
        self.thread("thread_live_heartbeat", e);
    }
    fn on_turn_started(&self, e: &TurnEvent) {
        self.turn("turn_started", e);
    }
    fn on_turn_completed(&self, e: &TurnEvent) {
        self.turn("turn_completed", e);
    }
    fn on_turn_plan_updated(&self, e: &TurnEvent) {
        self.turn("turn_plan_updated", e);
    }
    fn on_turn_diff_updated(&self, e: &TurnEvent) {
        self.turn("turn_diff_updated", e);
    }
    fn on_item_started(&self, e: &ItemEvent) {
        self.item("item_started", e);
    }
    fn on_item_completed(&self, e: &ItemEvent) {
        self.item("item_completed", e);
    }
    fn on_agent_message_delta(&self, d: &TextDelta) {
        self.delta("agent_message_delta", d);
    }
    fn on_reasoning_summary_delta(&self, d: &TextDelta) {
        self.delta("reasoning_summary_delta", d);
    }
    fn on_reasoning_summary_part_added(&self, e: &ItemEvent) {
        self.item("reasoning_summary_part_added", e);
    }
    fn on_reasoning_text_delta(&self, d: &TextDelta) {
        self.delta("reasoning_text_delta", d);
    }
    fn on_plan_delta(&self, d: &TextDelta) {
        self.delta("plan_delta", d);
    }
    fn on_command_output_delta(&self, d: &TextDelta) {
        self.delta("command_output_delta", d);
    }
    fn on_terminal_interaction(&self, e: &ItemEvent) {
        self.item("terminal_interaction", e);
    }
    fn on_file_change_output_delta(&self, d: &TextDelta) {
        self.delta("file_change_output_delta", d);
    }
    fn on_user_input_request(&self, r: &UserInputRequest) {
        let ids: Vec<&str> = r.questions.iter().map(|q| q.id.as_str()).collect();
        self.emit(format!(
            "user_input_request ws={} id={} questions={}",
            r.workspace_id,
            r.request_id,
            ids.join(",")
        ));
    }
    fn on_model_rerouted(&self, e: &ModelReroutedEvent) {
        self.emit(format!(
            "model_rerouted ws={} thread={} from={} to={}",
            e.workspace_id,
            e.thread_id,
            e.from_model.as_deref().unwrap_or("-"),
            e.to_model.as_deref().unwrap_or("-")
        ));
    }
    fn on_approval_request(&self, r: &ApprovalRequest) {
        self.emit(format!(
            "approval_request ws={} id={} method={} command={:?}",
            r.workspace_id, r.request_id, r.method, r.command
        ));
    }
    fn on_unsupported_method(&self, e: &UnsupportedMethodEvent) {
        self.emit(format!("unsupported_method ws={} method={}", e.workspace_id, e.method));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::WorkspaceId;
    use parking_lot::Mutex;

    #[test]
    fn delta_summary_quotes_text() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let handlers = SummaryHandlers::new(Arc::new(move |l| sink_lines.lock().push(l)));
        handlers.on_agent_message_delta(&TextDelta {
            workspace_id: WorkspaceId::from("ws"),
            thread_id: "t".into(),
            item_id: "i".into(),
            turn_id: None,
            text: "hi\n".into(),
        });
        assert_eq!(
            *lines.lock(),
            vec![r#"agent_message_delta ws=ws thread=t item=i text="hi\n""#]
        );
    }
}
