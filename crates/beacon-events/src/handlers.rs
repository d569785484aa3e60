//! The caller-supplied handler set.

use beacon_protocol::{ApprovalRequest, UserInputRequest};

use crate::events::{
    ErrorEvent, ItemEvent, ModelReroutedEvent, TextDelta, ThreadEvent, TokenUsageEvent,
    TurnEvent, UnsupportedMethodEvent, WorkspaceEvent,
};

/// Callbacks for routed notifications.
///
/// Every method defaults to a no-op; implement only the ones you need.
/// Callbacks should return quickly. Most run on the dispatcher task in
/// arrival order, but [`on_agent_message_delta`](Self::on_agent_message_delta)
/// also runs on the coalescer's flush timer, so on a multi-thread runtime it
/// may run concurrently with other callbacks. Panics are not caught.
#[allow(unused_variables)]
pub trait AppServerHandlers: Send + Sync {
    /// `codex/connected`
    fn on_connected(&self, event: &WorkspaceEvent) {}
    /// `codex/backgroundThread`
    fn on_background_thread(&self, event: &ThreadEvent) {}
    /// `error`
    fn on_error(&self, event: &ErrorEvent) {}

    /// `account/updated`
    fn on_account_updated(&self, event: &WorkspaceEvent) {}
    /// `account/rateLimits/updated`
    fn on_rate_limits_updated(&self, event: &WorkspaceEvent) {}
    /// `account/login/completed`
    fn on_login_completed(&self, event: &WorkspaceEvent) {}

    /// `thread/started`
    fn on_thread_started(&self, event: &ThreadEvent) {}
    /// `thread/name/updated`
    fn on_thread_name_updated(&self, event: &ThreadEvent) {}
    /// `thread/archived`
    fn on_thread_archived(&self, event: &ThreadEvent) {}
    /// `thread/unarchived`
    fn on_thread_unarchived(&self, event: &ThreadEvent) {}
    /// `thread/closed`
    fn on_thread_closed(&self, event: &ThreadEvent) {}
    /// `thread/status/changed`
    fn on_thread_status_changed(&self, event: &ThreadEvent) {}
    /// `thread/tokenUsage/updated`
    fn on_token_usage_updated(&self, event: &TokenUsageEvent) {}
    /// `thread/live/attached`
    fn on_thread_live_attached(&self, event: &ThreadEvent) {}
    /// `thread/live/detached`
    fn on_thread_live_detached(&self, event: &ThreadEvent) {}
    /// `thread/live/heartbeat`
    fn on_thread_live_heartbeat(&self, event: &ThreadEvent) {}

    /// `turn/started`
    fn on_turn_started(&self, event: &TurnEvent) {}
    /// `turn/completed`; all buffered deltas have been delivered first.
    fn on_turn_completed(&self, event: &TurnEvent) {}
    /// `turn/plan/updated`
    fn on_turn_plan_updated(&self, event: &TurnEvent) {}
    /// `turn/diff/updated`
    fn on_turn_diff_updated(&self, event: &TurnEvent) {}

    /// `item/started`
    fn on_item_started(&self, event: &ItemEvent) {}
    /// `item/completed`; all buffered deltas have been delivered first.
    fn on_item_completed(&self, event: &ItemEvent) {}
    /// `item/agentMessage/delta`, coalesced.
    fn on_agent_message_delta(&self, delta: &TextDelta) {}
    /// `item/reasoning/summaryTextDelta`
    fn on_reasoning_summary_delta(&self, delta: &TextDelta) {}
    /// `item/reasoning/summaryPartAdded`
    fn on_reasoning_summary_part_added(&self, event: &ItemEvent) {}
    /// `item/reasoning/textDelta`
    fn on_reasoning_text_delta(&self, delta: &TextDelta) {}
    /// `item/plan/delta`
    fn on_plan_delta(&self, delta: &TextDelta) {}
    /// `item/commandExecution/outputDelta`
    fn on_command_output_delta(&self, delta: &TextDelta) {}
    /// `item/commandExecution/terminalInteraction`
    fn on_terminal_interaction(&self, event: &ItemEvent) {}
    /// `item/fileChange/outputDelta`
    fn on_file_change_output_delta(&self, delta: &TextDelta) {}
    /// `item/tool/requestUserInput`; answer with
    /// [`EventDispatcher::respond_to_user_input`](crate::EventDispatcher::respond_to_user_input).
    fn on_user_input_request(&self, request: &UserInputRequest) {}

    /// `model/rerouted`
    fn on_model_rerouted(&self, event: &ModelReroutedEvent) {}

    /// Any `*requestApproval` request not auto-accepted; answer with
    /// [`EventDispatcher::respond_to_approval`](crate::EventDispatcher::respond_to_approval).
    fn on_approval_request(&self, request: &ApprovalRequest) {}

    /// Protocol drift warning, at most once per cooldown window.
    fn on_unsupported_method(&self, event: &UnsupportedMethodEvent) {}
}

/// Handler set that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandlers;

impl AppServerHandlers for NoopHandlers {}
