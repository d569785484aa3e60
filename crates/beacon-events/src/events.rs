//! Typed payloads handed to [`AppServerHandlers`](crate::AppServerHandlers).

use beacon_core::WorkspaceId;
use beacon_protocol::Params;
use serde_json::Value;

/// Workspace-scoped notification (connection, account state).
#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Raw parameters.
    pub params: Params,
}

/// Thread-scoped notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ThreadEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Target thread.
    pub thread_id: String,
    /// Raw parameters.
    pub params: Params,
}

/// Turn-scoped notification.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread.
    pub thread_id: String,
    /// Turn id, when reported.
    pub turn_id: Option<String>,
    /// Raw parameters.
    pub params: Params,
}

/// Item lifecycle notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread.
    pub thread_id: String,
    /// Owning turn, when reported.
    pub turn_id: Option<String>,
    /// Item id, when reported.
    pub item_id: Option<String>,
    /// The `item` object; empty when absent.
    pub item: Params,
    /// Raw parameters.
    pub params: Params,
}

/// A fragment (or merged run of fragments) of streaming text for one item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextDelta {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread.
    pub thread_id: String,
    /// Owning item.
    pub item_id: String,
    /// Owning turn; may arrive late, so the latest non-empty value wins.
    pub turn_id: Option<String>,
    /// Text in arrival order.
    pub text: String,
}

impl TextDelta {
    /// Coalescing key: `workspace:thread:item`.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.workspace_id, self.thread_id, self.item_id)
    }
}

/// Turn-level error.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread, when reported.
    pub thread_id: Option<String>,
    /// Owning turn, when reported.
    pub turn_id: Option<String>,
    /// Human-readable message; empty when none was sent.
    pub message: String,
    /// Whether the backend will retry on its own.
    pub will_retry: bool,
    /// Raw parameters.
    pub params: Params,
}

/// Token usage counters for a thread.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenUsageEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread.
    pub thread_id: String,
    /// The usage payload (`tokenUsage`, `token_usage`, or `info`).
    pub token_usage: Value,
}

/// The backend switched models mid-turn.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelReroutedEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// Owning thread.
    pub thread_id: String,
    /// Previous model, when reported.
    pub from_model: Option<String>,
    /// New model, when reported.
    pub to_model: Option<String>,
    /// Reason, when reported.
    pub reason: Option<String>,
}

/// A method outside both the supported and passthrough sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedMethodEvent {
    /// Source workspace.
    pub workspace_id: WorkspaceId,
    /// The canonical method string.
    pub method: String,
}
