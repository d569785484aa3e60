//! Approval requests, decisions, and the auto-accept allowlist.

use std::collections::HashMap;

use beacon_core::{RequestId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::envelope::NotificationEnvelope;
use crate::fields::{self, Params};

const SHELL_WRAPPERS: &[&str] = &["bash", "sh", "zsh"];
const SHELL_SCRIPT_FLAGS: &[&str] = &["-c", "-lc"];
const CONTROL_OPERATORS: &[&str] = &[";", "&&", "||", "|", ">", "<", "`", "$("];

/// An approval-style request surfaced to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ApprovalRequest {
    /// Workspace that sent the request.
    pub workspace_id: WorkspaceId,
    /// Id to echo in the response.
    pub request_id: RequestId,
    /// Canonical method (ends in `requestApproval`).
    pub method: String,
    /// Owning thread, if reported.
    pub thread_id: Option<String>,
    /// Owning turn, if reported.
    pub turn_id: Option<String>,
    /// Owning item, if reported.
    pub item_id: Option<String>,
    /// Command tokens; empty for non-command approvals such as file changes.
    pub command: Vec<String>,
    /// Human-readable justification from the backend.
    pub reason: Option<String>,
    /// The full parameter object.
    pub params: Params,
}

impl ApprovalRequest {
    /// Build from an approval envelope. `None` when the envelope is not an
    /// approval or carries no request id.
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Option<Self> {
        if !envelope.method.is_approval() {
            return None;
        }
        let request_id = envelope.request_id.clone()?;
        let params = &envelope.params;
        Some(Self {
            workspace_id: envelope.workspace_id.clone(),
            request_id,
            method: envelope.method.as_str().to_owned(),
            thread_id: fields::thread_id(params),
            turn_id: fields::turn_id(params),
            item_id: fields::item_id(params),
            command: command_tokens(params),
            reason: fields::string_field(params, &["reason", "justification"]),
            params: params.clone(),
        })
    }
}

/// The caller's answer to an approval request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    /// Run it.
    Accept,
    /// Do not run it.
    Decline,
}

impl ApprovalDecision {
    /// Response body: `{"decision": "accept" | "decline"}`.
    pub fn to_response(self) -> Value {
        json!({ "decision": self })
    }
}

/// Command tokens from `params.command` (or `params.cmd`).
///
/// Accepts an array of strings or a whitespace-separated string. A
/// `bash|sh|zsh -c|-lc "<script>"` wrapper is replaced by the script's own
/// tokens.
pub fn command_tokens(params: &Params) -> Vec<String> {
    let raw = params.get("command").or_else(|| params.get("cmd"));
    let tokens = match raw {
        Some(Value::String(s)) => split_tokens(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        _ => Vec::new(),
    };
    unwrap_shell(tokens)
}

fn split_tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(ToOwned::to_owned).collect()
}

fn unwrap_shell(tokens: Vec<String>) -> Vec<String> {
    let [shell, flag, ..] = tokens.as_slice() else {
        return tokens;
    };
    let shell_name = shell.rsplit('/').next().unwrap_or(shell);
    if tokens.len() < 3
        || !SHELL_WRAPPERS.contains(&shell_name)
        || !SHELL_SCRIPT_FLAGS.contains(&flag.as_str())
    {
        return tokens;
    }
    let script = tokens[2..].join(" ");
    split_tokens(strip_quotes(&script))
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

/// Whether any token contains a shell control operator.
pub fn has_control_operators(command: &[String]) -> bool {
    command
        .iter()
        .any(|t| CONTROL_OPERATORS.iter().any(|op| t.contains(op)))
}

/// Per-workspace command-token prefixes approved without prompting.
#[derive(Clone, Debug, Default)]
pub struct ApprovalAllowlist {
    prefixes: HashMap<WorkspaceId, Vec<Vec<String>>>,
}

impl ApprovalAllowlist {
    /// Empty allowlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a workspace's prefixes. Empty prefixes are discarded.
    pub fn set(&mut self, workspace_id: WorkspaceId, prefixes: Vec<Vec<String>>) {
        let mut cleaned: Vec<Vec<String>> = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            if !prefix.is_empty() && !cleaned.contains(&prefix) {
                cleaned.push(prefix);
            }
        }
        let _ = self.prefixes.insert(workspace_id, cleaned);
    }

    /// Add one prefix. Returns `false` if it was empty or already present.
    pub fn remember(&mut self, workspace_id: WorkspaceId, prefix: Vec<String>) -> bool {
        if prefix.is_empty() {
            return false;
        }
        let list = self.prefixes.entry(workspace_id).or_default();
        if list.contains(&prefix) {
            return false;
        }
        list.push(prefix);
        true
    }

    /// Prefixes registered for a workspace.
    pub fn prefixes(&self, workspace_id: &WorkspaceId) -> &[Vec<String>] {
        self.prefixes
            .get(workspace_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `command` starts with one of the workspace's prefixes,
    /// token for token. Commands with shell control operators never match.
    pub fn matches(&self, workspace_id: &WorkspaceId, command: &[String]) -> bool {
        if command.is_empty() || has_control_operators(command) {
            return false;
        }
        self.prefixes(workspace_id)
            .iter()
            .any(|prefix| !prefix.is_empty() && command.starts_with(prefix))
    }
}
