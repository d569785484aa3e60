//! The transport seam and the raw records it delivers.
//!
//! The actual IPC/network layer lives outside this workspace. It hands Beacon
//! already-parsed JSON records and accepts three outbound calls. Nothing here
//! trusts the inbound shape: every field is validated again downstream.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::TransportError;
use crate::ids::{ThreadId, WorkspaceId};

/// JSON-RPC request id carried by request-shaped notifications.
///
/// The app server uses both integer and string ids; the original form is
/// preserved so a response echoes exactly what was received.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(serde_json::Number),
    /// String id.
    Text(String),
}

impl RequestId {
    /// Extract a request id from a raw `id` field.
    ///
    /// Only strings and numbers qualify; anything else (null, bool, objects)
    /// yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    /// The id as a JSON value, for building outbound frames.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::Number(n.clone()),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One inbound record as delivered by the transport.
///
/// Wire shape: `{ "workspaceId": string, "message": { "method", "params"?, "id"? } }`.
/// `message` is kept as an untyped [`Value`]; normalization decides whether
/// it is usable.
#[derive(Clone, Debug, PartialEq)]
pub struct RawAppServerEvent {
    /// Workspace whose app-server connection produced the message.
    pub workspace_id: WorkspaceId,
    /// The JSON-RPC-like message body, unvalidated.
    pub message: Value,
}

impl RawAppServerEvent {
    /// Build a record from its parts.
    pub fn new(workspace_id: impl Into<WorkspaceId>, message: Value) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            message,
        }
    }

    /// Parse the full inbound wire shape.
    ///
    /// Returns `None` when the record is not an object or carries no string
    /// workspace id. Both `workspaceId` and `workspace_id` are accepted.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        let workspace_id = map
            .get("workspaceId")
            .or_else(|| map.get("workspace_id"))
            .and_then(Value::as_str)?
            .to_owned();
        let message = map.remove("message").unwrap_or(Value::Null);
        Some(Self::new(workspace_id, message))
    }
}

/// Outbound calls and the inbound notification stream of the app-server
/// connection layer.
///
/// Implementations must be cheap to call concurrently; Beacon never holds a
/// lock across any of these awaits.
#[async_trait]
pub trait AppServerTransport: Send + Sync {
    /// Open a new receiver on the raw notification stream.
    ///
    /// Each call returns an independent receiver, so the dispatcher and the
    /// liveness observer each see every record.
    fn notifications(&self) -> broadcast::Receiver<RawAppServerEvent>;

    /// Ask the server to push live updates for a thread.
    async fn subscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError>;

    /// Stop live updates for a thread.
    async fn unsubscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError>;

    /// Answer a request-shaped notification (approval or user input).
    async fn respond(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        result: Value,
    ) -> Result<(), TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
