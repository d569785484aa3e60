//! Transport error type.
//!
//! Every outbound call Beacon makes (subscribe, unsubscribe, respond) goes
//! through [`crate::AppServerTransport`] and fails with a [`TransportError`].
//! Callers in this workspace never propagate these to the host event loop;
//! they log and reconcile to a safe state.

use thiserror::Error;

/// Failure of an outbound transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The workspace has no live app-server connection.
    #[error("workspace {workspace_id} is not connected")]
    Disconnected {
        /// Workspace the call targeted.
        workspace_id: String,
    },

    /// The app server rejected the request.
    #[error("{method} failed: {message}")]
    Request {
        /// Outbound method that failed.
        method: String,
        /// Server- or transport-supplied message.
        message: String,
    },

    /// The transport's own request timeout elapsed.
    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout {
        /// Outbound method that timed out.
        method: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Convenience constructor for [`TransportError::Request`].
    pub fn request(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::Timeout { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
