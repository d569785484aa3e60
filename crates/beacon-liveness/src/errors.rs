//! Liveness error types.

use beacon_core::{ThreadId, TransportError, WorkspaceId};
use thiserror::Error;

/// Why a reconnect attempt failed.
///
/// A superseded attempt is not an error; it resolves to `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LivenessError {
    /// The workspace reconnect side effect failed.
    #[error("reconnecting workspace {workspace_id} failed: {source}")]
    WorkspaceReconnect {
        /// Workspace being reconnected.
        workspace_id: WorkspaceId,
        /// Underlying failure.
        source: TransportError,
    },

    /// Fetching the latest thread state failed.
    #[error("resuming thread {thread_id} failed: {source}")]
    Resume {
        /// Thread being resumed.
        thread_id: ThreadId,
        /// Underlying failure.
        source: TransportError,
    },

    /// The subscribe call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = LivenessError::WorkspaceReconnect {
            workspace_id: WorkspaceId::from("ws"),
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "reconnecting workspace ws failed: transport closed");

        let err = LivenessError::Resume {
            thread_id: ThreadId::from("t1"),
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "resuming thread t1 failed: transport closed");
    }

    #[test]
    fn transport_is_transparent() {
        let err: LivenessError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "transport closed");
    }
}
