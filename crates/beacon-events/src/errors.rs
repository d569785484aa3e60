//! Dispatcher error types.

use beacon_core::{RequestId, TransportError, WorkspaceId};

/// Errors from responding to app-server requests.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No pending request of that kind with this id for this workspace.
    #[error("no pending request {request_id} for workspace {workspace_id}")]
    UnknownRequest {
        /// Workspace the response was addressed to.
        workspace_id: WorkspaceId,
        /// The unmatched request id.
        request_id: RequestId,
    },

    /// Sending the response failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_request_display() {
        let err = DispatchError::UnknownRequest {
            workspace_id: WorkspaceId::from("ws"),
            request_id: RequestId::from(7),
        };
        assert_eq!(err.to_string(), "no pending request 7 for workspace ws");
    }

    #[test]
    fn transport_error_converts() {
        let err: DispatchError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "transport closed");
    }
}
