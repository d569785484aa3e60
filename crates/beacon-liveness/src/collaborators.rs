//! Side effects a reconnect may need from the host application.

use async_trait::async_trait;
use beacon_core::{ThreadId, TransportError, WorkspaceId};

/// Re-establishes a workspace's app-server connection.
///
/// Called by [`LivenessMonitor::reconnect`](crate::LivenessMonitor::reconnect)
/// before subscribing when the workspace is known to be disconnected. A
/// successful return marks the workspace connected.
#[async_trait]
pub trait WorkspaceReconnector: Send + Sync {
    /// Reconnect `workspace_id`.
    async fn reconnect_workspace(&self, workspace_id: &WorkspaceId) -> Result<(), TransportError>;
}

/// Fetches a thread's latest state so nothing pushed while unsubscribed is
/// missed.
#[async_trait]
pub trait ThreadResumer: Send + Sync {
    /// Refresh `thread_id` in `workspace_id`.
    async fn resume_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError>;
}
