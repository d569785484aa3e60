//! Offline replay of recorded notification streams.
//!
//! Input is JSON lines, one inbound record per line in the transport's wire
//! shape (`{"workspaceId": .., "message": {..}}`). Records are routed in file
//! order through a real dispatcher and liveness monitor backed by
//! [`ReplayTransport`], which accepts every outbound call and remembers the
//! responses.

use std::io::BufRead;
use std::sync::Arc;

use async_trait::async_trait;
use beacon_core::{
    AppServerTransport, RawAppServerEvent, RequestId, SubscriptionKey, ThreadId, TransportError,
    WorkspaceId,
};
use beacon_events::{AppServerHandlers, DispatcherConfig, EventDispatcher};
use beacon_liveness::{Collaborators, ConnectionState, LivenessMonitor};
use beacon_protocol::normalize_event;
use beacon_settings::BeaconSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// In-process transport: outbound calls always succeed.
pub struct ReplayTransport {
    events: broadcast::Sender<RawAppServerEvent>,
    subscriptions: Mutex<Vec<SubscriptionKey>>,
    responses: Mutex<Vec<(WorkspaceId, RequestId, Value)>>,
}

impl ReplayTransport {
    /// Create an idle transport.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            events,
            subscriptions: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Responses sent so far, in order.
    pub fn responses(&self) -> Vec<(WorkspaceId, RequestId, Value)> {
        self.responses.lock().clone()
    }

    /// Currently subscribed threads.
    pub fn subscriptions(&self) -> Vec<SubscriptionKey> {
        self.subscriptions.lock().clone()
    }
}

impl Default for ReplayTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppServerTransport for ReplayTransport {
    fn notifications(&self) -> broadcast::Receiver<RawAppServerEvent> {
        self.events.subscribe()
    }

    async fn subscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError> {
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id.clone());
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.contains(&key) {
            subscriptions.push(key);
        }
        Ok(())
    }

    async fn unsubscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .retain(|k| &k.workspace_id != workspace_id || &k.thread_id != thread_id);
        Ok(())
    }

    async fn respond(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        result: Value,
    ) -> Result<(), TransportError> {
        info!(%workspace_id, %request_id, %result, "response sent");
        self.responses
            .lock()
            .push((workspace_id.clone(), request_id.clone(), result));
        Ok(())
    }
}

/// Outcome of a replay run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayReport {
    /// Lines routed to the dispatcher.
    pub routed: usize,
    /// Lines that were blank, not JSON, not a valid record, or carried a
    /// message without a method.
    pub skipped: usize,
    /// Responses the dispatcher sent (auto-accepted approvals).
    pub responses: usize,
    /// Active thread, the first thread any record mentioned.
    pub active_thread: Option<SubscriptionKey>,
    /// Liveness of the active thread after the last record.
    pub final_state: ConnectionState,
}

/// Route every record in `input` and report what happened.
///
/// The first thread mentioned becomes the active thread for liveness
/// tracking, and its workspace is treated as connected.
pub async fn replay<R: BufRead>(
    input: R,
    settings: &BeaconSettings,
    handlers: Arc<dyn AppServerHandlers>,
) -> std::io::Result<ReplayReport> {
    let transport = Arc::new(ReplayTransport::new());
    let dispatcher = EventDispatcher::new(
        transport.clone(),
        handlers,
        DispatcherConfig::from(&settings.dispatcher),
    );
    let liveness = LivenessMonitor::new(
        transport.clone(),
        settings.liveness.backend_mode,
        Collaborators::default(),
    );

    let mut routed = 0;
    let mut skipped = 0;
    let mut active_thread: Option<SubscriptionKey> = None;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                warn!(line = line_no, error = %err, "skipping line that is not JSON");
                skipped += 1;
                continue;
            }
        };
        let Some(event) = RawAppServerEvent::from_value(value) else {
            warn!(line = line_no, "skipping line without a workspace id");
            skipped += 1;
            continue;
        };

        let Some(envelope) = normalize_event(&event) else {
            debug!(line = line_no, "skipping malformed message");
            skipped += 1;
            continue;
        };
        if active_thread.is_none() {
            if let Some(thread_id) = envelope.thread_id() {
                let key = SubscriptionKey::new(envelope.workspace_id.clone(), thread_id);
                debug!(key = %key, "active thread selected");
                liveness.set_workspace_connected(&key.workspace_id, true);
                liveness.set_threads(Some(key.clone()), []).await;
                active_thread = Some(key);
            }
        }
        liveness.observe(&envelope);
        dispatcher.route_envelope(&envelope).await;
        routed += 1;
    }

    dispatcher.flush_deltas();
    let report = ReplayReport {
        routed,
        skipped,
        responses: transport.responses().len(),
        active_thread,
        final_state: liveness.connection_state(),
    };
    liveness.shutdown().await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_events::NoopHandlers;

    #[tokio::test]
    async fn replay_transport_tracks_subscriptions() {
        let transport = ReplayTransport::new();
        let ws = WorkspaceId::from("ws");
        let t = ThreadId::from("t");
        transport.subscribe_thread(&ws, &t).await.unwrap();
        transport.subscribe_thread(&ws, &t).await.unwrap();
        assert_eq!(transport.subscriptions().len(), 1);
        transport.unsubscribe_thread(&ws, &t).await.unwrap();
        assert!(transport.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn counts_skipped_lines() {
        let input = "\nnot json\n{\"message\":{}}\n{\"workspaceId\":\"ws\",\"message\":{\"method\":\"  \"}}\n{\"workspaceId\":\"ws\",\"message\":{\"method\":\"thread/started\",\"params\":{\"threadId\":\"t\"}}}\n";
        let report = replay(
            input.as_bytes(),
            &BeaconSettings::default(),
            Arc::new(NoopHandlers),
        )
        .await
        .unwrap();
        assert_eq!(report.routed, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.active_thread, Some(SubscriptionKey::new("ws", "t")));
    }
}
