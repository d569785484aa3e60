//! An in-memory [`AppServerTransport`] that records every outbound call.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::errors::TransportError;
use crate::ids::{SubscriptionKey, ThreadId, WorkspaceId};
use crate::transport::{AppServerTransport, RawAppServerEvent, RequestId};

const CHANNEL_CAPACITY: usize = 1024;

/// One outbound call observed by [`RecordingTransport`].
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCall {
    /// `subscribe_thread`.
    Subscribe(SubscriptionKey),
    /// `unsubscribe_thread`.
    Unsubscribe(SubscriptionKey),
    /// `respond`.
    Respond {
        /// Target workspace.
        workspace_id: WorkspaceId,
        /// Echoed request id.
        request_id: RequestId,
        /// Response body.
        result: Value,
    },
}

/// Releases a subscribe call held open by
/// [`RecordingTransport::hold_next_subscribe`].
pub struct SubscribeGate {
    tx: oneshot::Sender<Result<(), TransportError>>,
}

impl SubscribeGate {
    /// Let the held call succeed.
    pub fn release(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Let the held call fail with `err`.
    pub fn fail(self, err: TransportError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Transport double: a broadcast channel for inbound records plus a log of
/// outbound calls, with per-call failure injection.
pub struct RecordingTransport {
    events: broadcast::Sender<RawAppServerEvent>,
    calls: Mutex<Vec<TransportCall>>,
    subscribe_failures: Mutex<VecDeque<TransportError>>,
    unsubscribe_failures: Mutex<VecDeque<TransportError>>,
    respond_failures: Mutex<VecDeque<TransportError>>,
    subscribe_gates: Mutex<VecDeque<oneshot::Receiver<Result<(), TransportError>>>>,
}

impl RecordingTransport {
    /// Create an idle transport.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            subscribe_failures: Mutex::new(VecDeque::new()),
            unsubscribe_failures: Mutex::new(VecDeque::new()),
            respond_failures: Mutex::new(VecDeque::new()),
            subscribe_gates: Mutex::new(VecDeque::new()),
        }
    }

    /// Push a raw record to every open receiver. Returns the receiver count.
    pub fn emit(&self, event: RawAppServerEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Push `{workspaceId, message}` to every open receiver.
    pub fn emit_message(&self, workspace_id: &str, message: Value) -> usize {
        self.emit(RawAppServerEvent::new(workspace_id, message))
    }

    /// Every outbound call so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    /// Keys passed to `subscribe_thread`, in order.
    pub fn subscribes(&self) -> Vec<SubscriptionKey> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Subscribe(k) => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys passed to `unsubscribe_thread`, in order.
    pub fn unsubscribes(&self) -> Vec<SubscriptionKey> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Unsubscribe(k) => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    /// `(workspace, request id, body)` of every `respond` call, in order.
    pub fn responses(&self) -> Vec<(WorkspaceId, RequestId, Value)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Respond {
                    workspace_id,
                    request_id,
                    result,
                } => Some((workspace_id.clone(), request_id.clone(), result.clone())),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Make the next `subscribe_thread` fail.
    pub fn fail_next_subscribe(&self, err: TransportError) {
        self.subscribe_failures.lock().push_back(err);
    }

    /// Make the next `unsubscribe_thread` fail.
    pub fn fail_next_unsubscribe(&self, err: TransportError) {
        self.unsubscribe_failures.lock().push_back(err);
    }

    /// Make the next `respond` fail.
    pub fn fail_next_respond(&self, err: TransportError) {
        self.respond_failures.lock().push_back(err);
    }

    /// Hold the next `subscribe_thread` open until the gate is released.
    ///
    /// The call is recorded as soon as it starts. Dropping the gate without
    /// releasing it fails the call with [`TransportError::Closed`].
    pub fn hold_next_subscribe(&self) -> SubscribeGate {
        let (tx, rx) = oneshot::channel();
        self.subscribe_gates.lock().push_back(rx);
        SubscribeGate { tx }
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppServerTransport for RecordingTransport {
    fn notifications(&self) -> broadcast::Receiver<RawAppServerEvent> {
        self.events.subscribe()
    }

    async fn subscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(TransportCall::Subscribe(SubscriptionKey::new(
            workspace_id.clone(),
            thread_id.clone(),
        )));
        let gate = self.subscribe_gates.lock().pop_front();
        if let Some(gate) = gate {
            gate.await.unwrap_or(Err(TransportError::Closed))?;
        }
        match self.subscribe_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unsubscribe_thread(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(TransportCall::Unsubscribe(SubscriptionKey::new(
            workspace_id.clone(),
            thread_id.clone(),
        )));
        match self.unsubscribe_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn respond(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        result: Value,
    ) -> Result<(), TransportError> {
        self.calls.lock().push(TransportCall::Respond {
            workspace_id: workspace_id.clone(),
            request_id: request_id.clone(),
            result,
        });
        match self.respond_failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
