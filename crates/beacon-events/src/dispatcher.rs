//! Notification routing.
//!
//! One [`EventDispatcher`] per consumer. It owns a single receiver on the
//! transport's raw stream (see [`EventDispatcher::subscribe`]) and routes
//! each record, in arrival order, to the handler set currently in its slot.
//! Swapping handlers never touches the transport.
//!
//! Nothing is dropped as long as the receiver keeps within the transport's
//! broadcast capacity. If it lags, the overrun records are lost and any
//! buffered deltas are delivered at once.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use beacon_core::{AppServerTransport, Clock, RawAppServerEvent, RequestId, TokioClock, WorkspaceId};
use beacon_protocol::{
    AppServerMethod, ApprovalAllowlist, ApprovalDecision, ApprovalRequest, MethodCatalog,
    MethodClass, NotificationEnvelope, UserInputRequest, UserInputResponse, fields,
    normalize_event,
};
use beacon_settings::DispatcherSettings;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::coalescer::{DEFAULT_FLUSH_INTERVAL, DeltaCoalescer, DeltaSink};
use crate::errors::DispatchError;
use crate::events::{
    ErrorEvent, ItemEvent, ModelReroutedEvent, TextDelta, ThreadEvent, TokenUsageEvent,
    TurnEvent, UnsupportedMethodEvent, WorkspaceEvent,
};
use crate::handlers::AppServerHandlers;
use crate::throttle::{DEFAULT_WARNING_COOLDOWN, WarningThrottle};

type HandlerSlot = Arc<RwLock<Arc<dyn AppServerHandlers>>>;

/// Dispatcher tuning.
#[derive(Clone)]
pub struct DispatcherConfig {
    /// Delta coalescing window.
    pub flush_interval: Duration,
    /// Minimum gap between surfaced drift warnings.
    pub warning_cooldown: Duration,
    /// Methods accepted and ignored on top of the built-in list.
    pub extra_passthrough: Vec<String>,
    /// Initial auto-accept prefixes per workspace.
    pub auto_accept: BTreeMap<String, Vec<Vec<String>>>,
    /// Time source for the warning cooldown.
    pub clock: Arc<dyn Clock>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            warning_cooldown: DEFAULT_WARNING_COOLDOWN,
            extra_passthrough: Vec::new(),
            auto_accept: BTreeMap::new(),
            clock: Arc::new(TokioClock),
        }
    }
}

impl From<&DispatcherSettings> for DispatcherConfig {
    fn from(settings: &DispatcherSettings) -> Self {
        Self {
            flush_interval: Duration::from_millis(settings.delta_flush_interval_ms),
            warning_cooldown: Duration::from_millis(settings.unsupported_warning_cooldown_ms),
            extra_passthrough: settings.passthrough_methods.clone(),
            auto_accept: settings.auto_accept.clone(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingKind {
    Approval,
    UserInput,
}

struct Shared {
    transport: Arc<dyn AppServerTransport>,
    handlers: HandlerSlot,
    catalog: MethodCatalog,
    coalescer: DeltaCoalescer,
    allowlist: Mutex<ApprovalAllowlist>,
    pending: Mutex<HashMap<(WorkspaceId, RequestId), PendingKind>>,
    warnings: WarningThrottle,
}

/// Routes normalized notifications to an [`AppServerHandlers`] set.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct EventDispatcher {
    shared: Arc<Shared>,
}

impl EventDispatcher {
    /// Create a dispatcher without attaching it to the transport stream.
    ///
    /// Feed it with [`route`](Self::route), or use
    /// [`subscribe`](Self::subscribe) to attach.
    pub fn new(
        transport: Arc<dyn AppServerTransport>,
        handlers: Arc<dyn AppServerHandlers>,
        config: DispatcherConfig,
    ) -> Self {
        let handlers: HandlerSlot = Arc::new(RwLock::new(handlers));
        let sink_slot = Arc::clone(&handlers);
        let sink: DeltaSink = Arc::new(move |delta: TextDelta| {
            let current = sink_slot.read().clone();
            current.on_agent_message_delta(&delta);
        });

        let mut allowlist = ApprovalAllowlist::new();
        for (workspace, prefixes) in config.auto_accept {
            allowlist.set(WorkspaceId::from(workspace), prefixes);
        }

        Self {
            shared: Arc::new(Shared {
                transport,
                handlers,
                catalog: MethodCatalog::new().with_passthrough(&config.extra_passthrough),
                coalescer: DeltaCoalescer::new(config.flush_interval, sink),
                allowlist: Mutex::new(allowlist),
                pending: Mutex::new(HashMap::new()),
                warnings: WarningThrottle::new(config.warning_cooldown, config.clock),
            }),
        }
    }

    /// Create a dispatcher and attach it to the transport's stream.
    ///
    /// Exactly one receiver is opened for the lifetime of the returned
    /// subscription, however often the handlers are swapped.
    pub fn subscribe(
        transport: Arc<dyn AppServerTransport>,
        handlers: Arc<dyn AppServerHandlers>,
        config: DispatcherConfig,
    ) -> DispatcherSubscription {
        let rx = transport.notifications();
        let dispatcher = Self::new(transport, handlers, config);
        let task = tokio::spawn(dispatcher.clone().run(rx));
        DispatcherSubscription { dispatcher, task }
    }

    #[instrument(skip_all, name = "dispatcher")]
    async fn run(self, mut rx: broadcast::Receiver<RawAppServerEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.route(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "dispatcher lagged, notifications dropped");
                    // the dropped records may include the boundary that owned them
                    self.flush_deltas();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("notification stream closed, dispatcher exiting");
                    self.flush_deltas();
                    break;
                }
            }
        }
    }

    /// Replace the handler set. Takes effect for the next routed record.
    pub fn set_handlers(&self, handlers: Arc<dyn AppServerHandlers>) {
        *self.shared.handlers.write() = handlers;
    }

    fn handlers(&self) -> Arc<dyn AppServerHandlers> {
        self.shared.handlers.read().clone()
    }

    /// Normalize and route one raw record. Malformed records are dropped.
    pub async fn route(&self, event: &RawAppServerEvent) {
        match normalize_event(event) {
            Some(envelope) => self.route_envelope(&envelope).await,
            None => trace!(workspace_id = %event.workspace_id, "dropped malformed notification"),
        }
    }

    /// Route one normalized notification.
    pub async fn route_envelope(&self, envelope: &NotificationEnvelope) {
        if envelope.method.is_approval() && envelope.request_id.is_some() {
            self.handle_approval(envelope).await;
            return;
        }

        match self.shared.catalog.classify(&envelope.method) {
            MethodClass::Supported => self.dispatch_supported(envelope),
            MethodClass::Passthrough => {
                trace!(method = %envelope.method, "passthrough method ignored");
            }
            MethodClass::Unknown => self.handle_unsupported(envelope),
        }
    }

    fn handle_unsupported(&self, envelope: &NotificationEnvelope) {
        let method = envelope.method.as_str();
        debug!(workspace_id = %envelope.workspace_id, method, "unsupported app-server method");
        if self.shared.warnings.try_acquire() {
            warn!(
                workspace_id = %envelope.workspace_id,
                method,
                "app-server sent a method this client does not understand; versions may have drifted"
            );
            self.handlers()
                .on_unsupported_method(&UnsupportedMethodEvent {
                    workspace_id: envelope.workspace_id.clone(),
                    method: method.to_owned(),
                });
        }
    }

    async fn handle_approval(&self, envelope: &NotificationEnvelope) {
        let Some(request) = ApprovalRequest::from_envelope(envelope) else {
            return;
        };
        let auto_accept = self
            .shared
            .allowlist
            .lock()
            .matches(&request.workspace_id, &request.command);

        if auto_accept {
            debug!(
                workspace_id = %request.workspace_id,
                request_id = %request.request_id,
                command = ?request.command,
                "auto-accepting allowlisted command"
            );
            let result = self
                .shared
                .transport
                .respond(
                    &request.workspace_id,
                    &request.request_id,
                    ApprovalDecision::Accept.to_response(),
                )
                .await;
            if let Err(err) = result {
                warn!(
                    workspace_id = %request.workspace_id,
                    request_id = %request.request_id,
                    error = %err,
                    "failed to send auto-accept response"
                );
            }
            return;
        }

        self.register(&request.workspace_id, &request.request_id, PendingKind::Approval);
        self.handlers().on_approval_request(&request);
    }

    fn register(&self, workspace_id: &WorkspaceId, request_id: &RequestId, kind: PendingKind) {
        let _ = self
            .shared
            .pending
            .lock()
            .insert((workspace_id.clone(), request_id.clone()), kind);
    }

    fn take_pending(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        kind: PendingKind,
    ) -> Result<(), DispatchError> {
        let mut pending = self.shared.pending.lock();
        let key = (workspace_id.clone(), request_id.clone());
        if pending.get(&key) == Some(&kind) {
            let _ = pending.remove(&key);
            Ok(())
        } else {
            Err(DispatchError::UnknownRequest {
                workspace_id: workspace_id.clone(),
                request_id: request_id.clone(),
            })
        }
    }

    async fn respond(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        kind: PendingKind,
        body: Value,
    ) -> Result<(), DispatchError> {
        self.take_pending(workspace_id, request_id, kind)?;
        let result = self
            .shared
            .transport
            .respond(workspace_id, request_id, body)
            .await;
        if let Err(err) = result {
            warn!(%workspace_id, %request_id, error = %err, "failed to send response");
            // keep it answerable
            self.register(workspace_id, request_id, kind);
            return Err(err.into());
        }
        Ok(())
    }

    /// Answer a surfaced approval request.
    pub async fn respond_to_approval(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        decision: ApprovalDecision,
    ) -> Result<(), DispatchError> {
        self.respond(
            workspace_id,
            request_id,
            PendingKind::Approval,
            decision.to_response(),
        )
        .await
    }

    /// Answer a surfaced user-input request.
    pub async fn respond_to_user_input(
        &self,
        workspace_id: &WorkspaceId,
        request_id: &RequestId,
        response: &UserInputResponse,
    ) -> Result<(), DispatchError> {
        self.respond(
            workspace_id,
            request_id,
            PendingKind::UserInput,
            response.to_response(),
        )
        .await
    }

    /// Number of surfaced requests still awaiting a response.
    pub fn pending_request_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Replace a workspace's auto-accept prefixes.
    pub fn set_auto_accept(&self, workspace_id: &WorkspaceId, prefixes: Vec<Vec<String>>) {
        self.shared
            .allowlist
            .lock()
            .set(workspace_id.clone(), prefixes);
    }

    /// Add one auto-accept prefix ("always allow"). Returns `false` if it was
    /// empty or already present.
    pub fn remember_auto_accept(&self, workspace_id: &WorkspaceId, prefix: Vec<String>) -> bool {
        self.shared
            .allowlist
            .lock()
            .remember(workspace_id.clone(), prefix)
    }

    /// Deliver buffered deltas now.
    pub fn flush_deltas(&self) {
        self.shared.coalescer.flush();
    }

    /// A workspace lost its connection: deliver buffered deltas and forget
    /// its unanswered requests.
    pub fn workspace_disconnected(&self, workspace_id: &WorkspaceId) {
        self.flush_deltas();
        self.shared
            .pending
            .lock()
            .retain(|(ws, _), _| ws != workspace_id);
        debug!(%workspace_id, "workspace disconnected, pending requests dropped");
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch_supported(&self, envelope: &NotificationEnvelope) {
        use AppServerMethod as M;

        let workspace_id = &envelope.workspace_id;
        let params = &envelope.params;

        // boundary events see every earlier delta first
        if matches!(envelope.method, M::ItemCompleted | M::TurnCompleted) {
            self.flush_deltas();
        }

        let handlers = self.handlers();
        match &envelope.method {
            M::CodexConnected => handlers.on_connected(&workspace_event(envelope)),
            M::AccountUpdated => handlers.on_account_updated(&workspace_event(envelope)),
            M::AccountRateLimitsUpdated => {
                handlers.on_rate_limits_updated(&workspace_event(envelope));
            }
            M::AccountLoginCompleted => handlers.on_login_completed(&workspace_event(envelope)),
            M::Error => handlers.on_error(&error_event(envelope)),

            M::CodexBackgroundThread => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_background_thread(&e);
                }
            }
            M::ThreadStarted => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_started(&e);
                }
            }
            M::ThreadNameUpdated => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_name_updated(&e);
                }
            }
            M::ThreadArchived => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_archived(&e);
                }
            }
            M::ThreadUnarchived => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_unarchived(&e);
                }
            }
            M::ThreadClosed => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_closed(&e);
                }
            }
            M::ThreadStatusChanged => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_status_changed(&e);
                }
            }
            M::ThreadLiveAttached => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_live_attached(&e);
                }
            }
            M::ThreadLiveDetached => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_live_detached(&e);
                }
            }
            M::ThreadLiveHeartbeat => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_thread_live_heartbeat(&e);
                }
            }
            M::ThreadTokenUsageUpdated => {
                if let Some(e) = thread_event(envelope) {
                    let token_usage = params
                        .get("tokenUsage")
                        .or_else(|| params.get("token_usage"))
                        .or_else(|| params.get("info"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    handlers.on_token_usage_updated(&TokenUsageEvent {
                        workspace_id: e.workspace_id,
                        thread_id: e.thread_id,
                        token_usage,
                    });
                }
            }

            M::TurnStarted => {
                if let Some(e) = turn_event(envelope) {
                    handlers.on_turn_started(&e);
                }
            }
            M::TurnCompleted => {
                if let Some(e) = turn_event(envelope) {
                    handlers.on_turn_completed(&e);
                }
            }
            M::TurnPlanUpdated => {
                if let Some(e) = turn_event(envelope) {
                    handlers.on_turn_plan_updated(&e);
                }
            }
            M::TurnDiffUpdated => {
                if let Some(e) = turn_event(envelope) {
                    handlers.on_turn_diff_updated(&e);
                }
            }

            M::ItemStarted => {
                if let Some(e) = item_event(envelope) {
                    handlers.on_item_started(&e);
                }
            }
            M::ItemCompleted => {
                if let Some(e) = item_event(envelope) {
                    handlers.on_item_completed(&e);
                }
            }
            M::ReasoningSummaryPartAdded => {
                if let Some(e) = item_event(envelope) {
                    handlers.on_reasoning_summary_part_added(&e);
                }
            }
            M::CommandExecutionTerminalInteraction => {
                if let Some(e) = item_event(envelope) {
                    handlers.on_terminal_interaction(&e);
                }
            }

            M::AgentMessageDelta => {
                if let Some(d) = text_delta(envelope) {
                    self.shared.coalescer.enqueue(d);
                }
            }
            M::ReasoningSummaryTextDelta => {
                if let Some(d) = text_delta(envelope) {
                    handlers.on_reasoning_summary_delta(&d);
                }
            }
            M::ReasoningTextDelta => {
                if let Some(d) = text_delta(envelope) {
                    handlers.on_reasoning_text_delta(&d);
                }
            }
            M::PlanDelta => {
                if let Some(d) = text_delta(envelope) {
                    handlers.on_plan_delta(&d);
                }
            }
            M::CommandExecutionOutputDelta => {
                if let Some(d) = text_delta(envelope) {
                    handlers.on_command_output_delta(&d);
                }
            }
            M::FileChangeOutputDelta => {
                if let Some(d) = text_delta(envelope) {
                    handlers.on_file_change_output_delta(&d);
                }
            }

            M::ToolRequestUserInput => match UserInputRequest::from_envelope(envelope) {
                Some(request) => {
                    self.register(workspace_id, &request.request_id, PendingKind::UserInput);
                    handlers.on_user_input_request(&request);
                }
                None => debug!(%workspace_id, "user-input request without id dropped"),
            },

            M::ModelRerouted => {
                if let Some(e) = thread_event(envelope) {
                    handlers.on_model_rerouted(&ModelReroutedEvent {
                        workspace_id: e.workspace_id,
                        thread_id: e.thread_id,
                        from_model: fields::string_field(params, &["fromModel", "from_model"]),
                        to_model: fields::string_field(params, &["toModel", "to_model"]),
                        reason: fields::string_field(params, &["reason"]),
                    });
                }
            }

            M::RequestApproval(_) | M::Other(_) => {}
        }
    }
}

fn workspace_event(envelope: &NotificationEnvelope) -> WorkspaceEvent {
    WorkspaceEvent {
        workspace_id: envelope.workspace_id.clone(),
        params: envelope.params.clone(),
    }
}

fn thread_event(envelope: &NotificationEnvelope) -> Option<ThreadEvent> {
    let Some(thread_id) = envelope.thread_id() else {
        debug!(method = %envelope.method, "notification without thread id dropped");
        return None;
    };
    Some(ThreadEvent {
        workspace_id: envelope.workspace_id.clone(),
        thread_id,
        params: envelope.params.clone(),
    })
}

fn turn_event(envelope: &NotificationEnvelope) -> Option<TurnEvent> {
    let thread = thread_event(envelope)?;
    Some(TurnEvent {
        workspace_id: thread.workspace_id,
        thread_id: thread.thread_id,
        turn_id: envelope.turn_id(),
        params: thread.params,
    })
}

fn item_event(envelope: &NotificationEnvelope) -> Option<ItemEvent> {
    let thread = thread_event(envelope)?;
    let item = fields::object_field(&envelope.params, &["item"])
        .cloned()
        .unwrap_or_default();
    Some(ItemEvent {
        workspace_id: thread.workspace_id,
        thread_id: thread.thread_id,
        turn_id: envelope.turn_id(),
        item_id: envelope.item_id(),
        item,
        params: thread.params,
    })
}

fn text_delta(envelope: &NotificationEnvelope) -> Option<TextDelta> {
    let thread_id = envelope.thread_id()?;
    let Some(item_id) = envelope.item_id() else {
        debug!(method = %envelope.method, "delta without item id dropped");
        return None;
    };
    let text = fields::delta_text(&envelope.params).unwrap_or_default();
    Some(TextDelta {
        workspace_id: envelope.workspace_id.clone(),
        thread_id,
        item_id,
        turn_id: envelope.turn_id(),
        text,
    })
}

fn error_event(envelope: &NotificationEnvelope) -> ErrorEvent {
    let params = &envelope.params;
    let nested = fields::object_field(params, &["error"]);
    let message = nested
        .and_then(|e| fields::string_field(e, &["message"]))
        .or_else(|| fields::string_field(params, &["message"]))
        .unwrap_or_default();
    ErrorEvent {
        workspace_id: envelope.workspace_id.clone(),
        thread_id: envelope.thread_id(),
        turn_id: envelope.turn_id(),
        message,
        will_retry: fields::bool_field(params, &["willRetry", "will_retry"]).unwrap_or(false),
        params: params.clone(),
    }
}

/// A dispatcher attached to the transport stream.
///
/// Dropping it detaches without flushing; prefer
/// [`unsubscribe`](Self::unsubscribe).
pub struct DispatcherSubscription {
    dispatcher: EventDispatcher,
    task: JoinHandle<()>,
}

impl DispatcherSubscription {
    /// The attached dispatcher (for responses, allowlist, handler swaps).
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Replace the handler set without resubscribing.
    pub fn set_handlers(&self, handlers: Arc<dyn AppServerHandlers>) {
        self.dispatcher.set_handlers(handlers);
    }

    /// Stop routing and deliver any buffered deltas.
    pub fn unsubscribe(self) {
        self.task.abort();
        self.dispatcher.flush_deltas();
    }
}

impl Drop for DispatcherSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use beacon_core::TransportError;
    use beacon_core::test_utils::{ManualClock, RecordingTransport};
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
        deltas: Mutex<Vec<TextDelta>>,
        approvals: Mutex<Vec<ApprovalRequest>>,
        inputs: Mutex<Vec<UserInputRequest>>,
        unsupported: Mutex<Vec<String>>,
        errors: Mutex<Vec<ErrorEvent>>,
    }

    impl Recorder {
        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }
    }

    impl AppServerHandlers for Recorder {
        fn on_thread_started(&self, event: &ThreadEvent) {
            self.log.lock().push(format!("thread_started:{}", event.thread_id));
        }

        fn on_turn_completed(&self, event: &TurnEvent) {
            self.log.lock().push(format!("turn_completed:{}", event.thread_id));
        }

        fn on_item_completed(&self, event: &ItemEvent) {
            let item = event.item_id.clone().unwrap_or_default();
            self.log.lock().push(format!("item_completed:{item}"));
        }

        fn on_agent_message_delta(&self, delta: &TextDelta) {
            self.log.lock().push(format!("delta:{}", delta.text));
            self.deltas.lock().push(delta.clone());
        }

        fn on_command_output_delta(&self, delta: &TextDelta) {
            self.log.lock().push(format!("output:{}", delta.text));
        }

        fn on_approval_request(&self, request: &ApprovalRequest) {
            self.approvals.lock().push(request.clone());
        }

        fn on_user_input_request(&self, request: &UserInputRequest) {
            self.inputs.lock().push(request.clone());
        }

        fn on_unsupported_method(&self, event: &UnsupportedMethodEvent) {
            self.unsupported.lock().push(event.method.clone());
        }

        fn on_error(&self, event: &ErrorEvent) {
            self.errors.lock().push(event.clone());
        }
    }

    struct Fixture {
        transport: Arc<RecordingTransport>,
        recorder: Arc<Recorder>,
        clock: Arc<ManualClock>,
        dispatcher: EventDispatcher,
    }

    fn fixture_with(config: DispatcherConfig) -> Fixture {
        let transport = Arc::new(RecordingTransport::new());
        let recorder = Arc::new(Recorder::default());
        let clock = Arc::new(ManualClock::new());
        let dispatcher = EventDispatcher::new(
            transport.clone(),
            recorder.clone(),
            DispatcherConfig {
                clock: clock.clone(),
                ..config
            },
        );
        Fixture {
            transport,
            recorder,
            clock,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(DispatcherConfig::default())
    }

    async fn send(f: &Fixture, message: Value) {
        f.dispatcher
            .route(&RawAppServerEvent::new("ws", message))
            .await;
    }

    fn ws() -> WorkspaceId {
        WorkspaceId::from("ws")
    }

    fn approval(id: i64, command: Value) -> Value {
        json!({
            "id": id,
            "method": "item/commandExecution/requestApproval",
            "params": { "threadId": "t", "itemId": "call-1", "command": command }
        })
    }

    #[tokio::test]
    async fn allowlisted_command_is_auto_accepted() {
        let mut auto_accept = BTreeMap::new();
        let _ = auto_accept.insert("ws".to_owned(), vec![vec!["git".to_owned(), "status".to_owned()]]);
        let f = fixture_with(DispatcherConfig {
            auto_accept,
            ..DispatcherConfig::default()
        });

        send(&f, approval(1, json!(["git", "status"]))).await;

        let responses = f.transport.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, ws());
        assert_eq!(responses[0].1, RequestId::from(1));
        assert_eq!(responses[0].2, json!({"decision": "accept"}));
        assert!(f.recorder.approvals.lock().is_empty());
        assert_eq!(f.dispatcher.pending_request_count(), 0);
    }

    #[tokio::test]
    async fn allowlist_is_prefix_not_fuzzy() {
        let f = fixture();
        f.dispatcher
            .set_auto_accept(&ws(), vec![vec!["git".into(), "status".into()]]);

        send(&f, approval(1, json!(["git", "stash"]))).await;
        send(&f, approval(2, json!(["git"]))).await;
        send(&f, approval(3, json!("bash -lc 'git status --short'"))).await;

        assert_eq!(f.recorder.approvals.lock().len(), 2);
        let responses = f.transport.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].1, RequestId::from(3));
    }

    #[tokio::test]
    async fn surfaced_approval_is_answered_once() {
        let f = fixture();
        send(&f, approval(7, json!(["rm", "-rf", "build"]))).await;

        let surfaced = f.recorder.approvals.lock().clone();
        assert_eq!(surfaced.len(), 1);
        assert_eq!(surfaced[0].command, vec!["rm", "-rf", "build"]);
        assert_eq!(f.dispatcher.pending_request_count(), 1);

        f.dispatcher
            .respond_to_approval(&ws(), &RequestId::from(7), ApprovalDecision::Decline)
            .await
            .unwrap();
        assert_eq!(f.transport.responses()[0].2, json!({"decision": "decline"}));

        let again = f
            .dispatcher
            .respond_to_approval(&ws(), &RequestId::from(7), ApprovalDecision::Accept)
            .await;
        assert_matches!(again, Err(DispatchError::UnknownRequest { .. }));
        assert_eq!(f.transport.responses().len(), 1);
    }

    #[tokio::test]
    async fn response_kind_must_match_request_kind() {
        let f = fixture();
        send(&f, approval(1, json!(["make"]))).await;

        let result = f
            .dispatcher
            .respond_to_user_input(&ws(), &RequestId::from(1), &UserInputResponse::new())
            .await;
        assert_matches!(result, Err(DispatchError::UnknownRequest { .. }));
        assert!(f.transport.calls().is_empty());
        assert_eq!(f.dispatcher.pending_request_count(), 1);
    }

    #[tokio::test]
    async fn failed_response_stays_answerable() {
        let f = fixture();
        send(&f, approval(1, json!(["make"]))).await;
        f.transport.fail_next_respond(TransportError::Closed);

        let first = f
            .dispatcher
            .respond_to_approval(&ws(), &RequestId::from(1), ApprovalDecision::Accept)
            .await;
        assert_matches!(first, Err(DispatchError::Transport(TransportError::Closed)));
        assert_eq!(f.dispatcher.pending_request_count(), 1);

        f.dispatcher
            .respond_to_approval(&ws(), &RequestId::from(1), ApprovalDecision::Accept)
            .await
            .unwrap();
        assert_eq!(f.dispatcher.pending_request_count(), 0);
    }

    #[tokio::test]
    async fn user_input_questions_are_normalized() {
        let f = fixture();
        send(
            &f,
            json!({
                "id": "req-9",
                "method": "item/tool/requestUserInput",
                "params": {
                    "threadId": "t",
                    "questions": [{ "id": "", "question": "Pick one" }]
                }
            }),
        )
        .await;

        let inputs = f.recorder.inputs.lock().clone();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].questions.is_empty());

        let response = UserInputResponse::new().answer("q1", ["yes"]);
        f.dispatcher
            .respond_to_user_input(&ws(), &RequestId::from("req-9"), &response)
            .await
            .unwrap();
        assert_eq!(f.transport.responses()[0].2, response.to_response());
    }

    #[tokio::test]
    async fn unsupported_warning_is_throttled() {
        let f = fixture();
        send(&f, json!({"method": "brand/newThing"})).await;
        send(&f, json!({"method": "brand/otherThing"})).await;
        assert_eq!(*f.recorder.unsupported.lock(), vec!["brand/newThing"]);

        f.clock.advance(DEFAULT_WARNING_COOLDOWN);
        send(&f, json!({"method": "brand/otherThing"})).await;
        assert_eq!(f.recorder.unsupported.lock().len(), 2);
    }

    #[tokio::test]
    async fn passthrough_methods_are_silent() {
        let f = fixture_with(DispatcherConfig {
            extra_passthrough: vec!["vendor/telemetry".into()],
            ..DispatcherConfig::default()
        });
        send(&f, json!({"method": "thread/compacted", "params": {"threadId": "t"}})).await;
        send(&f, json!({"method": "vendor/telemetry"})).await;

        assert!(f.recorder.unsupported.lock().is_empty());
        assert!(f.recorder.log().is_empty());
    }

    #[tokio::test]
    async fn malformed_records_are_dropped() {
        let f = fixture();
        send(&f, json!("not an object")).await;
        send(&f, json!({"params": {}})).await;
        send(&f, json!({"method": "  "})).await;

        assert!(f.recorder.log().is_empty());
        assert!(f.recorder.unsupported.lock().is_empty());
    }

    #[tokio::test]
    async fn thread_events_need_a_thread_id() {
        let f = fixture();
        send(&f, json!({"method": "thread/started", "params": {}})).await;
        send(&f, json!({"method": "thread/started", "params": {"thread": {"id": "t2"}}})).await;
        assert_eq!(f.recorder.log(), vec!["thread_started:t2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn boundary_events_flush_buffered_deltas_first() {
        let f = fixture();
        let delta = |text: &str| {
            json!({
                "method": "item/agentMessage/delta",
                "params": { "threadId": "t", "itemId": "i", "delta": text }
            })
        };
        send(&f, delta("Hel")).await;
        send(&f, delta("lo")).await;
        assert!(f.recorder.log().is_empty());

        send(
            &f,
            json!({"method": "item/completed", "params": {"threadId": "t", "item": {"id": "i"}}}),
        )
        .await;
        assert_eq!(f.recorder.log(), vec!["delta:Hello", "item_completed:i"]);

        send(&f, delta("!")).await;
        send(&f, json!({"method": "turn/completed", "params": {"threadId": "t"}})).await;
        assert_eq!(
            f.recorder.log()[2..],
            ["delta:!".to_owned(), "turn_completed:t".to_owned()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn agent_deltas_coalesce_but_output_deltas_do_not() {
        let f = fixture();
        for text in ["a", "b"] {
            send(
                &f,
                json!({
                    "method": "item/commandExecution/outputDelta",
                    "params": { "threadId": "t", "itemId": "c", "delta": text }
                }),
            )
            .await;
            send(
                &f,
                json!({
                    "method": "item/agentMessage/delta",
                    "params": { "threadId": "t", "itemId": "m", "delta": text }
                }),
            )
            .await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.recorder.log(), vec!["output:a", "output:b", "delta:ab"]);
    }

    #[tokio::test]
    async fn error_message_prefers_nested_error() {
        let f = fixture();
        send(
            &f,
            json!({
                "method": "error",
                "params": {
                    "threadId": "t",
                    "error": { "message": "rate limited" },
                    "message": "outer",
                    "will_retry": true
                }
            }),
        )
        .await;
        let errors = f.recorder.errors.lock().clone();
        assert_eq!(errors[0].message, "rate limited");
        assert!(errors[0].will_retry);
        assert_eq!(errors[0].thread_id.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn disconnect_forgets_pending_requests() {
        let f = fixture();
        send(&f, approval(1, json!(["make"]))).await;
        f.dispatcher
            .route(&RawAppServerEvent::new("other", approval(2, json!(["make"]))))
            .await;
        assert_eq!(f.dispatcher.pending_request_count(), 2);

        f.dispatcher.workspace_disconnected(&ws());
        assert_eq!(f.dispatcher.pending_request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscription_routes_and_swaps_handlers_in_place() {
        let transport = Arc::new(RecordingTransport::new());
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let subscription =
            EventDispatcher::subscribe(transport.clone(), first.clone(), DispatcherConfig::default());

        let started = |id: &str| json!({"method": "thread/started", "params": {"threadId": id}});
        assert_eq!(transport.emit_message("ws", started("a")), 1);
        tokio::time::sleep(Duration::from_millis(1)).await;

        subscription.set_handlers(second.clone());
        assert_eq!(transport.emit_message("ws", started("b")), 1);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(first.log(), vec!["thread_started:a"]);
        assert_eq!(second.log(), vec!["thread_started:b"]);

        subscription.unsubscribe();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(transport.emit_message("ws", started("c")), 0);
    }

    #[tokio::test]
    async fn lagging_delivers_buffered_deltas() {
        let transport = Arc::new(RecordingTransport::new());
        let recorder = Arc::new(Recorder::default());
        let subscription = EventDispatcher::subscribe(
            transport.clone(),
            recorder.clone(),
            DispatcherConfig {
                flush_interval: Duration::from_secs(60),
                ..DispatcherConfig::default()
            },
        );

        let _ = transport.emit_message(
            "ws",
            json!({
                "method": "item/agentMessage/delta",
                "params": { "threadId": "t", "itemId": "i", "delta": "Hello" }
            }),
        );
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(recorder.log().is_empty());

        // overrun the channel before the dispatcher gets to run again
        for n in 0..1100 {
            let _ = transport.emit_message(
                "ws",
                json!({"method": "thread/started", "params": {"threadId": format!("t{n}")}}),
            );
        }
        for _ in 0..100 {
            if !recorder.log().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(recorder.log().first().map(String::as_str), Some("delta:Hello"));
        subscription.unsubscribe();
    }

    #[test]
    fn config_from_settings() {
        let settings = DispatcherSettings {
            delta_flush_interval_ms: 33,
            unsupported_warning_cooldown_ms: 1_000,
            passthrough_methods: vec!["x/y".into()],
            ..DispatcherSettings::default()
        };
        let config = DispatcherConfig::from(&settings);
        assert_eq!(config.flush_interval, Duration::from_millis(33));
        assert_eq!(config.warning_cooldown, Duration::from_secs(1));
        assert_eq!(config.extra_passthrough, vec!["x/y"]);
    }
}
