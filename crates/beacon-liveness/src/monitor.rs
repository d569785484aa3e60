//! Per-thread connection liveness.
//!
//! Every tracked `(workspace, thread)` key has a slot holding its
//! state, whether it is subscribed, and the generation of the reconnect that
//! last claimed it. Each `reconnect` takes a fresh generation from one
//! monotonic counter and re-checks it after every await; a strictly later
//! reconnect (or an unsubscribe) therefore makes every earlier in-flight
//! attempt a no-op. Superseded attempts still run to completion, their
//! results are just discarded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use beacon_core::{AppServerTransport, RawAppServerEvent, SubscriptionKey, ThreadId, WorkspaceId};
use beacon_protocol::{AppServerMethod, NotificationEnvelope, normalize_event};
use beacon_settings::BackendMode;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::collaborators::{ThreadResumer, WorkspaceReconnector};
use crate::errors::LivenessError;
use crate::state::ConnectionState;

/// Options for [`LivenessMonitor::reconnect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Fetch the thread's latest state before subscribing.
    pub run_resume: bool,
}

impl ReconnectOptions {
    /// Skip the resume side effect (the backend just reconnected, so the
    /// thread is already fresh).
    pub const NO_RESUME: Self = Self { run_resume: false };
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self { run_resume: true }
    }
}

/// Optional host side effects used by `reconnect`.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Reconnects a disconnected workspace before subscribing.
    pub reconnector: Option<Arc<dyn WorkspaceReconnector>>,
    /// Refreshes thread state before subscribing.
    pub resumer: Option<Arc<dyn ThreadResumer>>,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u64,
    state: ConnectionState,
    subscribed: bool,
}

struct Tracker {
    slots: HashMap<SubscriptionKey, Slot>,
    connected: HashSet<WorkspaceId>,
    active: Option<SubscriptionKey>,
    background: Vec<SubscriptionKey>,
    visible: bool,
    focused: bool,
    next_generation: u64,
}

impl Tracker {
    fn window_active(&self) -> bool {
        self.visible && self.focused
    }

    fn is_connected(&self, workspace_id: &WorkspaceId) -> bool {
        self.connected.contains(workspace_id)
    }

    fn is_current(&self, key: &SubscriptionKey, generation: u64) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.generation == generation)
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn tracked(&self) -> impl Iterator<Item = &SubscriptionKey> {
        self.active.iter().chain(self.background.iter())
    }
}

struct Inner {
    transport: Arc<dyn AppServerTransport>,
    collaborators: Collaborators,
    mode: BackendMode,
    tracker: Mutex<Tracker>,
    active_state: watch::Sender<ConnectionState>,
}

impl Inner {
    fn state_of(&self, t: &Tracker, key: &SubscriptionKey) -> ConnectionState {
        t.slots.get(key).map_or_else(
            || ConnectionState::initial(self.mode, t.is_connected(&key.workspace_id)),
            |slot| slot.state,
        )
    }

    /// A push can only confirm a subscription that exists, on a connected
    /// workspace, while the window is active.
    fn may_go_live(t: &Tracker, key: &SubscriptionKey) -> bool {
        t.slots.get(key).is_some_and(|slot| slot.subscribed)
            && t.window_active()
            && t.is_connected(&key.workspace_id)
    }

    fn reconciled(&self, t: &Tracker, key: &SubscriptionKey) -> ConnectionState {
        ConnectionState::reconciled(
            self.mode,
            t.is_connected(&key.workspace_id),
            t.window_active(),
        )
    }

    fn slot_mut<'a>(&self, t: &'a mut Tracker, key: &SubscriptionKey) -> &'a mut Slot {
        let initial = ConnectionState::initial(self.mode, t.is_connected(&key.workspace_id));
        t.slots.entry(key.clone()).or_insert(Slot {
            generation: 0,
            state: initial,
            subscribed: false,
        })
    }

    fn set_state(&self, t: &mut Tracker, key: &SubscriptionKey, state: ConnectionState) {
        let slot = self.slot_mut(t, key);
        let previous = slot.state;
        slot.state = state;
        if previous != state {
            debug!(key = %key, from = %previous, to = %state, "liveness transition");
        }
        self.publish(t);
    }

    fn publish(&self, t: &Tracker) {
        let state = t.active.as_ref().map_or_else(
            || ConnectionState::initial(self.mode, false),
            |key| self.state_of(t, key),
        );
        let _ = self.active_state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Reconcile after a failed step. Returns `false` if the attempt was
    /// already superseded, in which case nothing is touched.
    fn settle_failure(&self, key: &SubscriptionKey, generation: u64) -> bool {
        let mut t = self.tracker.lock();
        if !t.is_current(key, generation) {
            return false;
        }
        let state = self.reconciled(&t, key);
        self.slot_mut(&mut t, key).subscribed = false;
        self.set_state(&mut t, key, state);
        true
    }
}

/// Tracks whether each thread is receiving live pushes and keeps the
/// server-side subscriptions in line with what the user is looking at.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LivenessMonitor {
    inner: Arc<Inner>,
}

impl LivenessMonitor {
    /// Create a monitor. The window starts visible and focused, and no
    /// workspace is connected until told otherwise.
    pub fn new(
        transport: Arc<dyn AppServerTransport>,
        mode: BackendMode,
        collaborators: Collaborators,
    ) -> Self {
        let (active_state, _) = watch::channel(ConnectionState::initial(mode, false));
        Self {
            inner: Arc::new(Inner {
                transport,
                collaborators,
                mode,
                tracker: Mutex::new(Tracker {
                    slots: HashMap::new(),
                    connected: HashSet::new(),
                    active: None,
                    background: Vec::new(),
                    visible: true,
                    focused: true,
                    next_generation: 0,
                }),
                active_state,
            }),
        }
    }

    /// Backend mode this monitor was built for.
    pub fn mode(&self) -> BackendMode {
        self.inner.mode
    }

    /// State of the active thread.
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.active_state.borrow()
    }

    /// Receiver that observes every change of [`connection_state`](Self::connection_state).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.active_state.subscribe()
    }

    /// State of any thread, tracked or not.
    pub fn thread_state(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> ConnectionState {
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id.clone());
        let t = self.inner.tracker.lock();
        self.inner.state_of(&t, &key)
    }

    /// Whether the latest reconnect for this thread ended subscribed.
    pub fn is_subscribed(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) -> bool {
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id.clone());
        self.inner
            .tracker
            .lock()
            .slots
            .get(&key)
            .is_some_and(|slot| slot.subscribed)
    }

    /// (Re)subscribe a thread.
    ///
    /// Resolves to `Ok(true)` when this attempt subscribed, `Ok(false)` when
    /// a later reconnect or unsubscribe superseded it, and `Err` when a step
    /// failed (the thread is then reconciled to polling or disconnected).
    /// In local mode the thread is live immediately and nothing is sent.
    #[instrument(skip_all, fields(workspace_id = %workspace_id, thread_id = %thread_id))]
    pub async fn reconnect(
        &self,
        workspace_id: &WorkspaceId,
        thread_id: &ThreadId,
        options: ReconnectOptions,
    ) -> Result<bool, LivenessError> {
        let inner = &self.inner;
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id.clone());

        let (generation, connected) = {
            let mut t = inner.tracker.lock();
            let generation = t.next_generation();
            let connected = t.is_connected(workspace_id);
            inner.slot_mut(&mut t, &key).generation = generation;
            let state = ConnectionState::initial(inner.mode, connected);
            inner.set_state(&mut t, &key, state);
            (generation, connected)
        };

        if inner.mode == BackendMode::Local {
            return Ok(true);
        }

        if !connected {
            if let Some(reconnector) = inner.collaborators.reconnector.clone() {
                if let Err(source) = reconnector.reconnect_workspace(workspace_id).await {
                    if !inner.settle_failure(&key, generation) {
                        return Ok(false);
                    }
                    warn!(error = %source, "workspace reconnect failed");
                    return Err(LivenessError::WorkspaceReconnect {
                        workspace_id: workspace_id.clone(),
                        source,
                    });
                }
                let mut t = inner.tracker.lock();
                let _ = t.connected.insert(workspace_id.clone());
                if !t.is_current(&key, generation) {
                    debug!("reconnect superseded after workspace reconnect");
                    return Ok(false);
                }
            }
        }

        if options.run_resume {
            if let Some(resumer) = inner.collaborators.resumer.clone() {
                if let Err(source) = resumer.resume_thread(workspace_id, thread_id).await {
                    if !inner.settle_failure(&key, generation) {
                        return Ok(false);
                    }
                    warn!(error = %source, "thread resume failed");
                    return Err(LivenessError::Resume {
                        thread_id: thread_id.clone(),
                        source,
                    });
                }
                if !inner.tracker.lock().is_current(&key, generation) {
                    debug!("reconnect superseded after resume");
                    return Ok(false);
                }
            }
        }

        let result = inner.transport.subscribe_thread(workspace_id, thread_id).await;

        let mut t = inner.tracker.lock();
        if !t.is_current(&key, generation) {
            debug!("reconnect superseded, subscribe result discarded");
            return Ok(false);
        }
        match result {
            Ok(()) => {
                inner.slot_mut(&mut t, &key).subscribed = true;
                inner.set_state(&mut t, &key, ConnectionState::Polling);
                info!("thread subscribed");
                Ok(true)
            }
            Err(err) => {
                let state = inner.reconciled(&t, &key);
                inner.slot_mut(&mut t, &key).subscribed = false;
                inner.set_state(&mut t, &key, state);
                warn!(error = %err, "thread subscribe failed");
                Err(err.into())
            }
        }
    }

    /// Stop live updates for a thread. Failures are logged and swallowed.
    pub async fn unsubscribe(&self, workspace_id: &WorkspaceId, thread_id: &ThreadId) {
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id.clone());
        self.release(&key, false).await;
    }

    /// Withdraw a subscription. `forget` drops the slot entirely; otherwise
    /// it stays tracked as disconnected. Any in-flight reconnect is
    /// superseded either way.
    async fn release(&self, key: &SubscriptionKey, forget: bool) {
        let inner = &self.inner;
        {
            let mut t = inner.tracker.lock();
            if !t.slots.contains_key(key) {
                return;
            }
            if forget {
                let _ = t.slots.remove(key);
                inner.publish(&t);
            } else {
                let generation = t.next_generation();
                let slot = inner.slot_mut(&mut t, key);
                slot.generation = generation;
                slot.subscribed = false;
                let state = ConnectionState::reconciled(inner.mode, false, false);
                inner.set_state(&mut t, key, state);
            }
        }

        if inner.mode == BackendMode::Local {
            return;
        }
        if let Err(err) = inner
            .transport
            .unsubscribe_thread(&key.workspace_id, &key.thread_id)
            .await
        {
            debug!(key = %key, error = %err, "unsubscribe failed, ignoring");
        }
    }

    /// Replace the tracked thread set.
    ///
    /// Threads no longer tracked are unsubscribed and forgotten; newly
    /// tracked ones (or ones whose subscription was lost) are reconnected,
    /// the active thread with a resume, background threads without. While
    /// the window is inactive nothing new is subscribed.
    pub async fn set_threads(
        &self,
        active: Option<SubscriptionKey>,
        background: impl IntoIterator<Item = SubscriptionKey>,
    ) {
        let inner = &self.inner;
        let (removed, to_connect) = {
            let mut t = inner.tracker.lock();
            let previous: Vec<SubscriptionKey> = t.tracked().cloned().collect();

            let mut background_keys: Vec<SubscriptionKey> = Vec::new();
            for key in background {
                if Some(&key) != active.as_ref() && !background_keys.contains(&key) {
                    background_keys.push(key);
                }
            }
            t.active = active;
            t.background = background_keys;

            let now: HashSet<&SubscriptionKey> = t.tracked().collect();
            let removed: Vec<SubscriptionKey> = previous
                .into_iter()
                .filter(|key| !now.contains(key))
                .collect();

            let mut to_connect = Vec::new();
            if t.window_active() {
                for key in t.tracked() {
                    let needs_connect = match t.slots.get(key) {
                        None => true,
                        Some(slot) => inner.mode == BackendMode::Remote && !slot.subscribed,
                    };
                    if needs_connect {
                        let options = if Some(key) == t.active.as_ref() {
                            ReconnectOptions::default()
                        } else {
                            ReconnectOptions::NO_RESUME
                        };
                        to_connect.push((key.clone(), options));
                    }
                }
            }
            inner.publish(&t);
            (removed, to_connect)
        };

        for key in removed {
            self.release(&key, true).await;
        }
        for (key, options) in to_connect {
            if let Err(err) = self
                .reconnect(&key.workspace_id, &key.thread_id, options)
                .await
            {
                warn!(key = %key, error = %err, "reconnect after thread change failed");
            }
        }
    }

    /// Record a workspace's connectivity. On disconnect every slot of that
    /// workspace becomes disconnected and unsubscribed; reconnecting is
    /// driven by the next `codex/connected` notification.
    pub fn set_workspace_connected(&self, workspace_id: &WorkspaceId, connected: bool) {
        let inner = &self.inner;
        let mut t = inner.tracker.lock();
        if connected {
            let _ = t.connected.insert(workspace_id.clone());
            inner.publish(&t);
            return;
        }
        let _ = t.connected.remove(workspace_id);
        let keys: Vec<SubscriptionKey> = t
            .slots
            .keys()
            .filter(|key| &key.workspace_id == workspace_id)
            .cloned()
            .collect();
        for key in keys {
            let generation = t.next_generation();
            let slot = inner.slot_mut(&mut t, &key);
            slot.generation = generation;
            slot.subscribed = false;
            let state = inner.reconciled(&t, &key);
            inner.set_state(&mut t, &key, state);
        }
        inner.publish(&t);
        info!(%workspace_id, "workspace disconnected");
    }

    /// Document visibility changed.
    pub async fn set_visible(&self, visible: bool) {
        self.update_window(|t| t.visible = visible).await;
    }

    /// Window focus changed.
    pub async fn set_focused(&self, focused: bool) {
        self.update_window(|t| t.focused = focused).await;
    }

    async fn update_window(&self, update: impl FnOnce(&mut Tracker)) {
        let (was_active, is_active, active) = {
            let mut t = self.inner.tracker.lock();
            let was_active = t.window_active();
            update(&mut t);
            (was_active, t.window_active(), t.active.clone())
        };
        let Some(key) = active else {
            return;
        };
        match (was_active, is_active) {
            (false, true) => {
                if let Err(err) = self
                    .reconnect(&key.workspace_id, &key.thread_id, ReconnectOptions::default())
                    .await
                {
                    warn!(key = %key, error = %err, "reconnect on window activation failed");
                }
            }
            (true, false) => self.release(&key, false).await,
            _ => {}
        }
    }

    /// Apply one normalized notification.
    ///
    /// Attach and heartbeat make a subscribed thread live; detach reconciles
    /// it. Any activity for the active thread makes it live, provided it is
    /// subscribed, its workspace is connected and the window is active.
    /// Late pushes after an unsubscribe leave the state alone. `turn/completed`
    /// returns it from live to polling. `codex/connected` marks the workspace
    /// connected and, while the document is visible, reconnects its tracked
    /// threads in the background without a resume.
    pub fn observe(&self, envelope: &NotificationEnvelope) {
        let inner = &self.inner;
        if inner.mode == BackendMode::Local {
            return;
        }
        let workspace_id = &envelope.workspace_id;

        if envelope.method == AppServerMethod::CodexConnected {
            self.workspace_came_online(workspace_id);
            return;
        }

        let Some(thread_id) = envelope.thread_id() else {
            return;
        };
        let key = SubscriptionKey::new(workspace_id.clone(), thread_id);
        let mut t = inner.tracker.lock();
        let tracked = t.slots.contains_key(&key);
        let is_active = t.active.as_ref() == Some(&key);

        match &envelope.method {
            AppServerMethod::ThreadLiveAttached | AppServerMethod::ThreadLiveHeartbeat => {
                if Inner::may_go_live(&t, &key) {
                    inner.set_state(&mut t, &key, ConnectionState::Live);
                } else {
                    trace!(key = %key, "live signal without a subscription");
                }
            }
            AppServerMethod::ThreadLiveDetached => {
                if tracked {
                    let state = inner.reconciled(&t, &key);
                    inner.slot_mut(&mut t, &key).subscribed = false;
                    inner.set_state(&mut t, &key, state);
                }
            }
            AppServerMethod::TurnCompleted => {
                if is_active && inner.state_of(&t, &key) == ConnectionState::Live {
                    inner.set_state(&mut t, &key, ConnectionState::Polling);
                }
            }
            method if method.indicates_activity() => {
                if is_active && Inner::may_go_live(&t, &key) {
                    inner.set_state(&mut t, &key, ConnectionState::Live);
                }
            }
            _ => {}
        }
    }

    fn workspace_came_online(&self, workspace_id: &WorkspaceId) {
        let keys: Vec<SubscriptionKey> = {
            let mut t = self.inner.tracker.lock();
            let _ = t.connected.insert(workspace_id.clone());
            self.inner.publish(&t);
            if !t.visible {
                return;
            }
            t.tracked()
                .filter(|key| &key.workspace_id == workspace_id)
                .cloned()
                .collect()
        };
        if keys.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(%workspace_id, "no runtime, skipping reconnect on connect");
            return;
        };
        for key in keys {
            let monitor = self.clone();
            let _ = handle.spawn(async move {
                if let Err(err) = monitor
                    .reconnect(&key.workspace_id, &key.thread_id, ReconnectOptions::NO_RESUME)
                    .await
                {
                    warn!(key = %key, error = %err, "reconnect after backend connect failed");
                }
            });
        }
    }

    /// Unsubscribe everything and forget all tracked threads.
    pub async fn shutdown(&self) {
        let subscribed: Vec<SubscriptionKey> = {
            let mut t = self.inner.tracker.lock();
            let keys = t
                .slots
                .iter()
                .filter(|(_, slot)| slot.subscribed)
                .map(|(key, _)| key.clone())
                .collect();
            t.slots.clear();
            t.active = None;
            t.background.clear();
            self.inner.publish(&t);
            keys
        };
        for key in subscribed {
            if let Err(err) = self
                .inner
                .transport
                .unsubscribe_thread(&key.workspace_id, &key.thread_id)
                .await
            {
                debug!(key = %key, error = %err, "unsubscribe on shutdown failed, ignoring");
            }
        }
    }

    /// Feed the monitor from the transport's raw stream on a background task.
    pub fn spawn_observer(&self) -> LivenessObserver {
        let rx = self.inner.transport.notifications();
        let task = tokio::spawn(self.clone().run_observer(rx));
        LivenessObserver { task }
    }

    #[instrument(skip_all, name = "liveness_observer")]
    async fn run_observer(self, mut rx: broadcast::Receiver<RawAppServerEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(envelope) = normalize_event(&event) {
                        self.observe(&envelope);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "liveness observer lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("notification stream closed, liveness observer exiting");
                    break;
                }
            }
        }
    }
}

/// Handle to the task started by [`LivenessMonitor::spawn_observer`].
/// Dropping it stops the task.
pub struct LivenessObserver {
    task: JoinHandle<()>,
}

impl LivenessObserver {
    /// Stop observing.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for LivenessObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
