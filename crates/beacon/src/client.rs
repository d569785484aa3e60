//! The wired-up client.

use std::hash::Hash;
use std::sync::Arc;

use beacon_cache::{CacheConfig, MemoCache};
use beacon_core::{AppServerTransport, WorkspaceId};
use beacon_events::{AppServerHandlers, DispatcherConfig, DispatcherSubscription, EventDispatcher};
use beacon_liveness::{Collaborators, LivenessMonitor, LivenessObserver};
use beacon_settings::BeaconSettings;
use tracing::info;

/// One dispatcher subscription and one liveness observer over the same
/// transport.
///
/// Both consume the transport's raw stream through their own receiver, so
/// each sees every record in arrival order.
pub struct AppServerClient {
    subscription: DispatcherSubscription,
    liveness: LivenessMonitor,
    observer: LivenessObserver,
    cache_config: CacheConfig,
}

impl AppServerClient {
    /// Start routing with no reconnect collaborators. Must be called inside
    /// a tokio runtime.
    pub fn start(
        transport: Arc<dyn AppServerTransport>,
        handlers: Arc<dyn AppServerHandlers>,
        settings: &BeaconSettings,
    ) -> Self {
        Self::start_with(transport, handlers, settings, Collaborators::default())
    }

    /// Start routing, using `collaborators` for workspace reconnects and
    /// thread resumes.
    pub fn start_with(
        transport: Arc<dyn AppServerTransport>,
        handlers: Arc<dyn AppServerHandlers>,
        settings: &BeaconSettings,
        collaborators: Collaborators,
    ) -> Self {
        let subscription = EventDispatcher::subscribe(
            Arc::clone(&transport),
            handlers,
            DispatcherConfig::from(&settings.dispatcher),
        );
        let liveness =
            LivenessMonitor::new(transport, settings.liveness.backend_mode, collaborators);
        let observer = liveness.spawn_observer();
        info!(backend_mode = ?settings.liveness.backend_mode, "app-server client started");
        Self {
            subscription,
            liveness,
            observer,
            cache_config: CacheConfig::from(&settings.cache),
        }
    }

    /// The dispatcher, for responses and allowlist changes.
    pub fn dispatcher(&self) -> &EventDispatcher {
        self.subscription.dispatcher()
    }

    /// The liveness monitor.
    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Swap the handler set without resubscribing.
    pub fn set_handlers(&self, handlers: Arc<dyn AppServerHandlers>) {
        self.subscription.set_handlers(handlers);
    }

    /// A workspace's app-server connection came up.
    pub fn workspace_connected(&self, workspace_id: &WorkspaceId) {
        self.liveness.set_workspace_connected(workspace_id, true);
    }

    /// A workspace's app-server connection went away: buffered deltas are
    /// delivered, its unanswered requests are dropped, and its threads
    /// become disconnected.
    pub fn workspace_disconnected(&self, workspace_id: &WorkspaceId) {
        self.dispatcher().workspace_disconnected(workspace_id);
        self.liveness.set_workspace_connected(workspace_id, false);
    }

    /// A fresh memo table sized and timed by the `cache` settings, for
    /// per-workspace queries.
    pub fn memo_cache<K, V>(&self) -> MemoCache<K, V>
    where
        K: Hash + Eq + Clone,
        V: Clone,
    {
        MemoCache::new(self.cache_config)
    }

    /// Stop both stream consumers, deliver pending deltas, and unsubscribe
    /// every thread.
    pub async fn shutdown(self) {
        self.observer.stop();
        self.subscription.unsubscribe();
        self.liveness.shutdown().await;
        info!("app-server client stopped");
    }
}
