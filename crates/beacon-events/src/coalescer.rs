//! Streaming-text coalescing.
//!
//! Fragments for the same `workspace:thread:item` key are concatenated
//! and delivered once per flush window. The first enqueue after a flush
//! arms a single timer; [`DeltaCoalescer::flush`] delivers immediately and
//! disarms it. Delivery happens under a reentrant lock, so a timer flush
//! and a forced flush never interleave their output for the same key.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::events::TextDelta;

/// Receives merged deltas.
pub type DeltaSink = Arc<dyn Fn(TextDelta) + Send + Sync>;

/// Default flush window, roughly one animation frame.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Default)]
struct State {
    pending: IndexMap<String, TextDelta>,
    timer: Option<JoinHandle<()>>,
    timer_seq: u64,
}

struct Inner {
    interval: Duration,
    state: Mutex<State>,
    delivery: ReentrantMutex<()>,
    sink: DeltaSink,
}

/// Buffers and merges streaming text fragments.
#[derive(Clone)]
pub struct DeltaCoalescer {
    inner: Arc<Inner>,
}

impl DeltaCoalescer {
    /// Create a coalescer delivering merged deltas to `sink`.
    pub fn new(interval: Duration, sink: DeltaSink) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval,
                state: Mutex::new(State::default()),
                delivery: ReentrantMutex::new(()),
                sink,
            }),
        }
    }

    /// Buffer a fragment, merging with any pending text for the same key.
    ///
    /// Outside a tokio runtime there is no timer, so the fragment is
    /// delivered immediately.
    pub fn enqueue(&self, delta: TextDelta) {
        let key = delta.key();
        let mut state = self.inner.state.lock();
        match state.pending.get_mut(&key) {
            Some(existing) => {
                existing.text.push_str(&delta.text);
                if delta.turn_id.as_deref().is_some_and(|t| !t.is_empty()) {
                    existing.turn_id = delta.turn_id;
                }
            }
            None => {
                let _ = state.pending.insert(key, delta);
            }
        }
        if state.timer.is_some() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            drop(state);
            self.flush();
            return;
        };
        state.timer_seq += 1;
        let seq = state.timer_seq;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(handle.spawn(async move {
            tokio::time::sleep(inner.interval).await;
            inner.deliver(Some(seq));
        }));
    }

    /// Deliver everything pending now and disarm the timer.
    pub fn flush(&self) {
        self.inner.deliver(None);
    }

    /// Number of keys with buffered text.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Flush window.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

impl Inner {
    /// `timer_seq` is `Some` when called from the timer task; a stale timer
    /// (already disarmed by a forced flush) does nothing.
    fn deliver(&self, timer_seq: Option<u64>) {
        let _delivery = self.delivery.lock();
        let batch = {
            let mut state = self.state.lock();
            match timer_seq {
                Some(seq) if seq != state.timer_seq || state.timer.is_none() => return,
                Some(_) => drop(state.timer.take()),
                None => {
                    if let Some(timer) = state.timer.take() {
                        timer.abort();
                    }
                }
            }
            std::mem::take(&mut state.pending)
        };
        if batch.is_empty() {
            return;
        }
        trace!(keys = batch.len(), forced = timer_seq.is_none(), "flushing deltas");
        for (_, delta) in batch {
            (self.sink)(delta);
        }
    }
}
