//! Monotonic time source.
//!
//! TTL expiry and warning cooldowns read time through [`Clock`] so tests can
//! step time explicitly instead of sleeping.

use std::time::Instant;

/// Source of monotonic "now".
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall-clock implementation backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Reads tokio's clock, so paused-time tests (`start_paused`) control it.
///
/// Outside a runtime this falls back to the system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
