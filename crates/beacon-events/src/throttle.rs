//! Cooldown gate for the protocol-drift warning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_core::Clock;
use parking_lot::Mutex;

/// Default gap between two surfaced warnings.
pub const DEFAULT_WARNING_COOLDOWN: Duration = Duration::from_secs(30);

/// Lets one warning through per cooldown window.
pub struct WarningThrottle {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    last: Mutex<Option<Instant>>,
}

impl WarningThrottle {
    /// Create a throttle reading time from `clock`.
    pub fn new(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown,
            clock,
            last: Mutex::new(None),
        }
    }

    /// Whether a warning may be surfaced now. A `true` result starts a new
    /// cooldown window.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut last = self.last.lock();
        match *last {
            Some(at) if now.saturating_duration_since(at) < self.cooldown => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
