//! # beacon-events
//!
//! Turns the raw notification stream into handler calls.
//!
//! - [`EventDispatcher`]: one stream subscription, routing by canonical
//!   method, request/response correlation for approvals and user input,
//!   allowlist auto-accept
//! - [`DeltaCoalescer`]: merges streaming agent-message text per item and
//!   delivers it at most once per flush window
//! - [`WarningThrottle`]: rate limit for the protocol-drift warning
//! - [`AppServerHandlers`]: the caller's callback set, swappable at runtime

#![deny(unsafe_code)]

pub mod coalescer;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod throttle;

pub use coalescer::{DEFAULT_FLUSH_INTERVAL, DeltaCoalescer, DeltaSink};
pub use dispatcher::{DispatcherConfig, DispatcherSubscription, EventDispatcher};
pub use errors::DispatchError;
pub use events::{
    ErrorEvent, ItemEvent, ModelReroutedEvent, TextDelta, ThreadEvent, TokenUsageEvent,
    TurnEvent, UnsupportedMethodEvent, WorkspaceEvent,
};
pub use handlers::{AppServerHandlers, NoopHandlers};
pub use throttle::{DEFAULT_WARNING_COOLDOWN, WarningThrottle};
