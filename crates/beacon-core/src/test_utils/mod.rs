//! Test doubles shared across the workspace.
//!
//! Enabled with the `test-utils` feature (and always inside this crate's own
//! tests). Nothing here is meant for production wiring.

mod clock;
mod logs;
mod transport;

pub use clock::ManualClock;
pub use logs::{CapturedEvent, CapturedLogs, capture_logs};
pub use transport::{RecordingTransport, SubscribeGate, TransportCall};
