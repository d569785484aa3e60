//! Structured logging with `tracing`.
//!
//! Components log with field-style events (`workspace_id`, `thread_id`,
//! `method`) and wrap the reconnect path and the stream loops in spans.
//! The host application installs a subscriber once at startup via
//! [`init_subscriber`].

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` wins when set; otherwise `level` (e.g. `"warn"`,
/// `"beacon_events=debug"`) is used as the filter directive. Subsequent
/// calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init fails if a global subscriber is already installed
    let _ = subscriber.try_init();
}

/// Initialize the global subscriber emitting one JSON object per event.
///
/// Intended for hosts that ship logs to a collector. Same filter rules as
/// [`init_subscriber`].
pub fn init_json_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}
