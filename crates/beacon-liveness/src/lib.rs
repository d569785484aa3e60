//! # beacon-liveness
//!
//! Tracks, per `(workspace, thread)`, whether the client is receiving live
//! pushes ([`ConnectionState::Live`]), merely subscribed
//! ([`ConnectionState::Polling`]), or cut off
//! ([`ConnectionState::Disconnected`]), and keeps server-side subscriptions
//! in step with the active thread, window visibility and workspace
//! connectivity.
//!
//! Reconnects are race-safe through a generation counter: see
//! [`LivenessMonitor::reconnect`].

#![deny(unsafe_code)]

pub mod collaborators;
pub mod errors;
pub mod monitor;
pub mod state;

pub use collaborators::{ThreadResumer, WorkspaceReconnector};
pub use errors::LivenessError;
pub use monitor::{Collaborators, LivenessMonitor, LivenessObserver, ReconnectOptions};
pub use state::ConnectionState;
