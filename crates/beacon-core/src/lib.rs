//! # beacon-core
//!
//! Foundation types shared by every Beacon crate.
//!
//! Beacon is the client half of the app-server push protocol: the app server
//! streams JSON-RPC-like notifications (thread/turn lifecycle, streaming text
//! deltas, approval and user-input requests, account state) over a single
//! multiplexed channel, and Beacon turns that stream into typed handler calls
//! and per-thread liveness state.
//!
//! This crate provides the shared vocabulary:
//!
//! - **Branded IDs**: `WorkspaceId`, `ThreadId`, `TurnId`, `ItemId` newtypes
//!   and the [`SubscriptionKey`] pair
//! - **Wire primitives**: [`RequestId`] and the raw inbound record
//!   [`RawAppServerEvent`]
//! - **Transport seam**: the [`AppServerTransport`] trait implemented by the
//!   IPC/network layer that actually moves bytes
//! - **Time**: the [`Clock`] trait so TTL and cooldown logic is testable
//! - **Errors**: [`TransportError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use clock::{Clock, SystemClock, TokioClock};
pub use errors::TransportError;
pub use ids::{ItemId, SubscriptionKey, ThreadId, TurnId, WorkspaceId};
pub use transport::{AppServerTransport, RawAppServerEvent, RequestId};
