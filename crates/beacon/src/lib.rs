//! # beacon
//!
//! Client for the app-server push protocol.
//!
//! [`AppServerClient::start`] attaches an event dispatcher and a liveness
//! observer to one [`AppServerTransport`](beacon_core::AppServerTransport):
//!
//! - notifications are normalized and routed to your
//!   [`AppServerHandlers`](beacon_events::AppServerHandlers), with streaming
//!   agent text coalesced per item
//! - approvals matching the per-workspace allowlist are accepted without
//!   reaching a handler; others are answered through
//!   [`EventDispatcher`](beacon_events::EventDispatcher)
//! - per-thread liveness (`live` / `polling` / `disconnected`) is tracked and
//!   subscriptions follow the active thread and window state
//!
//! The types most callers need are re-exported here.

#![deny(unsafe_code)]

pub mod client;
pub mod replay;
pub mod summary;

pub use beacon_core::{AppServerTransport, RawAppServerEvent, RequestId, WorkspaceId};
pub use beacon_events::{AppServerHandlers, EventDispatcher, NoopHandlers};
pub use beacon_liveness::{ConnectionState, LivenessMonitor, ReconnectOptions};
pub use beacon_protocol::{ApprovalDecision, UserInputResponse};
pub use beacon_settings::BeaconSettings;

pub use client::AppServerClient;
pub use replay::{ReplayReport, ReplayTransport, replay};
pub use summary::{LineSink, SummaryHandlers};
