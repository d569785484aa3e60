//! Liveness states and the rules that pick one without a notification.

use std::fmt;

use beacon_settings::BackendMode;
use serde::{Deserialize, Serialize};

/// Whether a thread is receiving real-time pushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// A push for this thread arrived recently.
    Live,
    /// Subscribed, nothing pushed recently. Normal while connected.
    Polling,
    /// No subscription, no workspace connection, or window inactive.
    Disconnected,
}

impl ConnectionState {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Polling => "polling",
            Self::Disconnected => "disconnected",
        }
    }

    /// State of a thread nobody has reconnected yet.
    pub fn initial(mode: BackendMode, workspace_connected: bool) -> Self {
        match mode {
            BackendMode::Local => Self::Live,
            BackendMode::Remote if workspace_connected => Self::Polling,
            BackendMode::Remote => Self::Disconnected,
        }
    }

    /// Safe state after a failed or withdrawn subscription.
    pub fn reconciled(mode: BackendMode, workspace_connected: bool, window_active: bool) -> Self {
        match mode {
            BackendMode::Local => Self::Live,
            BackendMode::Remote if workspace_connected && window_active => Self::Polling,
            BackendMode::Remote => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
