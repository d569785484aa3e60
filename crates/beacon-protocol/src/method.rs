//! Canonical app-server methods.
//!
//! Raw method strings are decoded once at the boundary into
//! [`AppServerMethod`]; everything downstream matches on variants.

use std::fmt;

use crate::alias::resolve_alias;

/// Suffix shared by every approval-style request method.
pub const APPROVAL_SUFFIX: &str = "requestApproval";

macro_rules! app_server_methods {
    ($( $(#[$doc:meta])* $variant:ident => $wire:literal, )*) => {
        /// A decoded app-server method.
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum AppServerMethod {
            $( $(#[$doc])* $variant, )*
            /// Any method ending in `requestApproval`, routed uniformly.
            RequestApproval(String),
            /// A method outside the supported set (passthrough or unknown).
            Other(String),
        }

        /// Every method the dispatcher routes to a dedicated handler.
        pub const SUPPORTED_METHODS: &[&str] = &[$($wire),*];

        impl AppServerMethod {
            /// The canonical wire spelling.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )*
                    Self::RequestApproval(m) | Self::Other(m) => m,
                }
            }

            fn from_supported(canonical: &str) -> Option<Self> {
                match canonical {
                    $( $wire => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

app_server_methods! {
    /// The backend finished (re)connecting a workspace.
    CodexConnected => "codex/connected",
    /// A background thread produced output.
    CodexBackgroundThread => "codex/backgroundThread",
    /// A turn-level error.
    Error => "error",
    /// Account details changed.
    AccountUpdated => "account/updated",
    /// Rate-limit snapshot changed.
    AccountRateLimitsUpdated => "account/rateLimits/updated",
    /// A login flow finished.
    AccountLoginCompleted => "account/login/completed",
    /// A thread was created.
    ThreadStarted => "thread/started",
    /// A thread was renamed.
    ThreadNameUpdated => "thread/name/updated",
    /// A thread was archived.
    ThreadArchived => "thread/archived",
    /// A thread was unarchived.
    ThreadUnarchived => "thread/unarchived",
    /// A thread was closed.
    ThreadClosed => "thread/closed",
    /// A thread's runtime status changed.
    ThreadStatusChanged => "thread/status/changed",
    /// Token usage counters changed.
    ThreadTokenUsageUpdated => "thread/tokenUsage/updated",
    /// Live push updates started for a thread.
    ThreadLiveAttached => "thread/live/attached",
    /// Live push updates stopped for a thread.
    ThreadLiveDetached => "thread/live/detached",
    /// Keepalive for a live thread subscription.
    ThreadLiveHeartbeat => "thread/live/heartbeat",
    /// A turn started.
    TurnStarted => "turn/started",
    /// A turn completed.
    TurnCompleted => "turn/completed",
    /// The turn plan changed.
    TurnPlanUpdated => "turn/plan/updated",
    /// The aggregated turn diff changed.
    TurnDiffUpdated => "turn/diff/updated",
    /// An item started.
    ItemStarted => "item/started",
    /// An item completed.
    ItemCompleted => "item/completed",
    /// Streaming assistant text.
    AgentMessageDelta => "item/agentMessage/delta",
    /// Streaming reasoning summary text.
    ReasoningSummaryTextDelta => "item/reasoning/summaryTextDelta",
    /// A new reasoning summary section began.
    ReasoningSummaryPartAdded => "item/reasoning/summaryPartAdded",
    /// Streaming raw reasoning text.
    ReasoningTextDelta => "item/reasoning/textDelta",
    /// Streaming plan text.
    PlanDelta => "item/plan/delta",
    /// Streaming command output.
    CommandExecutionOutputDelta => "item/commandExecution/outputDelta",
    /// Input written to a running command's terminal.
    CommandExecutionTerminalInteraction => "item/commandExecution/terminalInteraction",
    /// Streaming file-change output.
    FileChangeOutputDelta => "item/fileChange/outputDelta",
    /// A tool asks the user free-form questions.
    ToolRequestUserInput => "item/tool/requestUserInput",
    /// The backend switched models mid-turn.
    ModelRerouted => "model/rerouted",
}

impl AppServerMethod {
    /// Decode a raw method spelling.
    ///
    /// Aliases resolve first; an unmatched string passes through unchanged
    /// as [`AppServerMethod::Other`].
    pub fn decode(raw: &str) -> Self {
        let raw = raw.trim();
        let canonical = resolve_alias(raw).unwrap_or(raw);
        Self::from_canonical(canonical)
    }

    /// Map an already-canonical spelling onto a variant.
    pub fn from_canonical(canonical: &str) -> Self {
        if let Some(method) = Self::from_supported(canonical) {
            return method;
        }
        if canonical.ends_with(APPROVAL_SUFFIX) {
            Self::RequestApproval(canonical.to_owned())
        } else {
            Self::Other(canonical.to_owned())
        }
    }

    /// Whether this method has a dedicated handler.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::RequestApproval(_) | Self::Other(_))
    }

    /// Whether this is an approval-style request method.
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::RequestApproval(_))
    }

    /// Whether this method carries streaming text for an item.
    pub fn is_delta(&self) -> bool {
        matches!(
            self,
            Self::AgentMessageDelta
                | Self::ReasoningSummaryTextDelta
                | Self::ReasoningTextDelta
                | Self::PlanDelta
                | Self::CommandExecutionOutputDelta
                | Self::FileChangeOutputDelta
        )
    }

    /// Whether this method signals activity on its thread: `item/*`,
    /// `turn/*`, `error`, or a token-usage update.
    pub fn indicates_activity(&self) -> bool {
        let s = self.as_str();
        s.starts_with("item/")
            || s.starts_with("turn/")
            || matches!(self, Self::Error | Self::ThreadTokenUsageUpdated)
    }
}

impl fmt::Display for AppServerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
