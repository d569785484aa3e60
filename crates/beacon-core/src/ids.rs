//! Branded ID newtypes for type safety.
//!
//! Every entity the app server talks about has a distinct ID type implemented
//! as a newtype wrapper around `String`. IDs are always minted by the server;
//! the client only carries them around, so there is no generator.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of a workspace (one app-server connection per workspace).
    WorkspaceId
}

branded_id! {
    /// Identifier of a conversation thread.
    ThreadId
}

branded_id! {
    /// Identifier of a turn within a thread.
    TurnId
}

branded_id! {
    /// Identifier of an item (message, command, file change) within a turn.
    ItemId
}

/// A `(workspace, thread)` pair identifying one live-update subscription.
///
/// Displays as `workspaceId:threadId`, the key used throughout the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    /// Owning workspace.
    pub workspace_id: WorkspaceId,
    /// Subscribed thread.
    pub thread_id: ThreadId,
}

impl SubscriptionKey {
    /// Build a key from anything convertible into the two ids.
    pub fn new(workspace_id: impl Into<WorkspaceId>, thread_id: impl Into<ThreadId>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            thread_id: thread_id.into(),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workspace_id, self.thread_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
