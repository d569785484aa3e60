//! Supported / passthrough / unknown classification.

use std::collections::HashSet;

use crate::method::AppServerMethod;

/// Methods the backend may send that are acknowledged and intentionally
/// ignored. Extended at runtime through [`MethodCatalog::with_passthrough`].
pub const DEFAULT_PASSTHROUGH_METHODS: &[&str] = &[
    "codex/event/agent_message",
    "codex/event/agent_reasoning",
    "codex/event/agent_reasoning_section_break",
    "codex/event/exec_command_begin",
    "codex/event/exec_command_end",
    "codex/event/item_started",
    "codex/event/item_completed",
    "codex/event/mcp_startup_complete",
    "codex/event/mcp_startup_update",
    "codex/event/mcp_tool_call_begin",
    "codex/event/mcp_tool_call_end",
    "codex/event/session_configured",
    "codex/event/user_message",
    "item/mcpToolCall/progress",
    "thread/compacted",
    "rawResponseItem/completed",
    "mcpServer/oauthLogin/completed",
    "deprecationNotice",
    "configWarning",
    "windows/worldWritableWarning",
];

/// How the dispatcher treats a canonical method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodClass {
    /// Routed to a dedicated handler.
    Supported,
    /// Accepted and ignored.
    Passthrough,
    /// Protocol drift: logged and surfaced through the throttled warning.
    Unknown,
}

/// The method catalogue: the fixed supported set plus a passthrough set.
#[derive(Clone, Debug)]
pub struct MethodCatalog {
    passthrough: HashSet<String>,
}

impl MethodCatalog {
    /// Catalogue with the built-in passthrough list.
    pub fn new() -> Self {
        Self {
            passthrough: DEFAULT_PASSTHROUGH_METHODS
                .iter()
                .map(|m| (*m).to_owned())
                .collect(),
        }
    }

    /// Add methods to the passthrough set. Blank entries are skipped.
    #[must_use]
    pub fn with_passthrough<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for method in extra {
            let method = method.as_ref().trim();
            if !method.is_empty() {
                let _ = self.passthrough.insert(method.to_owned());
            }
        }
        self
    }

    /// Classify a decoded method.
    pub fn classify(&self, method: &AppServerMethod) -> MethodClass {
        if method.is_supported() {
            MethodClass::Supported
        } else if self.passthrough.contains(method.as_str()) {
            MethodClass::Passthrough
        } else {
            MethodClass::Unknown
        }
    }

    /// Whether the passthrough set contains `method`.
    pub fn is_passthrough(&self, method: &str) -> bool {
        self.passthrough.contains(method)
    }
}

impl Default for MethodCatalog {
    fn default() -> Self {
        Self::new()
    }
}
