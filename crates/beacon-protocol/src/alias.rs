//! Alternate method spellings.
//!
//! Two kinds of alias exist: snake_case spellings of camelCase path segments
//! (`item/agent_message/delta`), resolved by converting and checking against
//! the supported list; and legacy catch-all events from older backends,
//! resolved through a fixed table. Legacy events also carry their payload in
//! a different shape, see [`is_legacy_event`].

use crate::method::SUPPORTED_METHODS;

/// Legacy spellings and the canonical method each maps to.
pub const LEGACY_EVENTS: &[(&str, &str)] = &[
    (
        "codex/event/agent_message_content_delta",
        "item/agentMessage/delta",
    ),
    ("codex/event/agent_message_delta", "item/agentMessage/delta"),
    ("codex/event/agent_reasoning_delta", "item/reasoning/textDelta"),
    (
        "codex/event/agent_reasoning_raw_content_delta",
        "item/reasoning/textDelta",
    ),
    (
        "codex/event/exec_command_output_delta",
        "item/commandExecution/outputDelta",
    ),
    ("codex/event/task_started", "turn/started"),
    ("codex/event/task_complete", "turn/completed"),
    ("codex/event/token_count", "thread/tokenUsage/updated"),
    (
        "codex/event/exec_approval_request",
        "item/commandExecution/requestApproval",
    ),
    (
        "codex/event/apply_patch_approval_request",
        "item/fileChange/requestApproval",
    ),
    ("execCommandApproval", "item/commandExecution/requestApproval"),
    ("applyPatchApproval", "item/fileChange/requestApproval"),
];

/// snake_case approval spellings; these are not in the supported list so the
/// generic conversion cannot find them.
const SNAKE_APPROVALS: &[(&str, &str)] = &[
    (
        "item/command_execution/request_approval",
        "item/commandExecution/requestApproval",
    ),
    (
        "item/file_change/request_approval",
        "item/fileChange/requestApproval",
    ),
];

/// Resolve `raw` to its canonical spelling, or `None` if it is not an alias.
pub fn resolve_alias(raw: &str) -> Option<&'static str> {
    if let Some(canonical) = lookup(LEGACY_EVENTS, raw).or_else(|| lookup(SNAKE_APPROVALS, raw)) {
        return Some(canonical);
    }
    if !raw.contains('_') {
        return None;
    }
    let camel = camelize_segments(raw);
    SUPPORTED_METHODS.iter().copied().find(|m| *m == camel)
}

/// Whether `raw` is a legacy event whose fields live under `params.msg`.
pub fn is_legacy_event(raw: &str) -> bool {
    lookup(LEGACY_EVENTS, raw).is_some()
}

fn lookup(table: &'static [(&'static str, &'static str)], raw: &str) -> Option<&'static str> {
    table
        .iter()
        .find_map(|(alias, canonical)| (*alias == raw).then_some(*canonical))
}

/// `item/agent_message/delta` → `item/agentMessage/delta`.
fn camelize_segments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = false;
    for c in raw.chars() {
        match c {
            '_' => upper_next = true,
            '/' => {
                upper_next = false;
                out.push(c);
            }
            _ if upper_next => {
                out.extend(c.to_uppercase());
                upper_next = false;
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_segments_resolve() {
        assert_eq!(
            resolve_alias("item/agent_message/delta"),
            Some("item/agentMessage/delta")
        );
        assert_eq!(
            resolve_alias("thread/token_usage/updated"),
            Some("thread/tokenUsage/updated")
        );
        assert_eq!(
            resolve_alias("codex/background_thread"),
            Some("codex/backgroundThread")
        );
        assert_eq!(
            resolve_alias("item/reasoning/summary_text_delta"),
            Some("item/reasoning/summaryTextDelta")
        );
        assert_eq!(
            resolve_alias("item/tool/request_user_input"),
            Some("item/tool/requestUserInput")
        );
    }

    #[test]
    fn snake_case_approvals_resolve() {
        assert_eq!(
            resolve_alias("item/command_execution/request_approval"),
            Some("item/commandExecution/requestApproval")
        );
    }

    #[test]
    fn legacy_events_resolve() {
        assert_eq!(
            resolve_alias("codex/event/agent_message_content_delta"),
            Some("item/agentMessage/delta")
        );
        assert_eq!(
            resolve_alias("codex/event/task_complete"),
            Some("turn/completed")
        );
        assert_eq!(
            resolve_alias("execCommandApproval"),
            Some("item/commandExecution/requestApproval")
        );
        assert!(is_legacy_event("codex/event/token_count"));
        assert!(!is_legacy_event("item/agent_message/delta"));
    }

    #[test]
    fn canonical_and_unknown_are_not_aliases() {
        assert_eq!(resolve_alias("item/agentMessage/delta"), None);
        assert_eq!(resolve_alias("codex/event/mcp_startup_update"), None);
        assert_eq!(resolve_alias("something/else_entirely"), None);
    }

    #[test]
    fn every_legacy_target_is_canonical() {
        for (_, canonical) in LEGACY_EVENTS.iter().chain(SNAKE_APPROVALS) {
            assert!(
                SUPPORTED_METHODS.contains(canonical)
                    || canonical.ends_with(crate::method::APPROVAL_SUFFIX),
                "{canonical}"
            );
        }
    }
}
