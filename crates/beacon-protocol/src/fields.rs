//! Tolerant field extraction from notification params.
//!
//! Backends have shipped both camelCase and snake_case field names, and some
//! nest ids (`{"thread": {"id": ..}}`). Every reader here returns `None`
//! rather than failing on an unexpected shape.

use serde_json::{Map, Value};

/// Parameter object of a notification.
pub type Params = Map<String, Value>;

/// First non-blank string among `keys`. Integer ids are rendered as strings.
pub fn string_field(params: &Params, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match params.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    })
}

/// First string among `keys`, allowing empty strings.
///
/// Deltas may legitimately be whitespace, so they must not be filtered.
pub fn raw_string_field(params: &Params, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| params.get(*key)?.as_str().map(str::to_owned))
}

/// `params[object].id`, when `params[object]` is an object.
pub fn nested_id(params: &Params, object: &str) -> Option<String> {
    let inner = params.get(object)?.as_object()?;
    string_field(inner, &["id"])
}

/// First object-valued field among `keys`.
pub fn object_field<'a>(params: &'a Params, keys: &[&str]) -> Option<&'a Params> {
    keys.iter().find_map(|key| params.get(*key)?.as_object())
}

/// First unsigned integer among `keys`; numeric strings are accepted.
pub fn u64_field(params: &Params, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match params.get(*key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// First boolean among `keys`.
pub fn bool_field(params: &Params, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| params.get(*key)?.as_bool())
}

/// Thread id: `threadId`, `thread_id`, `conversationId`, or `thread.id`.
pub fn thread_id(params: &Params) -> Option<String> {
    string_field(
        params,
        &["threadId", "thread_id", "conversationId", "conversation_id"],
    )
    .or_else(|| nested_id(params, "thread"))
}

/// Turn id: `turnId`, `turn_id`, or `turn.id`.
pub fn turn_id(params: &Params) -> Option<String> {
    string_field(params, &["turnId", "turn_id"]).or_else(|| nested_id(params, "turn"))
}

/// Item id: `itemId`, `item_id`, `callId`, `call_id`, or `item.id`.
pub fn item_id(params: &Params) -> Option<String> {
    string_field(params, &["itemId", "item_id", "callId", "call_id"])
        .or_else(|| nested_id(params, "item"))
}

/// Streaming text carried by a delta notification.
pub fn delta_text(params: &Params) -> Option<String> {
    raw_string_field(params, &["delta", "text", "chunk", "content"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn camel_case_wins_over_snake_case() {
        let p = params(json!({"threadId": "a", "thread_id": "b"}));
        assert_eq!(thread_id(&p).as_deref(), Some("a"));
    }

    #[test]
    fn snake_case_fallback() {
        let p = params(json!({"thread_id": "b", "turn_id": "t", "item_id": "i"}));
        assert_eq!(thread_id(&p).as_deref(), Some("b"));
        assert_eq!(turn_id(&p).as_deref(), Some("t"));
        assert_eq!(item_id(&p).as_deref(), Some("i"));
    }

    #[test]
    fn blank_values_are_skipped() {
        let p = params(json!({"threadId": "  ", "thread_id": "real"}));
        assert_eq!(thread_id(&p).as_deref(), Some("real"));
    }

    #[test]
    fn nested_ids() {
        let p = params(json!({
            "thread": {"id": "th"},
            "turn": {"id": "tu"},
            "item": {"id": "it", "type": "agentMessage"}
        }));
        assert_eq!(thread_id(&p).as_deref(), Some("th"));
        assert_eq!(turn_id(&p).as_deref(), Some("tu"));
        assert_eq!(item_id(&p).as_deref(), Some("it"));
    }

    #[test]
    fn numeric_ids_render_as_strings() {
        let p = params(json!({"turnId": 7}));
        assert_eq!(turn_id(&p).as_deref(), Some("7"));
    }

    #[test]
    fn wrong_shapes_yield_none() {
        let p = params(json!({"threadId": ["x"], "thread": "not-an-object", "count": "abc"}));
        assert_eq!(thread_id(&p), None);
        assert_eq!(u64_field(&p, &["count"]), None);
        assert_eq!(bool_field(&p, &["missing"]), None);
    }

    #[test]
    fn delta_text_keeps_whitespace() {
        let p = params(json!({"delta": " "}));
        assert_eq!(delta_text(&p).as_deref(), Some(" "));
    }

    #[test]
    fn numeric_reads() {
        let p = params(json!({"total": 12, "legacy": "34"}));
        assert_eq!(u64_field(&p, &["total"]), Some(12));
        assert_eq!(u64_field(&p, &["legacy"]), Some(34));
    }
}
