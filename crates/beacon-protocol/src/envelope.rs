//! Raw message → [`NotificationEnvelope`] normalization.

use beacon_core::{RawAppServerEvent, RequestId, WorkspaceId};
use serde_json::{Map, Value, json};
use tracing::trace;

use crate::alias::is_legacy_event;
use crate::fields::{self, Params};
use crate::method::AppServerMethod;

/// A validated notification with a canonical method.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationEnvelope {
    /// Workspace the notification belongs to.
    pub workspace_id: WorkspaceId,
    /// Canonical method.
    pub method: AppServerMethod,
    /// Parameter object; empty when absent or malformed.
    pub params: Params,
    /// Present only for request-shaped notifications.
    pub request_id: Option<RequestId>,
}

impl NotificationEnvelope {
    /// Thread id from the params, tolerating alternate spellings.
    pub fn thread_id(&self) -> Option<String> {
        fields::thread_id(&self.params)
    }

    /// Turn id from the params.
    pub fn turn_id(&self) -> Option<String> {
        fields::turn_id(&self.params)
    }

    /// Item id from the params.
    pub fn item_id(&self) -> Option<String> {
        fields::item_id(&self.params)
    }

    /// Whether a response is expected.
    pub fn is_request(&self) -> bool {
        self.request_id.is_some()
    }

    /// Re-encode as a canonical raw message.
    pub fn to_message(&self) -> Value {
        let mut message = json!({
            "method": self.method.as_str(),
            "params": Value::Object(self.params.clone()),
        });
        if let (Some(id), Some(obj)) = (&self.request_id, message.as_object_mut()) {
            let _ = obj.insert("id".into(), id.to_value());
        }
        message
    }
}

/// Normalize one raw message.
///
/// Returns `None` when `message` is not an object or has no non-blank string
/// `method`. Never panics on any input.
pub fn normalize(workspace_id: &WorkspaceId, message: &Value) -> Option<NotificationEnvelope> {
    let Some(obj) = message.as_object() else {
        trace!(%workspace_id, "dropping non-object message");
        return None;
    };
    let raw_method = obj.get("method").and_then(Value::as_str).map(str::trim);
    let Some(raw_method) = raw_method.filter(|m| !m.is_empty()) else {
        trace!(%workspace_id, "dropping message without method");
        return None;
    };

    let method = AppServerMethod::decode(raw_method);

    let mut params = match obj.get("params") {
        Some(Value::Object(p)) => p.clone(),
        _ => Map::new(),
    };
    if is_legacy_event(raw_method) {
        lift_legacy_payload(&mut params);
    }

    let request_id = obj.get("id").and_then(RequestId::from_value);

    Some(NotificationEnvelope {
        workspace_id: workspace_id.clone(),
        method,
        params,
        request_id,
    })
}

/// Normalize a raw transport record.
pub fn normalize_event(event: &RawAppServerEvent) -> Option<NotificationEnvelope> {
    normalize(&event.workspace_id, &event.message)
}

/// Legacy events nest their fields under `msg` and name the thread
/// `conversationId`. Existing keys are never overwritten.
fn lift_legacy_payload(params: &mut Params) {
    if let Some(Value::Object(msg)) = params.get("msg").cloned() {
        for (key, value) in msg {
            let _ = params.entry(key).or_insert(value);
        }
    }
    if !params.contains_key("threadId") {
        let conversation = fields::string_field(params, &["conversationId", "conversation_id"]);
        if let Some(id) = conversation {
            let _ = params.insert("threadId".into(), Value::String(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ws() -> WorkspaceId {
        WorkspaceId::from("ws-1")
    }

    #[test]
    fn rejects_non_objects() {
        assert!(normalize(&ws(), &json!(null)).is_none());
        assert!(normalize(&ws(), &json!("turn/started")).is_none());
        assert!(normalize(&ws(), &json!([{"method": "turn/started"}])).is_none());
    }

    #[test]
    fn rejects_missing_or_blank_method() {
        assert!(normalize(&ws(), &json!({})).is_none());
        assert!(normalize(&ws(), &json!({"method": "   "})).is_none());
        assert!(normalize(&ws(), &json!({"method": 42})).is_none());
    }

    #[test]
    fn params_default_to_empty() {
        let env = normalize(&ws(), &json!({"method": "turn/started", "params": [1, 2]})).unwrap();
        assert!(env.params.is_empty());
        let env = normalize(&ws(), &json!({"method": "turn/started", "params": "x"})).unwrap();
        assert!(env.params.is_empty());
    }

    #[test]
    fn request_id_only_for_strings_and_numbers() {
        let env = normalize(&ws(), &json!({"method": "a", "id": 5})).unwrap();
        assert_eq!(env.request_id, Some(RequestId::from(5)));
        let env = normalize(&ws(), &json!({"method": "a", "id": "r-1"})).unwrap();
        assert_eq!(env.request_id, Some(RequestId::from("r-1")));
        let env = normalize(&ws(), &json!({"method": "a", "id": null})).unwrap();
        assert_eq!(env.request_id, None);
        let env = normalize(&ws(), &json!({"method": "a", "id": {"x": 1}})).unwrap();
        assert!(!env.is_request());
    }

    #[test]
    fn method_is_trimmed_and_aliased() {
        let env = normalize(
            &ws(),
            &json!({"method": " item/agent_message/delta ", "params": {"delta": "x"}}),
        )
        .unwrap();
        assert_eq!(env.method, AppServerMethod::AgentMessageDelta);
    }

    #[test]
    fn legacy_payload_is_lifted() {
        let env = normalize(
            &ws(),
            &json!({
                "method": "codex/event/agent_message_delta",
                "params": {
                    "conversationId": "thread-9",
                    "msg": {"type": "agent_message_delta", "delta": "Hi", "item_id": "it-1"}
                }
            }),
        )
        .unwrap();
        assert_eq!(env.method, AppServerMethod::AgentMessageDelta);
        assert_eq!(env.thread_id().as_deref(), Some("thread-9"));
        assert_eq!(env.item_id().as_deref(), Some("it-1"));
        assert_eq!(fields::delta_text(&env.params).as_deref(), Some("Hi"));
    }

    #[test]
    fn lifting_never_overwrites() {
        let env = normalize(
            &ws(),
            &json!({
                "method": "codex/event/task_complete",
                "params": {"threadId": "outer", "turnId": "t-outer",
                           "msg": {"threadId": "inner", "turnId": "t-inner"}}
            }),
        )
        .unwrap();
        assert_eq!(env.thread_id().as_deref(), Some("outer"));
        assert_eq!(env.turn_id().as_deref(), Some("t-outer"));
    }

    #[test]
    fn modern_methods_are_not_lifted() {
        let env = normalize(
            &ws(),
            &json!({"method": "turn/started", "params": {"msg": {"threadId": "x"}}}),
        )
        .unwrap();
        assert_eq!(env.thread_id(), None);
    }

    #[test]
    fn to_message_round_trips() {
        let raw = json!({"method": "item/tool/requestUserInput", "id": 3, "params": {"threadId": "t"}});
        let env = normalize(&ws(), &raw).unwrap();
        assert_eq!(env.to_message(), raw);
    }

    fn method_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("item/agentMessage/delta".to_string()),
            Just("item/agent_message/delta".to_string()),
            Just("codex/event/agent_message_delta".to_string()),
            Just("codex/event/exec_approval_request".to_string()),
            Just("turn/completed".to_string()),
            "[a-z_/]{0,24}",
        ]
    }

    fn params_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            Just(json!([1, 2])),
            Just(json!({"threadId": "t", "delta": "x"})),
            Just(json!({"conversationId": "c", "msg": {"delta": "y", "threadId": "m"}})),
            "[a-z]{0,8}".prop_map(|s| json!({"thread_id": s, "msg": s})),
        ]
    }

    fn id_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9-]{0,8}".prop_map(Value::from),
            Just(json!(true)),
        ]
    }

    proptest! {
        #[test]
        fn normalization_is_pure(
            method in method_strategy(),
            params in params_strategy(),
            id in id_strategy(),
        ) {
            let raw = json!({"method": method, "params": params, "id": id});
            let a = normalize(&ws(), &raw);
            let b = normalize(&ws(), &raw);
            prop_assert_eq!(&a, &b);
            if let Some(env) = a {
                // canonical form is a fixed point
                let again = normalize(&ws(), &env.to_message());
                prop_assert_eq!(again, Some(env));
            }
        }
    }
}
