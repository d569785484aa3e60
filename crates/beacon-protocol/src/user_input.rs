//! Free-form user-input requests and their answers.

use std::collections::BTreeMap;

use beacon_core::{RequestId, WorkspaceId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::NotificationEnvelope;
use crate::fields::{self, Params};
use crate::method::AppServerMethod;

/// One selectable answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInputOption {
    /// Short label; may be empty if a description is present.
    pub label: String,
    /// Longer explanation; may be empty if a label is present.
    pub description: String,
}

/// One question in a user-input request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputQuestion {
    /// Non-blank question id, echoed in the answer map.
    pub id: String,
    /// Short heading.
    pub header: String,
    /// Question text.
    pub question: String,
    /// Whether a free-text "other" answer is allowed.
    pub is_other: bool,
    /// Choices; empty for free-text questions.
    pub options: Vec<UserInputOption>,
}

/// A user-input request with its question list cleaned up.
#[derive(Clone, Debug, PartialEq)]
pub struct UserInputRequest {
    /// Workspace that sent the request.
    pub workspace_id: WorkspaceId,
    /// Id to echo in the response.
    pub request_id: RequestId,
    /// Owning thread, if reported.
    pub thread_id: Option<String>,
    /// Owning turn, if reported.
    pub turn_id: Option<String>,
    /// Owning item, if reported.
    pub item_id: Option<String>,
    /// Questions that survived normalization.
    pub questions: Vec<UserInputQuestion>,
}

impl UserInputRequest {
    /// Build from an `item/tool/requestUserInput` envelope with a request id.
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Option<Self> {
        if envelope.method != AppServerMethod::ToolRequestUserInput {
            return None;
        }
        let request_id = envelope.request_id.clone()?;
        let params = &envelope.params;
        Some(Self {
            workspace_id: envelope.workspace_id.clone(),
            request_id,
            thread_id: fields::thread_id(params),
            turn_id: fields::turn_id(params),
            item_id: fields::item_id(params),
            questions: normalize_questions(params.get("questions")),
        })
    }
}

/// Clean a raw question list.
///
/// Questions without a non-blank id are dropped. Options with neither a
/// label nor a description are dropped; a question left with no options is
/// kept as a free-text question.
pub fn normalize_questions(raw: Option<&Value>) -> Vec<UserInputQuestion> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(normalize_question)
        .collect()
}

fn normalize_question(obj: &Map<String, Value>) -> Option<UserInputQuestion> {
    let id = fields::string_field(obj, &["id", "questionId", "question_id"])?;
    let id = id.trim().to_owned();
    Some(UserInputQuestion {
        id,
        header: text(obj, &["header", "title"]),
        question: text(obj, &["question", "prompt", "text"]),
        is_other: fields::bool_field(obj, &["isOther", "is_other"]).unwrap_or(false),
        options: obj
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| opts.iter().filter_map(normalize_option).collect())
            .unwrap_or_default(),
    })
}

fn normalize_option(raw: &Value) -> Option<UserInputOption> {
    let (label, description) = match raw {
        Value::String(s) => (s.trim().to_owned(), String::new()),
        Value::Object(obj) => (text(obj, &["label"]), text(obj, &["description"])),
        _ => return None,
    };
    if label.is_empty() && description.is_empty() {
        return None;
    }
    Some(UserInputOption { label, description })
}

fn text(obj: &Params, keys: &[&str]) -> String {
    fields::string_field(obj, keys)
        .map(|s| s.trim().to_owned())
        .unwrap_or_default()
}

/// Answers for one question.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// Selected labels or free text.
    pub answers: Vec<String>,
}

/// Response body for a user-input request:
/// `{"answers": {questionId: {"answers": [..]}}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInputResponse {
    /// Answers keyed by question id.
    pub answers: BTreeMap<String, QuestionAnswer>,
}

impl UserInputResponse {
    /// Empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add answers for a question, replacing any earlier ones.
    #[must_use]
    pub fn answer<I, S>(mut self, question_id: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _ = self.answers.insert(
            question_id.into(),
            QuestionAnswer {
                answers: answers.into_iter().map(Into::into).collect(),
            },
        );
        self
    }

    /// The response as JSON.
    pub fn to_response(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
