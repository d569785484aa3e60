//! # beacon-protocol
//!
//! The app-server notification vocabulary.
//!
//! - [`AppServerMethod`]: canonical methods decoded once at the boundary,
//!   with legacy and snake_case aliases resolved ([`alias`])
//! - [`MethodCatalog`]: supported / passthrough / unknown classification
//! - [`normalize`]: raw message → [`NotificationEnvelope`], never failing
//!   loudly on malformed input
//! - [`fields`]: tolerant camelCase/snake_case field readers
//! - [`ApprovalRequest`], [`ApprovalAllowlist`], [`UserInputRequest`]:
//!   request payload models and their response bodies

#![deny(unsafe_code)]

pub mod alias;
pub mod approval;
pub mod catalog;
pub mod envelope;
pub mod fields;
pub mod method;
pub mod user_input;

pub use approval::{ApprovalAllowlist, ApprovalDecision, ApprovalRequest, command_tokens};
pub use catalog::{DEFAULT_PASSTHROUGH_METHODS, MethodCatalog, MethodClass};
pub use envelope::{NotificationEnvelope, normalize, normalize_event};
pub use fields::Params;
pub use method::{APPROVAL_SUFFIX, AppServerMethod, SUPPORTED_METHODS};
pub use user_input::{
    QuestionAnswer, UserInputOption, UserInputQuestion, UserInputRequest, UserInputResponse,
};
