//! Conversation turn data models
//!
//! Defines the inbound turn event and the shaped turn result

use serde::{Deserialize, Serialize};

/// Identity bucket used when an event carries no conversation id
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Inbound conversation turn event
///
/// Only the ids the gateway reads are typed. Everything else, message
/// history included, is kept in `extra` and forwarded to the engine
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurnEvent {
    /// Conversation identifier, used as the rate-limit identity key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Id of the user message that triggered this turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_message_id: Option<String>,
    /// Remaining event fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConversationTurnEvent {
    /// Rate-limit identity for this event.
    ///
    /// A missing or empty conversation id falls into the shared
    /// anonymous bucket.
    pub fn identity_key(&self) -> &str {
        match self.conversation_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => ANONYMOUS_IDENTITY,
        }
    }

    /// Message history, when the event carries one as an array
    pub fn messages(&self) -> &[serde_json::Value] {
        match self.extra.get("messages") {
            Some(serde_json::Value::Array(messages)) => messages,
            _ => &[],
        }
    }
}

/// Text content block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub text: String,
}

/// Why the turn stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Turn completed normally
    #[serde(alias = "end_turn")]
    Normal,
    /// Turn ended with a shaped error reply
    Error,
}

/// Conversation turn result
///
/// Returned on every path: admitted success, rejection, and classified
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurnResult {
    /// Reply content
    pub content: Vec<ContentBlock>,
    /// Conversation id
    #[serde(default)]
    pub conversation_id: String,
    /// User message this reply answers
    #[serde(default)]
    pub associated_user_message_id: String,
    /// Stop reason
    pub stop_reason: StopReason,
}

impl ConversationTurnResult {
    /// Create a shaped error reply carrying a single fixed message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock { text: message.into() }],
            conversation_id: String::new(),
            associated_user_message_id: String::new(),
            stop_reason: StopReason::Error,
        }
    }

    /// Whether this is a shaped error reply
    pub fn is_error(&self) -> bool {
        self.stop_reason == StopReason::Error
    }

    /// Concatenated text of all content blocks
    pub fn text(&self) -> String {
        self.content.iter().map(|block| block.text.as_str()).collect::<Vec<_>>().join("")
    }
}
