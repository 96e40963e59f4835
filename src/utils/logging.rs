//! Logging utilities
//!
//! Log-safe summaries of conversation turn events

use crate::models::ConversationTurnEvent;
use serde_json::Value;

/// Set to true to include full events in debug logs
/// Default is false to reduce log verbosity
pub const VERBOSE_EVENT_LOGGING: bool = false;

/// Maximum message text kept per content block
const MAX_TEXT_LEN: usize = 100;

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len).collect();
    let dropped = s.chars().count() - max_len;
    format!("{}... ({} chars truncated)", kept, dropped)
}

/// Preview one content block: truncated text, or the block's kind
fn filter_block(block: &Value) -> Value {
    match block.get("text").and_then(Value::as_str) {
        Some(text) => Value::String(truncate_content(text, MAX_TEXT_LEN)),
        None => {
            let kind = block
                .as_object()
                .and_then(|fields| fields.keys().next())
                .map(String::as_str)
                .unwrap_or("unknown");
            Value::String(format!("[{}]", kind))
        }
    }
}

fn filter_message(msg: &Value) -> Value {
    let previews: Vec<Value> = msg
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| blocks.iter().map(filter_block).collect())
        .unwrap_or_default();

    serde_json::json!({
        "role": msg.get("role").cloned().unwrap_or(Value::Null),
        "content": previews,
    })
}

/// Create a filtered summary of a turn event for logging
///
/// Only the last message is previewed. Unknown fields are listed by name.
pub fn create_event_log_summary(event: &ConversationTurnEvent) -> Value {
    if VERBOSE_EVENT_LOGGING {
        return serde_json::to_value(event).unwrap_or(serde_json::json!({"error": "serialize failed"}));
    }

    let messages = event.messages();
    let last_message = messages.last().map(filter_message);
    let extra_fields: Vec<&String> = event.extra.keys().filter(|key| key.as_str() != "messages").collect();

    serde_json::json!({
        "conversationId": event.conversation_id,
        "currentMessageId": event.current_message_id,
        "messageCount": messages.len(),
        "lastMessage": last_message,
        "extraFields": extra_fields,
    })
}
