//! Decoding of error payloads.
//!
//! The API reports failures as `{"detail": ...}` where `detail` is a string,
//! a list of validation items (`{"msg": ...}` or `{"detail": ...}`), or an
//! object of field messages. A bare JSON string body is accepted too.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Known shapes of the `detail` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Items(Vec<Value>),
    Fields(Map<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Wrapped { detail: ErrorDetail },
    Bare(String),
}

impl ErrorDetail {
    /// Flatten into one readable line, items joined by `; `.
    pub fn message(&self) -> String {
        match self {
            ErrorDetail::Message(msg) => msg.clone(),
            ErrorDetail::Items(items) => items.iter().map(item_message).collect::<Vec<_>>().join("; "),
            ErrorDetail::Fields(fields) => fields.values().map(value_text).collect::<Vec<_>>().join("; "),
        }
    }
}

fn item_message(item: &Value) -> String {
    ["msg", "detail"]
        .iter()
        .find_map(|field| item.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| item.to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract a readable message from an error response body.
///
/// Returns `None` when the body matches no known shape or flattens to nothing,
/// leaving the caller to fall back to a status-based message.
pub fn decode_error_message(body: &[u8]) -> Option<String> {
    let message = match serde_json::from_slice::<ErrorBody>(body).ok()? {
        ErrorBody::Wrapped { detail } => detail.message(),
        ErrorBody::Bare(text) => text,
    };

    let message = message.trim().to_string();
    if message.is_empty() { None } else { Some(message) }
}
