//! The `{"error": "..."}` result convention

use serde_json::{Value, json};

/// Build an error payload
pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

/// Whether a tool result is an error payload.
///
/// Only a top-level `error` key with a string value counts; nested sections
/// that carry their own `error` (partial results) are still successes.
pub fn is_error_payload(value: &Value) -> bool {
    error_message(value).is_some()
}

/// The message of an error payload, if it is one
pub fn error_message(value: &Value) -> Option<&str> {
    value.get("error").and_then(Value::as_str)
}
