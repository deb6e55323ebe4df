use crate::errors::ToolError;
use serde_json::{json, Value};
use std::path::Path;

/// Canonical result shapes handed back to the calling agent. A success
/// envelope never carries an `error` key and a failure envelope always
/// carries `error: true`; the two are mutually exclusive by construction.

pub fn success(
    status: u16,
    status_text: &str,
    headers: serde_json::Map<String, Value>,
    data: Value,
) -> Value {
    json!({
        "status": status,
        "statusText": status_text,
        "headers": headers,
        "data": data,
    })
}

/// Success variant for responses streamed to disk: the body is replaced by
/// the absolute destination path and the byte count.
pub fn saved_success(
    status: u16,
    status_text: &str,
    headers: serde_json::Map<String, Value>,
    saved_to: &Path,
    size: usize,
) -> Value {
    json!({
        "status": status,
        "statusText": status_text,
        "headers": headers,
        "savedTo": saved_to.display().to_string(),
        "size": size,
    })
}

/// Failure envelope. HTTP details appear only when a response was actually
/// received; pre-flight and network failures are message-only.
pub fn failure(error: &ToolError) -> Value {
    let mut envelope = serde_json::Map::new();
    envelope.insert("error".to_string(), Value::Bool(true));
    envelope.insert(
        "message".to_string(),
        Value::String(error.message.clone()),
    );
    if let Some(response) = &error.response {
        envelope.insert("status".to_string(), json!(response.status));
        envelope.insert(
            "statusText".to_string(),
            Value::String(response.status_text.clone()),
        );
        envelope.insert(
            "headers".to_string(),
            Value::Object(response.headers.clone()),
        );
        envelope.insert("data".to_string(), response.data.clone());
    }
    Value::Object(envelope)
}
