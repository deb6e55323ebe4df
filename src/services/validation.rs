use crate::errors::ToolError;
use serde_json::Value;

/// Normalization helpers for the loosely-typed maps (headers, query
/// parameters) that survive the typed argument parse as raw JSON objects.
#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    /// Renders a header map to string pairs, skipping empty names and null
    /// values. Malformed header names fail here, before any network work.
    /// Non-string scalars are rendered with their JSON form.
    pub fn ensure_headers(
        &self,
        value: Option<&serde_json::Map<String, Value>>,
    ) -> Result<Vec<(String, String)>, ToolError> {
        let Some(map) = value else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (key, val) in map {
            let name = key.trim();
            if name.is_empty() || val.is_null() {
                continue;
            }
            if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(ToolError::invalid_params(format!(
                    "Invalid header name '{}'",
                    name
                )));
            }
            let rendered = render_scalar(val).ok_or_else(|| {
                ToolError::invalid_params(format!(
                    "Header '{}' must be a string, number or boolean",
                    name
                ))
            })?;
            out.push((name.to_string(), rendered));
        }
        Ok(out)
    }

    /// Renders query parameters to string pairs. Null values are dropped;
    /// array values produce one pair per element.
    pub fn ensure_query_params(
        &self,
        value: Option<&serde_json::Map<String, Value>>,
    ) -> Result<Vec<(String, String)>, ToolError> {
        let Some(map) = value else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (key, val) in map {
            if val.is_null() {
                continue;
            }
            if let Some(items) = val.as_array() {
                for item in items {
                    if let Some(rendered) = render_scalar(item) {
                        out.push((key.clone(), rendered));
                    }
                }
                continue;
            }
            let rendered = render_scalar(val).ok_or_else(|| {
                ToolError::invalid_params(format!(
                    "Query parameter '{}' must be a string, number or boolean",
                    key
                ))
            })?;
            out.push((key.clone(), rendered));
        }
        Ok(out)
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(num) => Some(num.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
