use crate::errors::ToolError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

/// Checks the raw arguments against the tool's declared input schema.
/// Unknown tool names pass through here; dispatch reports those itself.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), ToolError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let details: Vec<String> = errors
            .take(10)
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{}: {}", path, err)
                }
            })
            .collect();
        return Err(ToolError::invalid_params(format!(
            "Invalid arguments for {}: {}",
            tool_name,
            details.join("; ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_lists_both_tools() {
        let names: Vec<&str> = tool_catalog().iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"rest_api_request"));
        assert!(names.contains(&"rest_api_graphql"));
    }

    #[test]
    fn missing_url_fails_schema_validation() {
        let err = validate_tool_args("rest_api_request", &json!({"method": "GET"}))
            .expect_err("url is required");
        assert!(err.message.contains("rest_api_request"));
    }

    #[test]
    fn unknown_auth_type_fails_schema_validation() {
        let args = json!({"url": "https://api.test/x", "authType": "oauth2"});
        assert!(validate_tool_args("rest_api_request", &args).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let args = json!({"url": "https://api.test/x", "bodyy": {}});
        assert!(validate_tool_args("rest_api_request", &args).is_err());
    }

    #[test]
    fn graphql_requires_query() {
        let args = json!({"url": "https://api.test/graphql"});
        assert!(validate_tool_args("rest_api_graphql", &args).is_err());
        let args = json!({"url": "https://api.test/graphql", "query": "{ viewer { id } }"});
        assert!(validate_tool_args("rest_api_graphql", &args).is_ok());
    }
}
