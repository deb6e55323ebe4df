use crate::constants::{defaults, network, protocols};
use crate::errors::ToolError;
use crate::services::validation::Validation;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "GET", alias = "get")]
    Get,
    #[serde(alias = "POST", alias = "post")]
    Post,
    #[serde(alias = "PUT", alias = "put")]
    Put,
    #[serde(alias = "PATCH", alias = "patch")]
    Patch,
    #[serde(alias = "DELETE", alias = "delete")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Closed set of authentication strategies. An unrecognized authType tag
/// fails the typed parse and surfaces as a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    #[default]
    None,
    ApiKey,
    Bearer,
    Basic,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthArgs {
    #[serde(default)]
    pub auth_type: AuthType,
    pub api_key: Option<String>,
    pub api_key_header: Option<String>,
    pub bearer_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Resolved authentication descriptor. Missing credentials for a selected
/// strategy degrade to an unauthenticated request rather than an error; the
/// caller recovers by inspecting the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSpec {
    None,
    ApiKey { key: String, header: String },
    Bearer { token: String },
    Basic { username: String, password: Option<String> },
}

impl AuthArgs {
    pub fn resolve(&self) -> AuthSpec {
        match self.auth_type {
            AuthType::None => AuthSpec::None,
            AuthType::ApiKey => match self.api_key.as_deref() {
                Some(key) if !key.is_empty() => AuthSpec::ApiKey {
                    key: key.to_string(),
                    header: self
                        .api_key_header
                        .clone()
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| defaults::API_KEY_HEADER.to_string()),
                },
                _ => AuthSpec::None,
            },
            AuthType::Bearer => match self.bearer_token.as_deref() {
                Some(token) if !token.is_empty() => AuthSpec::Bearer {
                    token: token.to_string(),
                },
                _ => AuthSpec::None,
            },
            AuthType::Basic => match self.username.as_deref() {
                Some(username) if !username.is_empty() => AuthSpec::Basic {
                    username: username.to_string(),
                    password: self.password.clone(),
                },
                _ => AuthSpec::None,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryOverrides {
    pub enabled: Option<bool>,
    pub max_attempts: Option<usize>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<f64>,
    pub methods: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestRequestArgs {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: Option<serde_json::Map<String, Value>>,
    pub query_params: Option<serde_json::Map<String, Value>>,
    pub content_type: Option<String>,
    pub save_response_to: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(flatten)]
    pub auth: AuthArgs,
    pub retry: Option<RetryOverrides>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequestArgs {
    pub url: String,
    pub query: String,
    pub variables: Option<Value>,
    pub operation_name: Option<String>,
    #[serde(default = "default_graphql_method")]
    pub http_method: HttpMethod,
    pub headers: Option<serde_json::Map<String, Value>>,
    pub query_params: Option<serde_json::Map<String, Value>>,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(flatten)]
    pub auth: AuthArgs,
    pub retry: Option<RetryOverrides>,
}

fn default_timeout_ms() -> u64 {
    network::TIMEOUT_API_REQUEST_MS
}

fn default_graphql_method() -> HttpMethod {
    HttpMethod::Post
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub path: String,
    pub field_name: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

/// Validated, canonical description of one outbound call. Immutable once
/// built; all mutation happens while constructing the RequestPlan.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
    pub body: Option<Value>,
    pub content_type: Option<String>,
    pub timeout_ms: u64,
    pub auth: AuthSpec,
    pub save_response_to: Option<PathBuf>,
}

impl RequestSpec {
    pub fn from_rest_args(args: &RestRequestArgs, validation: &Validation) -> Result<Self, ToolError> {
        Ok(Self {
            url: args.url.clone(),
            method: args.method,
            headers: validation.ensure_headers(args.headers.as_ref())?,
            query_params: validation.ensure_query_params(args.query_params.as_ref())?,
            body: args.body.clone(),
            content_type: args.content_type.clone(),
            timeout_ms: args.timeout,
            auth: args.auth.resolve(),
            save_response_to: args.save_response_to.as_deref().map(absolute_path),
        })
    }

    pub fn from_graphql_args(
        args: &GraphqlRequestArgs,
        validation: &Validation,
    ) -> Result<Self, ToolError> {
        let mut query_params = validation.ensure_query_params(args.query_params.as_ref())?;
        let (body, content_type) = match args.http_method {
            HttpMethod::Get => {
                query_params.push(("query".to_string(), args.query.clone()));
                if let Some(variables) = &args.variables {
                    let rendered = serde_json::to_string(variables).map_err(|_| {
                        ToolError::invalid_params("variables must be JSON-serializable")
                    })?;
                    query_params.push(("variables".to_string(), rendered));
                }
                if let Some(name) = &args.operation_name {
                    query_params.push(("operationName".to_string(), name.clone()));
                }
                (None, None)
            }
            HttpMethod::Post => {
                let mut payload = serde_json::Map::new();
                payload.insert("query".to_string(), Value::String(args.query.clone()));
                if let Some(variables) = &args.variables {
                    payload.insert("variables".to_string(), variables.clone());
                }
                if let Some(name) = &args.operation_name {
                    payload.insert("operationName".to_string(), Value::String(name.clone()));
                }
                (
                    Some(Value::Object(payload)),
                    Some(defaults::CONTENT_TYPE_JSON.to_string()),
                )
            }
            other => {
                return Err(ToolError::invalid_params(format!(
                    "httpMethod must be GET or POST, got {}",
                    other.as_str()
                )))
            }
        };

        Ok(Self {
            url: args.url.clone(),
            method: args.http_method,
            headers: validation.ensure_headers(args.headers.as_ref())?,
            query_params,
            body,
            content_type,
            timeout_ms: args.timeout,
            auth: args.auth.resolve(),
            save_response_to: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    FormUrlencoded,
    Multipart,
    Raw,
}

/// Decides how an untyped body should be transmitted when the caller gave
/// no explicit content type. First match wins:
///   1. a `files` array -> multipart;
///   2. a flat all-scalar map with an underscored key or a recognized OAuth
///      field name -> form-urlencoded;
///   3. anything else -> json.
/// The form heuristic is intentionally permissive and can misclassify
/// snake_case JSON payloads; callers needing certainty pass contentType.
pub fn infer_body_encoding(body: &Value) -> BodyEncoding {
    if body
        .get("files")
        .map(|files| files.is_array())
        .unwrap_or(false)
    {
        return BodyEncoding::Multipart;
    }
    if let Some(map) = body.as_object() {
        let all_scalar = map
            .values()
            .all(|v| v.is_string() || v.is_number() || v.is_boolean() || v.is_null());
        let form_like = map
            .keys()
            .any(|key| key.contains('_') || OAUTH_FORM_FIELDS.contains(&key.as_str()));
        if all_scalar && form_like {
            return BodyEncoding::FormUrlencoded;
        }
    }
    BodyEncoding::Json
}

const OAUTH_FORM_FIELDS: &[&str] = &[
    "grant_type",
    "client_id",
    "client_secret",
    "refresh_token",
    "scope",
    "username",
    "password",
    "code",
    "redirect_uri",
    "audience",
];

fn encoding_for_content_type(content_type: &str) -> BodyEncoding {
    let normalized = content_type.trim().to_lowercase();
    if normalized.starts_with(defaults::CONTENT_TYPE_FORM) {
        BodyEncoding::FormUrlencoded
    } else if normalized.starts_with("multipart/") {
        BodyEncoding::Multipart
    } else if normalized.contains("json") {
        BodyEncoding::Json
    } else {
        BodyEncoding::Raw
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedPart {
    Field { name: String, value: String },
    File {
        field_name: String,
        filename: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedBody {
    None,
    /// Pre-serialized payload; its Content-Type already sits in the header
    /// list.
    Bytes(Vec<u8>),
    /// Parts for the multipart encoder, which owns the Content-Type header
    /// (the boundary must win over any caller override).
    Multipart(Vec<PlannedPart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Text,
    BinaryBuffer,
}

/// Fully resolved, transport-ready request. Handed by value to the retry
/// orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: PlannedBody,
    pub timeout_ms: u64,
    pub basic_auth: Option<(String, Option<String>)>,
    pub response_mode: ResponseMode,
    pub save_path: Option<PathBuf>,
}

/// Builds the transport plan from a validated spec. Header merge order is
/// caller seed first, then defaults/encoding/auth only where absent, so
/// explicit caller intent wins every conflict except the multipart
/// boundary. Only attachment reads can fail here.
pub async fn build_plan(spec: &RequestSpec) -> Result<RequestPlan, ToolError> {
    let url = parse_url(&spec.url, &spec.query_params)?;
    let mut headers = spec.headers.clone();
    set_header_if_absent(&mut headers, "Accept", defaults::ACCEPT);

    let mut basic_auth = None;
    let body = match &spec.body {
        None => PlannedBody::None,
        Some(raw) => {
            let encoding = match spec.content_type.as_deref() {
                Some(explicit) => encoding_for_content_type(explicit),
                None => infer_body_encoding(raw),
            };
            match encoding {
                BodyEncoding::Multipart => {
                    // reqwest's multipart encoder appends its own
                    // Content-Type with the boundary.
                    remove_header(&mut headers, "Content-Type");
                    PlannedBody::Multipart(build_multipart_parts(raw).await?)
                }
                BodyEncoding::FormUrlencoded => {
                    set_header_if_absent(&mut headers, "Content-Type", defaults::CONTENT_TYPE_FORM);
                    PlannedBody::Bytes(encode_form_body(raw)?)
                }
                BodyEncoding::Json => {
                    let content_type = spec
                        .content_type
                        .as_deref()
                        .unwrap_or(defaults::CONTENT_TYPE_JSON);
                    set_header_if_absent(&mut headers, "Content-Type", content_type);
                    let payload = serde_json::to_vec(raw).map_err(|_| {
                        ToolError::invalid_params("body must be JSON-serializable")
                    })?;
                    PlannedBody::Bytes(payload)
                }
                BodyEncoding::Raw => {
                    let content_type = spec
                        .content_type
                        .as_deref()
                        .unwrap_or(defaults::CONTENT_TYPE_JSON);
                    set_header_if_absent(&mut headers, "Content-Type", content_type);
                    let payload = match raw.as_str() {
                        Some(text) => text.as_bytes().to_vec(),
                        None => serde_json::to_vec(raw).map_err(|_| {
                            ToolError::invalid_params("body must be JSON-serializable")
                        })?,
                    };
                    PlannedBody::Bytes(payload)
                }
            }
        }
    };

    match &spec.auth {
        AuthSpec::None => {}
        AuthSpec::ApiKey { key, header } => {
            set_header_if_absent(&mut headers, header, key);
        }
        AuthSpec::Bearer { token } => {
            set_header_if_absent(&mut headers, "Authorization", &format!("Bearer {}", token));
        }
        AuthSpec::Basic { username, password } => {
            // Transport-level credentials; reqwest does the base64 encoding.
            basic_auth = Some((username.clone(), password.clone()));
        }
    }

    let response_mode = if spec.save_response_to.is_some() {
        ResponseMode::BinaryBuffer
    } else {
        ResponseMode::Text
    };

    Ok(RequestPlan {
        method: spec.method,
        url,
        headers,
        body,
        timeout_ms: spec.timeout_ms,
        basic_auth,
        response_mode,
        save_path: spec.save_response_to.clone(),
    })
}

fn parse_url(raw: &str, query_params: &[(String, String)]) -> Result<Url, ToolError> {
    let mut url = Url::parse(raw)
        .map_err(|_| ToolError::invalid_params(format!("Invalid url: {}", raw)))?;
    if !protocols::ALLOWED_HTTP.contains(&url.scheme()) {
        return Err(ToolError::invalid_params(
            "Only http/https URLs are supported",
        ));
    }
    for (key, value) in query_params {
        url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
}

fn encode_form_body(body: &Value) -> Result<Vec<u8>, ToolError> {
    let map = body
        .as_object()
        .ok_or_else(|| ToolError::invalid_params("Form body must be an object"))?;
    let mut pairs = Vec::new();
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        let rendered = match value {
            Value::String(text) => text.clone(),
            Value::Number(num) => num.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => other.to_string(),
        };
        pairs.push((key.clone(), rendered));
    }
    let encoded = serde_urlencoded::to_string(&pairs)
        .map_err(|_| ToolError::invalid_params("Form body must be a flat object"))?;
    Ok(encoded.into_bytes())
}

async fn build_multipart_parts(body: &Value) -> Result<Vec<PlannedPart>, ToolError> {
    let map = body
        .as_object()
        .ok_or_else(|| ToolError::invalid_params("Multipart body must be an object"))?;
    let files = map
        .get("files")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ToolError::invalid_params("Multipart body requires a files array"))?;

    let mut parts = Vec::new();
    for entry in files {
        let attachment: FileAttachment = serde_json::from_value(entry.clone())
            .map_err(|err| ToolError::invalid_params(format!("Invalid file attachment: {}", err)))?;
        let path = absolute_path(&attachment.path);
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            ToolError::io(format!(
                "Failed to read attachment {}: {}",
                path.display(),
                err
            ))
        })?;
        let filename = attachment.filename.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| defaults::MULTIPART_FIELD.to_string())
        });
        parts.push(PlannedPart::File {
            field_name: attachment
                .field_name
                .clone()
                .unwrap_or_else(|| defaults::MULTIPART_FIELD.to_string()),
            filename,
            mime_type: attachment.mime_type.clone(),
            bytes,
        });
    }

    for (key, value) in map {
        if key == "files" || value.is_null() {
            continue;
        }
        let rendered = match value {
            Value::String(text) => text.clone(),
            Value::Number(num) => num.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => other.to_string(),
        };
        parts.push(PlannedPart::Field {
            name: key.clone(),
            value: rendered,
        });
    }

    Ok(parts)
}

fn absolute_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn header_position(headers: &[(String, String)], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|(key, _)| key.eq_ignore_ascii_case(name))
}

fn set_header_if_absent(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    if header_position(headers, name).is_none() {
        headers.push((name.to_string(), value.to_string()));
    }
}

fn remove_header(headers: &mut Vec<(String, String)>, name: &str) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
}
