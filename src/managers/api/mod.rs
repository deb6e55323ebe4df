pub mod request;
pub mod retry;

use crate::constants::network;
use crate::errors::ToolError;
use crate::mcp::envelope;
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use futures::StreamExt;
use once_cell::sync::OnceCell;
use request::{
    build_plan, GraphqlRequestArgs, PlannedBody, PlannedPart, RequestPlan, RequestSpec,
    ResponseMode, RestRequestArgs,
};
use reqwest::Client;
use retry::{execute_with_retry, normalize_retry_policy, RawResponse, RetryPolicy};
use serde_json::Value;
use std::time::Duration;

/// Handles the rest_api_request and rest_api_graphql tools: typed parse,
/// plan building, retried execution, response normalization. Holds no
/// per-call state; the shared reqwest client is the only thing cached.
pub struct ApiManager {
    logger: Logger,
    validation: Validation,
    client: OnceCell<Client>,
}

impl ApiManager {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("api"),
            validation: Validation::new(),
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&Client, ToolError> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .redirect(reqwest::redirect::Policy::limited(network::MAX_REDIRECTS))
                .build()
                .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))
        })
    }

    pub async fn rest_api_request(&self, args: Value) -> Result<Value, ToolError> {
        let args: RestRequestArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("rest_api_request: {}", err)))?;
        let spec = RequestSpec::from_rest_args(&args, &self.validation)?;
        let policy = normalize_retry_policy(args.retry.as_ref(), spec.method);
        self.run(spec, policy).await
    }

    pub async fn rest_api_graphql(&self, args: Value) -> Result<Value, ToolError> {
        let args: GraphqlRequestArgs = serde_json::from_value(args)
            .map_err(|err| ToolError::invalid_params(format!("rest_api_graphql: {}", err)))?;
        let spec = RequestSpec::from_graphql_args(&args, &self.validation)?;
        let policy = normalize_retry_policy(args.retry.as_ref(), spec.method);
        self.run(spec, policy).await
    }

    async fn run(&self, spec: RequestSpec, policy: RetryPolicy) -> Result<Value, ToolError> {
        let plan = build_plan(&spec).await?;
        let client = self.client()?;
        self.logger.debug(
            "Executing request",
            Some(&serde_json::json!({
                "method": plan.method.as_str(),
                "url": plan.url.as_str(),
            })),
        );
        let raw =
            execute_with_retry(&policy, &self.logger, || self.execute_plan(client, &plan)).await?;
        self.normalize_success(&plan, raw).await
    }

    async fn execute_plan(
        &self,
        client: &Client,
        plan: &RequestPlan,
    ) -> Result<RawResponse, ToolError> {
        let mut req = client.request(plan.method.as_reqwest(), plan.url.clone());
        for (name, value) in &plan.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        match &plan.body {
            PlannedBody::None => {}
            PlannedBody::Bytes(payload) => {
                req = req.body(payload.clone());
            }
            PlannedBody::Multipart(parts) => {
                req = req.multipart(build_form(parts)?);
            }
        }
        if let Some((username, password)) = &plan.basic_auth {
            req = req.basic_auth(username, password.as_ref());
        }
        req = req.timeout(Duration::from_millis(plan.timeout_ms));

        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = headers_to_map(response.headers());

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }

    async fn normalize_success(
        &self,
        plan: &RequestPlan,
        raw: RawResponse,
    ) -> Result<Value, ToolError> {
        match plan.response_mode {
            ResponseMode::Text => Ok(envelope::success(
                raw.status,
                &raw.status_text,
                raw.headers.clone(),
                raw.decoded_data(),
            )),
            ResponseMode::BinaryBuffer => {
                let Some(path) = &plan.save_path else {
                    return Err(ToolError::internal(
                        "Binary response mode without a save path",
                    ));
                };
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|err| {
                        ToolError::io(format!(
                            "Failed to create {}: {}",
                            parent.display(),
                            err
                        ))
                    })?;
                }
                tokio::fs::write(path, &raw.body).await.map_err(|err| {
                    ToolError::io(format!(
                        "Failed to write response to {}: {}",
                        path.display(),
                        err
                    ))
                })?;
                self.logger.info(
                    "Saved response body",
                    Some(&serde_json::json!({
                        "path": path.display().to_string(),
                        "bytes": raw.body.len(),
                    })),
                );
                Ok(envelope::saved_success(
                    raw.status,
                    &raw.status_text,
                    raw.headers.clone(),
                    path,
                    raw.body.len(),
                ))
            }
        }
    }
}

fn build_form(parts: &[PlannedPart]) -> Result<reqwest::multipart::Form, ToolError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        match part {
            PlannedPart::Field { name, value } => {
                form = form.text(name.clone(), value.clone());
            }
            PlannedPart::File {
                field_name,
                filename,
                mime_type,
                bytes,
            } => {
                let mut file_part =
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(filename.clone());
                if let Some(mime) = mime_type {
                    file_part = file_part.mime_str(mime).map_err(|_| {
                        ToolError::invalid_params(format!("Invalid mimeType: {}", mime))
                    })?;
                }
                form = form.part(field_name.clone(), file_part);
            }
        }
    }
    Ok(form)
}

fn headers_to_map(headers: &reqwest::header::HeaderMap) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    for (key, value) in headers {
        if let Ok(text) = value.to_str() {
            map.insert(key.as_str().to_string(), Value::String(text.to_string()));
        }
    }
    map
}

fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        return ToolError::timeout("HTTP request timed out");
    }
    if err.is_builder() {
        // Deferred request-construction failure; repeating it cannot help.
        return ToolError::invalid_params(format!("Malformed request: {}", err));
    }
    ToolError::retryable(err.to_string())
}

#[async_trait::async_trait]
impl ToolHandler for ApiManager {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        match tool {
            "rest_api_request" => self.rest_api_request(args).await,
            "rest_api_graphql" => self.rest_api_graphql(args).await,
            other => Err(ToolError::not_found(format!("Unknown tool: {}", other))),
        }
    }
}
