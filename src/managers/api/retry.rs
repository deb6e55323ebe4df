use crate::constants::retry as retry_constants;
use crate::errors::ToolError;
use crate::managers::api::request::{HttpMethod, RetryOverrides};
use crate::services::logger::Logger;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// One received HTTP response, status included, before normalization.
/// Network-level failures never produce one of these.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: serde_json::Map<String, Value>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort decode of the body for an envelope: JSON when it parses
    /// and the Content-Type says so, text otherwise, null when empty.
    pub fn decoded_data(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        let text = String::from_utf8_lossy(&self.body).to_string();
        let is_json = self
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, value)| value.as_str())
            .map(|value| value.contains("json"))
            .unwrap_or(false);
        if is_json {
            if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
                return parsed;
            }
        }
        Value::String(text)
    }

    fn into_http_error(self) -> ToolError {
        let data = self.decoded_data();
        ToolError::http(self.status, self.status_text, self.headers, data)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Retries after the initial attempt; total invocations = max_attempts + 1.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: retry_constants::MAX_ATTEMPTS,
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
            jitter: retry_constants::JITTER,
        }
    }
}

/// Merges caller overrides onto the default policy. A `methods` list, when
/// present, restricts retrying to the named HTTP methods so callers can
/// exclude non-idempotent verbs; the default stays method-blind.
pub fn normalize_retry_policy(overrides: Option<&RetryOverrides>, method: HttpMethod) -> RetryPolicy {
    let mut policy = RetryPolicy::default();
    let Some(overrides) = overrides else {
        return policy;
    };
    if let Some(enabled) = overrides.enabled {
        policy.enabled = enabled;
    }
    if let Some(max_attempts) = overrides.max_attempts {
        policy.max_attempts = max_attempts;
    }
    if let Some(base_delay_ms) = overrides.base_delay_ms {
        policy.base_delay_ms = base_delay_ms;
    }
    if let Some(max_delay_ms) = overrides.max_delay_ms {
        policy.max_delay_ms = max_delay_ms;
    }
    if let Some(jitter) = overrides.jitter {
        policy.jitter = jitter;
    }
    if let Some(methods) = overrides.methods.as_ref() {
        if !methods
            .iter()
            .any(|name| name.eq_ignore_ascii_case(method.as_str()))
        {
            policy.enabled = false;
        }
    }
    policy
}

fn compute_delay(completed_attempts: usize, policy: &RetryPolicy) -> u64 {
    let factor: f64 = 2.0;
    let mut delay =
        (policy.base_delay_ms as f64) * factor.powi(completed_attempts.saturating_sub(1) as i32);
    if delay > policy.max_delay_ms as f64 {
        delay = policy.max_delay_ms as f64;
    }
    if policy.jitter > 0.0 {
        let delta = delay * policy.jitter;
        delay = delay - delta + rand::random::<f64>() * delta * 2.0;
    }
    delay.max(0.0) as u64
}

/// Runs the executor with bounded exponential backoff. Client errors
/// (status in [400, 500)) and non-retryable transport errors propagate
/// immediately; everything else retries until the attempt bound. Assumes
/// the wrapped request is safe to repeat verbatim.
pub async fn execute_with_retry<F, Fut>(
    policy: &RetryPolicy,
    logger: &Logger,
    mut op: F,
) -> Result<RawResponse, ToolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, ToolError>>,
{
    let max_total = if policy.enabled {
        policy.max_attempts + 1
    } else {
        1
    };

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let failure = match op().await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => {
                let terminal = (400..500).contains(&response.status);
                let err = response.into_http_error();
                if terminal {
                    return Err(err);
                }
                err
            }
            Err(err) if err.retryable => err,
            Err(err) => return Err(err),
        };

        if attempt >= max_total {
            return Err(failure);
        }
        let delay = compute_delay(attempt, policy);
        logger.warn(
            "Retrying request",
            Some(&serde_json::json!({"attempt": attempt, "delay_ms": delay})),
        );
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}
