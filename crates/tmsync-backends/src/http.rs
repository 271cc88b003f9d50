//! Shared HTTP transport for the backend adapters
//!
//! Wraps `reqwest::Client` with base URL construction, basic authentication,
//! a per-request timeout, and bounded retry of rate-limited requests. Every
//! failure is mapped to a [`TmsError`] carrying the operation name and the
//! message the remote reported.
//!
//! Only HTTP 429 is retried. Any other error status is returned to the
//! caller immediately.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use tmsync_core::ports::{TmsError, TmsResult};

/// Wait used when a 429 response carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Upper bound honoured for a `Retry-After` date
const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Longest raw body echoed into an error message
const MAX_ERROR_BODY: usize = 300;

/// Authenticated HTTP client bound to one backend base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    user: String,
    secret: String,
    max_retries: u32,
}

impl HttpClient {
    /// Creates a client using basic authentication
    ///
    /// # Arguments
    /// * `base_url` - Prefix of every request path (no trailing slash needed)
    /// * `user` - Basic-auth user (empty for Azure DevOps PATs)
    /// * `secret` - API key, token, or PAT
    /// * `timeout` - Per-request timeout
    /// * `max_retries` - Retries of a 429 response before giving up
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tmsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            secret: secret.into(),
            max_retries,
        })
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// `path` is appended verbatim to the base URL, so it may carry a query.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.secret))
    }

    /// Sends a request, retrying while the remote answers 429
    ///
    /// Requests whose body cannot be cloned (multipart uploads) are sent
    /// exactly once.
    pub async fn execute_with_retry(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> TmsResult<Response> {
        let mut attempt = 0;
        loop {
            let Some(current) = request.try_clone() else {
                return request
                    .send()
                    .await
                    .map_err(|e| TmsError::local(operation, transport_message(&e)));
            };

            let response = current
                .send()
                .await
                .map_err(|e| TmsError::local(operation, transport_message(&e)))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(operation, attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            if attempt >= self.max_retries {
                warn!(operation, attempts = attempt + 1, "429 retry limit exhausted");
                return Err(TmsError::remote(
                    operation,
                    StatusCode::TOO_MANY_REQUESTS.as_u16(),
                    format!("rate limited, gave up after {} attempts", attempt + 1),
                ));
            }

            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                .unwrap_or(DEFAULT_RETRY_AFTER);

            info!(
                operation,
                attempt,
                retry_after_ms = retry_after.as_millis() as u64,
                "Received 429, backing off"
            );
            tokio::time::sleep(retry_after).await;
            attempt += 1;
        }
    }

    /// Sends a request and decodes a JSON response body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> TmsResult<T> {
        let (status, body) = self.send_checked(operation, request).await?;
        serde_json::from_str(&body).map_err(|e| {
            TmsError::remote(
                operation,
                status.as_u16(),
                format!("unexpected response body: {e}"),
            )
        })
    }

    /// Sends a request whose response body is not needed
    pub async fn send_empty(&self, operation: &str, request: RequestBuilder) -> TmsResult<()> {
        self.send_checked(operation, request).await.map(|_| ())
    }

    /// Sends a request and returns the body of a successful response
    ///
    /// A non-2xx status, or a 2xx JSON body with a non-null `error` field,
    /// is turned into a [`TmsError`] with the remote message.
    async fn send_checked(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> TmsResult<(StatusCode, String)> {
        let response = self.execute_with_retry(operation, request).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TmsError::local(operation, transport_message(&e)))?;

        if !status.is_success() {
            let message = extract_error_message(&body).unwrap_or_else(|| fallback_message(status, &body));
            debug!(operation, status = status.as_u16(), %message, "Remote error");
            return Err(TmsError::remote(operation, status.as_u16(), message));
        }

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&body) {
            if map.get("error").is_some_and(|e| !e.is_null()) {
                let message = extract_error_message(&body)
                    .unwrap_or_else(|| "remote reported an error".to_string());
                return Err(TmsError::remote(operation, status.as_u16(), message));
            }
        }

        Ok((status, body))
    }
}

fn transport_message(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }
    let mut end = body.len().min(MAX_ERROR_BODY);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

/// Pulls a human-readable message out of an error body
///
/// Understands the shapes used by the supported backends:
/// - TestRail: `{"error": "..."}`
/// - Azure DevOps: `{"message": "..."}`
/// - Jira: `{"errorMessages": [...], "errors": {field: msg}}`
/// - nested `{"error": {"message": "..."}}`
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("error") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Object(inner)) => {
            if let Some(Value::String(s)) = inner.get("message") {
                return Some(s.clone());
            }
        }
        _ => {}
    }

    if let Some(Value::String(s)) = value.get("message") {
        if !s.is_empty() {
            return Some(s.clone());
        }
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(Value::Array(messages)) = value.get("errorMessages") {
        parts.extend(messages.iter().filter_map(|m| m.as_str().map(str::to_string)));
    }
    if let Some(Value::Object(errors)) = value.get("errors") {
        parts.extend(
            errors
                .iter()
                .map(|(field, msg)| format!("{field}: {}", msg.as_str().unwrap_or_default())),
        );
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts integer seconds or an RFC 2822 HTTP date. Dates further than an
/// hour away, and unparseable values, yield `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds.min(MAX_RETRY_AFTER_SECS));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Some(secs) = (target - now)
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= MAX_RETRY_AFTER_SECS)
            {
                return Duration::from_secs(secs);
            }
        } else {
            return Duration::ZERO;
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
