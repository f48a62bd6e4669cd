//! Per-attempt logic shared by the async and blocking clients.
//!
//! Nothing here touches the network: the clients issue the request and hand
//! the status, headers and body over to [`interpret`], which turns them into
//! a JSON value or a classified [`Error`].

use crate::config::ClientConfig;
use crate::error::{Error, ErrorPayload, Result};
use crate::rate_limit::parse_retry_after;
use crate::request::RequestDescriptor;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Joins a request path onto the base URL and appends its query.
///
/// Exactly one `/` separates the two, whatever slashes either side carries.
///
/// # Examples
///
/// ```
/// use jules_client::{transport::build_url, RequestDescriptor};
/// use url::Url;
///
/// let base = Url::parse("https://jules.googleapis.com/v1alpha/").unwrap();
/// let url = build_url(&base, &RequestDescriptor::get("/sessions/abc")).unwrap();
/// assert_eq!(url.as_str(), "https://jules.googleapis.com/v1alpha/sessions/abc");
/// ```
pub fn build_url(base: &Url, request: &RequestDescriptor) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        request.path().trim().trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)
        .map_err(|e| Error::Configuration(format!("Invalid request URL {joined}: {e}")))?;

    if !request.query().is_empty() {
        url.query_pairs_mut().extend_pairs(request.query());
    }
    Ok(url)
}

/// Builds the headers sent with every request.
pub(crate) fn default_headers(api_key: &str, user_agent: &str) -> Result<HeaderMap> {
    let mut api_key = HeaderValue::from_str(api_key)
        .map_err(|_| Error::Configuration("API key contains invalid header characters".into()))?;
    api_key.set_sensitive(true);

    let user_agent = HeaderValue::from_str(user_agent)
        .map_err(|e| Error::Configuration(format!("Invalid user agent: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, api_key);
    headers.insert(http::header::USER_AGENT, user_agent);
    Ok(headers)
}

/// Turns a received response into a JSON value or a classified error.
pub(crate) fn interpret(status: StatusCode, headers: &HeaderMap, body: &str) -> Result<Value> {
    tracing::debug!(status = status.as_u16(), bytes = body.len(), "Received HTTP response");

    if status.is_success() {
        decode_success(status, body)
    } else {
        Err(classify_failure(status, headers, body))
    }
}

/// Maps a non-2xx response onto the error taxonomy.
///
/// The message is the body's `error.message` when present, otherwise the raw
/// body text, otherwise the status' reason phrase.
pub fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &str) -> Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.to_string()
            }
        });

    let raw_body = match parsed {
        Some(value) => Some(value),
        None if body.is_empty() => None,
        None => Some(Value::String(body.to_string())),
    };

    let payload = ErrorPayload::new(message)
        .with_status(status)
        .with_raw_body(raw_body);

    if status.is_client_error() {
        tracing::error!(status = status.as_u16(), message = %payload.message, "Client error (4xx)");
    } else if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), message = %payload.message, "Server error (5xx)");
    }

    match status.as_u16() {
        400 => Error::Validation(payload),
        401 => Error::Authentication(payload),
        404 => Error::NotFound(payload),
        429 => {
            let retry_after_seconds = parse_retry_after(headers);
            if let Some(secs) = retry_after_seconds {
                tracing::warn!(retry_after_seconds = secs, "Rate limited");
            }
            Error::RateLimit {
                payload,
                retry_after_seconds,
            }
        }
        s if s >= 500 => Error::Server(payload),
        _ => Error::Api(payload),
    }
}

/// Parses a 2xx body. No content yields an empty JSON object.
pub fn decode_success(status: StatusCode, body: &str) -> Result<Value> {
    if status == StatusCode::NO_CONTENT || body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(body).map_err(|e| {
        tracing::error!(error = %e, raw_response = %body, "Failed to parse response as JSON");
        Error::Api(
            ErrorPayload::new(format!("Invalid JSON response: {e}"))
                .with_status(status)
                .with_raw_body(Some(Value::String(body.to_string()))),
        )
    })
}

/// Converts a parsed body into a caller type.
pub(crate) fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|e| {
        Error::Api(
            ErrorPayload::new(format!("Failed to decode response: {e}")).with_raw_body(Some(value)),
        )
    })
}

/// Logs the start of one attempt.
pub(crate) fn log_attempt(request: &RequestDescriptor, url: &Url, attempt: u32) {
    tracing::debug!(
        method = %request.method(),
        url = %url,
        attempt = attempt,
        "Executing HTTP request"
    );
}

/// Logs an attempt that ended in an error.
pub(crate) fn log_failure(error: &Error, request: &RequestDescriptor, attempt: u32) {
    tracing::warn!(
        error = %error,
        attempt = attempt,
        method = %request.method(),
        path = %request.path(),
        "Request failed"
    );
}

/// Snapshot of a client's request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Logical calls issued, retries not counted.
    pub requests: u64,
    /// Attempts that failed, retried or not.
    pub errors: u64,
}

/// Per-client counters. Observability only.
#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    requests: AtomicU64,
    errors: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RequestStats {
        RequestStats {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Logs client construction.
pub(crate) fn log_client_ready(config: &ClientConfig, variant: &str) {
    tracing::info!(
        base_url = %config.base_url,
        variant = variant,
        max_retries = config.retry_policy.max_retries,
        "Initialized Jules API client"
    );
}
