//! Error types for Jules API calls.
//!
//! Every failure a caller can observe is one variant of [`Error`]. HTTP-level
//! failures share a common [`ErrorPayload`] so the original status and response
//! body are always available for diagnostics, whatever the kind.

use http::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Message, status and raw body shared by every HTTP-level error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    /// Human readable message, taken from `error.message` when the server sent one.
    pub message: String,
    /// The HTTP status code, when a response was received.
    pub status: Option<StatusCode>,
    /// The response body as JSON, or the raw text as a JSON string.
    pub raw_body: Option<Value>,
}

impl ErrorPayload {
    /// Creates a payload carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            raw_body: None,
        }
    }

    /// Attaches an HTTP status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the raw response body.
    pub fn with_raw_body(mut self, raw_body: Option<Value>) -> Self {
        self.raw_body = raw_body;
        self
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status.as_u16()),
            None => f.write_str(&self.message),
        }
    }
}

/// The kind of an [`Error`], without its payload.
///
/// Used by the retry policy and handy for matching in caller code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Authentication,
    NotFound,
    Validation,
    RateLimit,
    Server,
    Api,
    Timeout,
    Configuration,
    RemoteWorkFailed,
}

/// The main error type for Jules API calls.
///
/// # Examples
///
/// ```no_run
/// use jules_client::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().api_key("my-key").build()?;
///
/// match client.get("sessions/abc123").await {
///     Ok(session) => println!("{session}"),
///     Err(Error::NotFound(payload)) => eprintln!("no such session: {}", payload.message),
///     Err(Error::RateLimit { retry_after_seconds: Some(secs), .. }) => {
///         eprintln!("rate limited, try again in {secs}s");
///     }
///     Err(e) => eprintln!("request failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No response was received (connection refused, DNS failure, request timeout, ...).
    #[error("Network error: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
        /// The underlying `reqwest` error.
        #[source]
        source: reqwest::Error,
    },

    /// The server rejected the API key (401).
    #[error("Authentication failed: {0}")]
    Authentication(ErrorPayload),

    /// The requested resource does not exist (404).
    #[error("Not found: {0}")]
    NotFound(ErrorPayload),

    /// The request was malformed (400).
    #[error("Validation failed: {0}")]
    Validation(ErrorPayload),

    /// Too many requests (429).
    ///
    /// `retry_after_seconds` is the server's `Retry-After` hint when it was an integer.
    #[error("Rate limit exceeded: {payload}")]
    RateLimit {
        /// Message, status and body of the 429 response.
        payload: ErrorPayload,
        /// Seconds the server asked the caller to wait.
        retry_after_seconds: Option<u64>,
    },

    /// The server failed (5xx).
    #[error("Server error: {0}")]
    Server(ErrorPayload),

    /// Any other API failure: unexpected statuses and malformed success bodies.
    #[error("API error: {0}")]
    Api(ErrorPayload),

    /// Waiting for remote work exceeded its deadline.
    #[error("Timed out after {elapsed:?} waiting for {resource}")]
    Timeout {
        /// The resource being waited on.
        resource: String,
        /// Time spent before giving up.
        elapsed: Duration,
    },

    /// The client was configured incorrectly. Raised before any network activity.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The remote work reached a failed terminal state.
    ///
    /// This is a business-level failure of the polled resource, not a transport failure.
    #[error("Remote work failed: {resource}")]
    RemoteWorkFailed {
        /// The resource that failed.
        resource: String,
    },
}

impl Error {
    /// Wraps a transport failure.
    pub(crate) fn network(source: reqwest::Error) -> Self {
        let message = if source.is_timeout() {
            "request timed out".to_string()
        } else if source.is_connect() {
            "connection failed".to_string()
        } else {
            source.to_string()
        };
        Error::Network { message, source }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::RateLimit { .. } => ErrorKind::RateLimit,
            Error::Server(_) => ErrorKind::Server,
            Error::Api(_) => ErrorKind::Api,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::RemoteWorkFailed { .. } => ErrorKind::RemoteWorkFailed,
        }
    }

    /// Returns `true` for transient failures: network errors and 5xx responses.
    ///
    /// # Examples
    ///
    /// ```
    /// use jules_client::{Error, ErrorPayload};
    /// use http::StatusCode;
    ///
    /// let err = Error::Server(
    ///     ErrorPayload::new("backend unavailable").with_status(StatusCode::SERVICE_UNAVAILABLE),
    /// );
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Validation(ErrorPayload::new("bad prompt").with_status(StatusCode::BAD_REQUEST));
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }

    /// Returns the shared payload for HTTP-level errors.
    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            Error::Authentication(p)
            | Error::NotFound(p)
            | Error::Validation(p)
            | Error::Server(p)
            | Error::Api(p) => Some(p),
            Error::RateLimit { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Returns the human readable message of this error.
    pub fn message(&self) -> String {
        match self {
            Error::Network { message, .. } => message.clone(),
            Error::Configuration(message) => message.clone(),
            _ => match self.payload() {
                Some(payload) => payload.message.clone(),
                None => self.to_string(),
            },
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.payload().and_then(|p| p.status)
    }

    /// Returns the raw response body if one was captured.
    pub fn raw_body(&self) -> Option<&Value> {
        self.payload().and_then(|p| p.raw_body.as_ref())
    }

    /// Returns the `Retry-After` hint of a rate-limit error.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Error::RateLimit {
                retry_after_seconds,
                ..
            } => *retry_after_seconds,
            _ => None,
        }
    }
}

/// A specialized `Result` type for Jules API calls.
pub type Result<T> = std::result::Result<T, Error>;
