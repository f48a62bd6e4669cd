//! Rate limit hint parsing and the opt-in policy for honoring it.
//!
//! A 429 response is surfaced to the caller by default, with the server's
//! `Retry-After` hint attached to the error. Callers who would rather wait can
//! opt in with [`RateLimitConfig::honor_retry_after`].

use http::HeaderMap;
use std::time::Duration;

/// Parses the `Retry-After` header as integer seconds.
///
/// Returns `None` when the header is absent or not an integer (HTTP dates are
/// not interpreted).
///
/// # Examples
///
/// ```
/// use jules_client::rate_limit::parse_retry_after;
/// use http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "60".parse().unwrap());
/// assert_eq!(parse_retry_after(&headers), Some(60));
/// ```
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    header.trim().parse::<u64>().ok()
}

/// Configuration for rate limit handling.
///
/// # Examples
///
/// ```
/// use jules_client::rate_limit::RateLimitConfig;
/// use std::time::Duration;
///
/// let config = RateLimitConfig::builder()
///     .honor_retry_after(true)
///     .max_wait(Duration::from_secs(30))
///     .build();
/// assert!(config.honor_retry_after);
/// ```
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether a 429 carrying a `Retry-After` hint is retried after the hinted delay.
    ///
    /// Defaults to `false`: rate-limit errors propagate on first occurrence.
    pub honor_retry_after: bool,

    /// Upper bound on a honored hint. Defaults to 60 seconds.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            honor_retry_after: false,
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Creates a new builder for configuring rate limit handling.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::default()
    }

    /// Returns the delay to honor for a hint, or `None` if hints are not honored.
    pub fn delay_for_hint(&self, retry_after_seconds: Option<u64>) -> Option<Duration> {
        if !self.honor_retry_after {
            return None;
        }
        retry_after_seconds.map(|secs| Duration::from_secs(secs).min(self.max_wait))
    }
}

/// Builder for `RateLimitConfig`.
#[derive(Default)]
pub struct RateLimitConfigBuilder {
    honor_retry_after: Option<bool>,
    max_wait: Option<Duration>,
}

impl RateLimitConfigBuilder {
    /// Sets whether `Retry-After` hints are honored.
    pub fn honor_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = Some(honor);
        self
    }

    /// Sets the maximum wait for a honored hint.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Builds the `RateLimitConfig`.
    pub fn build(self) -> RateLimitConfig {
        let default = RateLimitConfig::default();
        RateLimitConfig {
            honor_retry_after: self.honor_retry_after.unwrap_or(default.honor_retry_after),
            max_wait: self.max_wait.unwrap_or(default.max_wait),
        }
    }
}
