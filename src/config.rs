//! Client configuration.
//!
//! [`ClientBuilder`] collects settings, validates them and produces either the
//! async [`Client`] or, with the `blocking` feature, a
//! [`blocking::Client`](crate::blocking::Client). Both read the same
//! [`ClientConfig`].

use crate::rate_limit::RateLimitConfig;
use crate::retry::{RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES};
use crate::transport;
use crate::{Client, Error, Result};
use http::HeaderMap;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Root URL of the public API.
pub const DEFAULT_BASE_URL: &str = "https://jules.googleapis.com/v1alpha";
/// Per-request timeout used unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Idle connections kept per host by the connection pool.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;
/// Environment variable read by [`ClientBuilder::from_env`] for the API key.
pub const API_KEY_ENV: &str = "JULES_API_KEY";
/// Environment variable read by [`ClientBuilder::from_env`] for the base URL.
pub const BASE_URL_ENV: &str = "JULES_BASE_URL";

/// Validated settings shared by both client variants.
#[derive(Clone)]
pub struct ClientConfig {
    /// Root every request path is joined onto.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry and backoff behaviour.
    pub retry_policy: RetryPolicy,
    /// Whether TLS certificates are verified.
    pub verify_ssl: bool,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    pub(crate) default_headers: HeaderMap,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // HeaderMap's Debug redacts the sensitive key value
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("verify_ssl", &self.verify_ssl)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

/// Builder for configuring and creating a client.
///
/// Only the API key is required; everything else has a default.
///
/// # Examples
///
/// ```no_run
/// use jules_client::Client;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), jules_client::Error> {
/// let client = Client::builder()
///     .api_key("my-api-key")
///     .timeout(Duration::from_secs(60))
///     .max_retries(5)
///     .retry_backoff_factor(Duration::from_millis(500))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff_factor: Duration,
    max_backoff: Duration,
    jitter: bool,
    rate_limit_config: RateLimitConfig,
    verify_ssl: bool,
    pool_max_idle_per_host: usize,
    user_agent: String,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: false,
            rate_limit_config: RateLimitConfig::default(),
            verify_ssl: true,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Creates a builder seeded from `JULES_API_KEY` and `JULES_BASE_URL`.
    ///
    /// Variables that are unset are left at their defaults; a missing key is
    /// reported when the client is built.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            builder = builder.api_key(key);
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            builder = builder.base_url(url);
        }
        builder
    }

    /// Sets the API key sent with every request. Required.
    ///
    /// A key that is empty or whitespace only is rejected when the client is
    /// built.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the base URL. Defaults to [`DEFAULT_BASE_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of attempts for one call.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn retry_backoff_factor(mut self, factor: Duration) -> Self {
        self.retry_backoff_factor = factor;
        self
    }

    /// Sets the cap on a single backoff delay.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Enables random jitter on backoff delays.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets how 429 responses are handled.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Disables TLS certificate verification when `false`. Testing only.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Sets how many idle connections are kept per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the API key is missing or empty, the
    /// base URL is invalid, the timeout is zero or the backoff factor is zero.
    pub fn into_config(self) -> Result<ClientConfig> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Configuration("API key is required".to_string()))?;

        let raw_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base_url = Url::parse(raw_url)
            .map_err(|e| Error::Configuration(format!("Invalid base URL {raw_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Base URL cannot be joined with paths: {raw_url}"
            )));
        }

        if self.timeout.is_zero() {
            return Err(Error::Configuration("Timeout must be positive".to_string()));
        }
        if self.retry_backoff_factor.is_zero() {
            return Err(Error::Configuration(
                "Retry backoff factor must be positive".to_string(),
            ));
        }

        let default_headers = transport::default_headers(&api_key, &self.user_agent)?;

        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            retry_policy: RetryPolicy {
                max_retries: self.max_retries,
                backoff_factor: self.retry_backoff_factor,
                max_backoff: self.max_backoff,
                jitter: self.jitter,
                rate_limit: self.rate_limit_config,
            },
            verify_ssl: self.verify_ssl,
            pool_max_idle_per_host: self.pool_max_idle_per_host,
            default_headers,
        })
    }

    /// Builds the async [`Client`].
    ///
    /// The underlying HTTP session is created on first use.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::into_config`].
    pub fn build(self) -> Result<Client> {
        Ok(Client::from_config(self.into_config()?))
    }

    /// Builds the thread-blocking [`blocking::Client`](crate::blocking::Client).
    ///
    /// Must not be called from within an async runtime.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::into_config`]; also fails if the HTTP client cannot be built.
    #[cfg(feature = "blocking")]
    pub fn build_blocking(self) -> Result<crate::blocking::Client> {
        crate::blocking::Client::from_config(self.into_config()?)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
