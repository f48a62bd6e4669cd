//! Thread-blocking variant of the client, pagination and polling.
//!
//! Requires the `blocking` feature (enabled by default). Everything here has
//! the same contract as its async counterpart; only the waiting differs:
//! backoff and poll intervals block the calling thread.
//!
//! Do not create or drop a [`Client`] from inside an async runtime.

use crate::{
    client::{describe, to_json},
    config::{ClientBuilder, ClientConfig},
    page::{Page, PageCollector},
    poll::{PollConfig, PollStep, PollTracker},
    request::RequestDescriptor,
    retry::RetryState,
    transport::{self, RequestStats, StatsCounter},
    Error, Result,
};
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use url::Url;

/// A blocking client for the Jules API.
///
/// The client owns a connection pool that is safe to share across threads:
/// clone it (cheap) and hand a clone to each thread. The pool is released by
/// [`Client::close`] or when the last clone drops; a request made after
/// `close` opens a new one.
///
/// # Examples
///
/// ```no_run
/// use jules_client::blocking::Client;
///
/// # fn example() -> Result<(), jules_client::Error> {
/// let client = Client::builder().api_key("my-api-key").build_blocking()?;
/// let source = client.get("sources/my-repo")?;
/// println!("{}", source["name"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    session: Mutex<Option<reqwest::blocking::Client>>,
    stats: StatsCounter,
}

impl Client {
    /// Creates a new `ClientBuilder`; finish with [`ClientBuilder::build_blocking`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from an already validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the HTTP client cannot be built.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let session = open_session(&config)?;

        transport::log_client_ready(&config, "blocking");
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                session: Mutex::new(Some(session)),
                stats: StatsCounter::default(),
            }),
        })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the request and error counts of this client.
    pub fn stats(&self) -> RequestStats {
        self.inner.stats.snapshot()
    }

    /// Releases the connection pool.
    ///
    /// Clones share the pool, so this closes it for all of them. A later
    /// request opens a fresh one.
    pub fn close(&self) {
        let session = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if session.is_some() {
            let stats = self.stats();
            tracing::info!(
                requests = stats.requests,
                errors = stats.errors,
                "Closed HTTP session"
            );
        }
    }

    /// Returns the shared connection pool, reopening it after [`Client::close`].
    fn session(&self) -> Result<reqwest::blocking::Client> {
        let mut slot = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let session = open_session(&self.inner.config)?;
        tracing::debug!(base_url = %self.inner.config.base_url, "Opened HTTP session");
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Executes a request, retrying transient failures.
    ///
    /// See [`crate::Client::execute`].
    pub fn execute(&self, request: &RequestDescriptor) -> Result<Value> {
        let url = transport::build_url(&self.inner.config.base_url, request)?;
        let session = self.session()?;
        self.inner.stats.record_request();

        let mut retry = RetryState::new(&self.inner.config.retry_policy);
        loop {
            transport::log_attempt(request, &url, retry.attempt());

            match attempt(&session, &url, request) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.inner.stats.record_error();
                    transport::log_failure(&e, request, retry.attempt());
                    let delay = retry.next_delay(e)?;
                    std::thread::sleep(delay);
                }
            }
        }
    }

    /// Makes a request from its parts. Only `GET` and `POST` are supported.
    pub fn request<K, V>(
        &self,
        method: Method,
        path: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
        body: Option<Value>,
    ) -> Result<Value>
    where
        K: Into<String>,
        V: ToString,
    {
        self.execute(&describe(method, path, params, body)?)
    }

    /// Makes a GET request to the specified path.
    pub fn get(&self, path: impl Into<String>) -> Result<Value> {
        self.execute(&RequestDescriptor::get(path))
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub fn post<B>(&self, path: impl Into<String>, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        self.execute(&RequestDescriptor::post(path, Some(to_json(body)?)))
    }

    /// Executes a request and decodes the body into `T`.
    pub fn call<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        transport::decode_value(self.execute(request)?)
    }

    /// Fetches one page of a list endpoint.
    pub fn list_page<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        field: &str,
    ) -> Result<Page<T>> {
        Page::from_envelope(self.execute(request)?, field)
    }

    /// Fetches every page of a list endpoint and returns all items in order.
    pub fn list_all<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        field: &str,
    ) -> Result<Vec<T>> {
        collect_all(|token| {
            let request = request.clone().with_page_token(token.as_deref());
            self.list_page(&request, field)
        })
    }
}

fn open_session(config: &ClientConfig) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .default_headers(config.default_headers.clone())
        .timeout(config.timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .danger_accept_invalid_certs(!config.verify_ssl)
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Issues a single attempt.
fn attempt(
    session: &reqwest::blocking::Client,
    url: &Url,
    request: &RequestDescriptor,
) -> Result<Value> {
    let mut builder = session.request(request.method().clone(), url.clone());
    if let Some(body) = request.body() {
        builder = builder.json(body);
    }

    let response = builder.send().map_err(Error::network)?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().map_err(Error::network)?;

    transport::interpret(status, &headers, &body)
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let stats = self.stats.snapshot();
        tracing::info!(
            requests = stats.requests,
            errors = stats.errors,
            "Closing Jules API client"
        );
    }
}

/// Fetches pages until no continuation token is returned.
///
/// See [`crate::collect_all`].
pub fn collect_all<T, F>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Result<Page<T>>,
{
    let mut collector = PageCollector::new();
    let mut token = None;

    loop {
        let page = fetch_page(token.take())?;
        match collector.push(page) {
            Some(next) => token = Some(next),
            None => return Ok(collector.finish()),
        }
    }
}

/// Polls until the fetched status is terminal, blocking between fetches.
///
/// See [`crate::poll_until_terminal`].
pub fn poll_until_terminal<S, F>(
    resource: &str,
    config: &PollConfig,
    mut fetch_status: F,
    is_success: impl Fn(&S) -> bool,
    is_failure: impl Fn(&S) -> bool,
) -> Result<S>
where
    F: FnMut() -> Result<S>,
{
    let started = Instant::now();
    let mut tracker = PollTracker::new(resource, config);

    loop {
        let status = fetch_status()?;
        match tracker.observe(is_success(&status), is_failure(&status), started.elapsed())? {
            PollStep::Done => return Ok(status),
            PollStep::Wait(interval) => std::thread::sleep(interval),
        }
    }
}
