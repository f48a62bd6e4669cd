//! Async HTTP client with retry logic and rich error handling.
//!
//! The [`Client`] type is the main entry point for talking to the API from
//! async code. Use [`ClientBuilder`] to configure and create clients.

use crate::{
    config::{ClientBuilder, ClientConfig},
    page::{collect_all, Page},
    request::RequestDescriptor,
    retry::RetryState,
    transport::{self, RequestStats, StatsCounter},
    Error, ErrorPayload, Result,
};
use http::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// An async client for the Jules API.
///
/// Cloning is cheap and every clone shares one instance: one HTTP session, one
/// set of counters. The session is opened on the first request, reused by all
/// later ones, and released by [`Client::close`] or when the last clone drops,
/// whichever comes first. Dropping covers every exit path, including errors,
/// panics and cancelled futures.
///
/// # Examples
///
/// ```no_run
/// use jules_client::{Client, RequestDescriptor};
/// use serde_json::{json, Value};
///
/// # async fn example() -> Result<(), jules_client::Error> {
/// let client = Client::builder().api_key("my-api-key").build()?;
///
/// let session = client
///     .post("sessions", &json!({
///         "prompt": "Fix the login bug",
///         "sourceContext": {"source": "sources/my-repo"},
///     }))
///     .await?;
/// println!("created {}", session["name"]);
///
/// let sessions: Vec<Value> = client
///     .list_all(&RequestDescriptor::get("sessions").with_page_size(Some(50)), "sessions")
///     .await?;
/// println!("{} sessions", sessions.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    session: Mutex<Option<reqwest::Client>>,
    stats: StatsCounter,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from an already validated configuration.
    pub fn from_config(config: ClientConfig) -> Self {
        transport::log_client_ready(&config, "async");
        Self {
            inner: Arc::new(ClientInner {
                config,
                session: Mutex::new(None),
                stats: StatsCounter::default(),
            }),
        }
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the request and error counts of this client.
    pub fn stats(&self) -> RequestStats {
        self.inner.stats.snapshot()
    }

    /// Releases the HTTP session.
    ///
    /// Connections are closed once in-flight requests finish. A later request
    /// opens a fresh session.
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

    /// Returns the shared HTTP session, opening it on first use.
    fn session(&self) -> Result<reqwest::Client> {
        let mut slot = self
            .inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let config = &self.inner.config;
        let session = reqwest::Client::builder()
            .default_headers(config.default_headers.clone())
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;

        tracing::debug!(base_url = %config.base_url, "Opened HTTP session");
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Executes a request, retrying transient failures.
    ///
    /// Network and 5xx failures are retried with exponential backoff up to
    /// `max_retries` attempts; every other error is returned on first
    /// occurrence. A success without content yields an empty JSON object.
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<Value> {
        let url = transport::build_url(&self.inner.config.base_url, request)?;
        let session = self.session()?;
        self.inner.stats.record_request();

        let mut retry = RetryState::new(&self.inner.config.retry_policy);
        loop {
            transport::log_attempt(request, &url, retry.attempt());

            match self.attempt(&session, &url, request).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.inner.stats.record_error();
                    transport::log_failure(&e, request, retry.attempt());
                    let delay = retry.next_delay(e)?;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Issues a single attempt.
    async fn attempt(
        &self,
        session: &reqwest::Client,
        url: &Url,
        request: &RequestDescriptor,
    ) -> Result<Value> {
        let mut builder = session.request(request.method().clone(), url.clone());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Error::network)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(Error::network)?;

        transport::interpret(status, &headers, &body)
    }

    /// Makes a request from its parts.
    ///
    /// Only `GET` and `POST` are supported.
    pub async fn request<K, V>(
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
        let request = describe(method, path, params, body)?;
        self.execute(&request).await
    }

    /// Makes a GET request to the specified path.
    pub async fn get(&self, path: impl Into<String>) -> Result<Value> {
        self.execute(&RequestDescriptor::get(path)).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<B>(&self, path: impl Into<String>, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let request = RequestDescriptor::post(path, Some(to_json(body)?));
        self.execute(&request).await
    }

    /// Executes a request and decodes the body into `T`.
    pub async fn call<T>(&self, request: &RequestDescriptor) -> Result<T>
    where
        T: DeserializeOwned,
    {
        transport::decode_value(self.execute(request).await?)
    }

    /// Fetches one page of a list endpoint.
    ///
    /// `field` names the array in the response envelope, e.g. `"sessions"`.
    pub async fn list_page<T>(&self, request: &RequestDescriptor, field: &str) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        Page::from_envelope(self.execute(request).await?, field)
    }

    /// Fetches every page of a list endpoint and returns all items in order.
    ///
    /// `request` must not carry a page token; one is added per page.
    pub async fn list_all<T>(&self, request: &RequestDescriptor, field: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        collect_all(|token| {
            let request = request.clone().with_page_token(token.as_deref());
            async move { self.list_page(&request, field).await }
        })
        .await
    }
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

/// Builds a descriptor from loose parts.
pub(crate) fn describe<K, V>(
    method: Method,
    path: impl Into<String>,
    params: impl IntoIterator<Item = (K, V)>,
    body: Option<Value>,
) -> Result<RequestDescriptor>
where
    K: Into<String>,
    V: ToString,
{
    let request = if method == Method::GET {
        if body.is_some() {
            return Err(Error::Configuration("GET requests cannot carry a body".into()));
        }
        RequestDescriptor::get(path)
    } else if method == Method::POST {
        RequestDescriptor::post(path, body)
    } else {
        return Err(Error::Configuration(format!(
            "Unsupported HTTP method: {method}"
        )));
    };

    Ok(params
        .into_iter()
        .fold(request, |request, (key, value)| request.with_query(key, value)))
}

/// Serializes a request body.
pub(crate) fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| Error::Api(ErrorPayload::new(format!("Failed to serialize request: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_describe_builds_get_and_post() {
        let get = describe(Method::GET, "sessions", [("pageSize", 10)], None).unwrap();
        assert_eq!(get, RequestDescriptor::get("sessions").with_query("pageSize", 10));

        let body = json!({"prompt": "more tests please"});
        let post = describe(
            Method::POST,
            "sessions/abc:sendMessage",
            Vec::<(String, String)>::new(),
            Some(body.clone()),
        )
        .unwrap();
        assert_eq!(post.body(), Some(&body));
    }

    #[test]
    fn test_describe_rejects_other_methods() {
        let err = describe(Method::DELETE, "sessions/abc", [("a", "b")], None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = describe(Method::GET, "sessions", [("a", "b")], Some(json!({}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_session_is_lazy_and_reopens_after_close() {
        let client = Client::builder().api_key("key").build().unwrap();
        assert!(client.inner.session.lock().unwrap().is_none());

        client.session().unwrap();
        assert!(client.inner.session.lock().unwrap().is_some());

        client.close();
        assert!(client.inner.session.lock().unwrap().is_none());

        client.session().unwrap();
        assert!(client.inner.session.lock().unwrap().is_some());
    }

    #[test]
    fn test_clones_share_one_instance() {
        let client = Client::builder().api_key("key").build().unwrap();
        let clone = client.clone();
        clone.inner.stats.record_request();
        assert_eq!(client.stats().requests, 1);
        assert!(Arc::ptr_eq(&client.inner, &clone.inner));
    }
}
