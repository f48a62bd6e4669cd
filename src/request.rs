//! Request descriptors.

use http::Method;
use serde_json::Value;

/// Query parameter carrying the page size of list endpoints.
pub const PAGE_SIZE_PARAM: &str = "pageSize";
/// Query parameter carrying the continuation token of list endpoints.
pub const PAGE_TOKEN_PARAM: &str = "pageToken";

/// Everything needed to issue one API call.
///
/// A descriptor is built once and never changes afterwards, so every retry of
/// a call hits the same method, path, query and body.
///
/// # Examples
///
/// ```
/// use jules_client::RequestDescriptor;
///
/// let request = RequestDescriptor::get("sessions")
///     .with_page_size(Some(10))
///     .with_page_token(None);
///
/// assert_eq!(request.path(), "sessions");
/// assert_eq!(request.query(), &[("pageSize".to_string(), "10".to_string())]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestDescriptor {
    /// Describes a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    /// Describes a POST request with an optional JSON body.
    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::POST, path, body)
    }

    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds a query parameter only when a value is present.
    pub fn with_optional_query<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with_query(key, value),
            None => self,
        }
    }

    /// Sets `pageSize` when given.
    pub fn with_page_size(self, page_size: Option<u32>) -> Self {
        self.with_optional_query(PAGE_SIZE_PARAM, page_size)
    }

    /// Sets `pageToken` when given and non-empty.
    pub fn with_page_token(self, page_token: Option<&str>) -> Self {
        self.with_optional_query(PAGE_TOKEN_PARAM, page_token.filter(|t| !t.is_empty()))
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path, relative to the client's base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The JSON body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
