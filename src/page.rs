//! Pagination over list endpoints.
//!
//! List endpoints answer with an envelope of the form
//! `{ "<field>": [...], "nextPageToken": "..." }`. A missing or empty token is
//! the only signal that the last page has been reached.

use crate::transport::decode_value;
use crate::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

/// Envelope key carrying the continuation token.
pub const NEXT_PAGE_TOKEN_FIELD: &str = "nextPageToken";

/// One page of a list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items of this page, in server order.
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page. An empty token is treated as absent.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token: next_page_token.filter(|t| !t.is_empty()),
        }
    }

    /// Returns `true` if more pages follow.
    pub fn has_next(&self) -> bool {
        self.next_page_token.is_some()
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Decodes a list envelope.
    ///
    /// A missing or `null` item field yields an empty page.
    ///
    /// # Examples
    ///
    /// ```
    /// use jules_client::Page;
    /// use serde_json::{json, Value};
    ///
    /// let page: Page<Value> = Page::from_envelope(
    ///     json!({"sessions": [{"id": "a"}, {"id": "b"}], "nextPageToken": "t2"}),
    ///     "sessions",
    /// )
    /// .unwrap();
    /// assert_eq!(page.items.len(), 2);
    /// assert_eq!(page.next_page_token.as_deref(), Some("t2"));
    /// ```
    pub fn from_envelope(mut envelope: Value, field: &str) -> Result<Self> {
        let items = match envelope.get_mut(field).map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(items) => decode_value(items)?,
        };
        let next_page_token = envelope
            .get(NEXT_PAGE_TOKEN_FIELD)
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Self::new(items, next_page_token))
    }
}

/// Accumulates pages in arrival order.
#[derive(Debug)]
pub(crate) struct PageCollector<T> {
    items: Vec<T>,
    pages: usize,
}

impl<T> PageCollector<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            pages: 0,
        }
    }

    /// Appends a page and returns the token of the next one, if any.
    pub(crate) fn push(&mut self, page: Page<T>) -> Option<String> {
        self.pages += 1;
        let received = page.items.len();
        self.items.extend(page.items);
        let next = page.next_page_token.filter(|t| !t.is_empty());

        tracing::debug!(
            page = self.pages,
            items = received,
            total = self.items.len(),
            has_next = next.is_some(),
            "Collected page"
        );
        next
    }

    pub(crate) fn finish(self) -> Vec<T> {
        self.items
    }
}

/// Fetches pages until no continuation token is returned.
///
/// `fetch_page` receives `None` for the first page and the previous page's
/// token afterwards. Items are returned in server order across pages. Any
/// error aborts the whole accumulation.
///
/// # Examples
///
/// ```
/// use jules_client::{collect_all, Page};
///
/// # async fn example() -> Result<(), jules_client::Error> {
/// let all = collect_all(|token| async move {
///     Ok(match token.as_deref() {
///         None => Page::new(vec![1, 2], Some("next".to_string())),
///         Some(_) => Page::new(vec![3], None),
///     })
/// })
/// .await?;
/// assert_eq!(all, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
pub async fn collect_all<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut collector = PageCollector::new();
    let mut token = None;

    loop {
        let page = fetch_page(token.take()).await?;
        match collector.push(page) {
            Some(next) => token = Some(next),
            None => return Ok(collector.finish()),
        }
    }
}
