//! # jules-client - a retrying client for the Jules task-execution API
//!
//! Jules runs long-lived "sessions" of agentic work against a source
//! repository. This crate is the transport underneath a Jules SDK: it sends
//! authenticated JSON requests, classifies failures into a typed error,
//! retries the transient ones, walks paginated list endpoints and waits for
//! remote work to finish.
//!
//! ## Quick Start
//!
//! ```no_run
//! use jules_client::{poll_until_terminal, Client, PollConfig, RequestDescriptor};
//! use serde_json::{json, Value};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), jules_client::Error> {
//!     let client = Client::builder()
//!         .api_key(std::env::var("JULES_API_KEY").unwrap_or_default())
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let session = client
//!         .post("sessions", &json!({
//!             "prompt": "Add unit tests for the parser",
//!             "sourceContext": {"source": "sources/github/acme/parser"},
//!         }))
//!         .await?;
//!     let name = session["name"].as_str().unwrap_or_default().to_string();
//!
//!     let finished = poll_until_terminal(
//!         &name,
//!         &PollConfig::new(Duration::from_secs(5)),
//!         || client.get(name.clone()),
//!         |s| s["state"] == "COMPLETED",
//!         |s| s["state"] == "FAILED",
//!     )
//!     .await?;
//!     println!("{}", finished["state"]);
//!
//!     let activities: Vec<Value> = client
//!         .list_all(&RequestDescriptor::get(format!("{name}/activities")), "activities")
//!         .await?;
//!     println!("{} activities", activities.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Network failures and 5xx responses are retried with exponential backoff
//! (1s, 2s, 4s, ... capped at 10s by default), up to `max_retries` attempts
//! in total. Everything else, 429 included, is returned to the caller on the
//! first occurrence. A 429's `Retry-After` hint is available through
//! [`Error::retry_after_seconds`]; see [`rate_limit::RateLimitConfig`] to have
//! the client wait it out instead.
//!
//! ## Blocking
//!
//! With the default `blocking` feature, [`blocking`] offers the same API for
//! code that does not run inside an async runtime.

#[cfg(feature = "blocking")]
pub mod blocking;
mod client;
pub mod config;
mod error;
pub mod page;
pub mod poll;
pub mod rate_limit;
mod request;
pub mod retry;
pub mod transport;

pub use client::Client;
pub use config::{ClientBuilder, ClientConfig};
pub use error::{Error, ErrorKind, ErrorPayload, Result};
pub use page::{collect_all, Page};
pub use poll::{poll_until_terminal, PollConfig};
pub use request::RequestDescriptor;
pub use retry::{RetryPolicy, RetryState};
pub use transport::RequestStats;
