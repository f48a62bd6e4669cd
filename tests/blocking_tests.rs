//! Tests for the blocking client against a wiremock server.
//!
//! The mock server needs a runtime to start and to mount mocks; the client
//! itself is always used outside of it.
#![cfg(feature = "blocking")]

use jules_client::blocking::{self, Client};
use jules_client::{ErrorKind, PollConfig, RequestDescriptor, RequestStats};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn start_server() -> (Runtime, MockServer) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let rt = Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    (rt, server)
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .api_key("test-key")
        .base_url(format!("{}/v1alpha", server.uri()))
        .retry_backoff_factor(Duration::from_millis(10))
        .build_blocking()
        .unwrap()
}

#[test]
fn test_blocking_get_and_post() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sources/repo"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "sources/repo"})))
            .expect(1)
            .mount(&server),
    );
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/v1alpha/sessions/abc:sendMessage"))
            .and(body_json(json!({"prompt": "also update the docs"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server),
    );

    let client = client_for(&server);
    assert_eq!(client.get("sources/repo").unwrap()["name"], "sources/repo");
    assert_eq!(
        client
            .post("/sessions/abc:sendMessage", &json!({"prompt": "also update the docs"}))
            .unwrap(),
        json!({})
    );
    assert_eq!(client.stats(), RequestStats { requests: 2, errors: 0 });
}

#[test]
fn test_blocking_retries_server_errors() {
    let (rt, server) = start_server();
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sessions/abc"))
            .respond_with(move |_req: &wiremock::Request| {
                if attempt_count_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"state": "COMPLETED"}))
                }
            })
            .mount(&server),
    );

    let client = client_for(&server);
    assert_eq!(client.get("sessions/abc").unwrap()["state"], "COMPLETED");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    assert_eq!(client.stats(), RequestStats { requests: 1, errors: 2 });
}

#[test]
fn test_blocking_not_found_is_not_retried() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sessions/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": {"message": "Session not found"}})),
            )
            .expect(1)
            .mount(&server),
    );

    let err = client_for(&server).get("sessions/missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "Session not found");
}

#[test]
fn test_blocking_list_all() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sources"))
            .and(query_param_is_missing("pageToken"))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sources": [{"id": "a"}, {"id": "b"}],
                "nextPageToken": "t1",
            })))
            .expect(1)
            .mount(&server),
    );
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sources"))
            .and(query_param("pageToken", "t1"))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sources": [{"id": "c"}],
                "nextPageToken": "",
            })))
            .expect(1)
            .mount(&server),
    );

    let request = RequestDescriptor::get("sources").with_page_size(Some(2));
    let sources: Vec<Value> = client_for(&server).list_all(&request, "sources").unwrap();

    let ids: Vec<&str> = sources.iter().filter_map(|s| s["id"].as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[test]
fn test_blocking_poll_until_completed() {
    let (rt, server) = start_server();
    let poll_count = Arc::new(AtomicUsize::new(0));
    let poll_count_clone = poll_count.clone();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sessions/abc"))
            .respond_with(move |_req: &wiremock::Request| {
                let state = if poll_count_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                    "IN_PROGRESS"
                } else {
                    "COMPLETED"
                };
                ResponseTemplate::new(200).set_body_json(json!({"state": state}))
            })
            .mount(&server),
    );

    let client = client_for(&server);
    let session = blocking::poll_until_terminal(
        "sessions/abc",
        &PollConfig::new(Duration::from_millis(10)),
        || client.get("sessions/abc"),
        |s: &Value| s["state"] == "COMPLETED",
        |s: &Value| s["state"] == "FAILED",
    )
    .unwrap();

    assert_eq!(session["state"], "COMPLETED");
    assert_eq!(poll_count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_blocking_clones_share_stats_across_threads() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sources": []})))
            .expect(4)
            .mount(&server),
    );

    let client = client_for(&server);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            std::thread::spawn(move || client.get("sources").map(|_| ()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(client.stats().requests, 4);
}

#[test]
fn test_blocking_close_releases_pool_and_client_recovers() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sources": []})))
            .expect(2)
            .mount(&server),
    );

    let client = client_for(&server);
    client.get("sources").unwrap();
    client.close();
    client.close();
    client.get("sources").unwrap();
    assert_eq!(client.stats().requests, 2);
}

#[test]
fn test_blocking_network_errors_are_retried_then_returned() {
    // Nothing listens on the discard port
    let client = Client::builder()
        .api_key("test-key")
        .base_url("http://127.0.0.1:9/v1alpha")
        .retry_backoff_factor(Duration::from_millis(10))
        .build_blocking()
        .unwrap();

    let err = client.get("sessions").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.status().is_none());
    assert_eq!(client.stats(), RequestStats { requests: 1, errors: 3 });
}

#[test]
fn test_blocking_rate_limit_surfaces_retry_hint_without_retrying() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sessions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_json(json!({"error": {"message": "Quota exceeded"}})),
            )
            .expect(1)
            .mount(&server),
    );

    let err = client_for(&server).get("sessions").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.retry_after_seconds(), Some(7));
    assert_eq!(err.message(), "Quota exceeded");
}

#[test]
fn test_blocking_malformed_success_body_is_not_retried() {
    let (rt, server) = start_server();

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/v1alpha/sessions/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server),
    );

    let err = client_for(&server).get("sessions/abc").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.raw_body(), Some(&json!("<html>oops</html>")));
}
