//! Tests for the fetch module

use super::*;
use crate::auth::Session;
use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use crate::types::{BackoffType, RawPage, ResourceRef};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves a page per reference, failing the listed IDs
struct FakeSource {
    failing: HashSet<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSource {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|s| (*s).to_string()).collect(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn fetch(&self, reference: &ResourceRef) -> Result<RawPage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&reference.id) {
            return Err(Error::http_status(404, "Not found"));
        }
        Ok(RawPage::new(
            reference.clone(),
            format!("https://lms.example.org/{}", reference.id),
            format!("<p>{}</p>", reference.id),
        ))
    }
}

fn refs(ids: &[&str]) -> Vec<ResourceRef> {
    ids.iter().map(|id| ResourceRef::assignment(*id)).collect()
}

fn fast_http() -> HttpClientConfig {
    HttpClientConfig::builder()
        .max_retries(0)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(5),
            Duration::from_millis(5),
        )
        .no_rate_limit()
        .build()
}

// ============================================================================
// Pool Tests
// ============================================================================

#[tokio::test]
async fn test_fetch_all_isolates_failures() {
    let source = FakeSource::new(&["3"]);
    let refs = refs(&["1", "2", "3", "4", "5"]);

    let results = fetch_all(&source, &refs, 2).await;
    assert_eq!(results.len(), 5);

    let failed = &results[&ResourceRef::assignment("3")];
    match failed {
        Err(Error::Fetch { resource, message }) => {
            assert_eq!(resource, "assignment_summary:3");
            assert!(message.contains("404"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(results[&ResourceRef::assignment("5")].is_ok());
}

#[tokio::test]
async fn test_fetch_all_respects_concurrency() {
    let source = FakeSource::new(&[]);
    let refs = refs(&["1", "2", "3", "4", "5", "6", "7", "8"]);

    fetch_all(&source, &refs, 3).await;
    assert!(source.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_zero_concurrency_means_one() {
    let source = FakeSource::new(&[]);
    let results = fetch_all(&source, &refs(&["1", "2", "3"]), 0).await;

    assert_eq!(results.len(), 3);
    assert_eq!(source.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fetch_all_empty() {
    let source = FakeSource::new(&[]);
    assert!(fetch_all(&source, &[], 4).await.is_empty());
}

#[tokio::test]
async fn test_partition_results_keeps_input_order() {
    let source = FakeSource::new(&["2"]);
    let refs = refs(&["3", "1", "2"]);

    let results = fetch_all(&source, &refs, 3).await;
    let (pages, failures) = partition_results(&refs, results);

    let ids: Vec<&str> = pages.iter().map(|p| p.reference.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "1"]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, ResourceRef::assignment("2"));
}

#[tokio::test]
async fn test_default_call_service_is_unsupported() {
    let source = FakeSource::new(&[]);
    let err = source
        .call_service("key", "core_webservice_get_site_info", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not available"));
}

// ============================================================================
// Session Source Tests
// ============================================================================

#[tokio::test]
async fn test_session_fetches_with_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mod/quiz/report.php"))
        .and(query_param("id", "42"))
        .and(query_param("mode", "overview"))
        .and(header("Cookie", "MoodleSession=tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<table id=\"attempts\"></table>"))
        .expect(1)
        .mount(&server)
        .await;

    let session = Session::from_token(server.uri(), "tok", &fast_http()).unwrap();
    let page = session.fetch(&ResourceRef::quiz("42")).await.unwrap();

    assert_eq!(page.reference, ResourceRef::quiz("42"));
    assert!(page.url.contains("mode=overview"));
    assert!(page.html.contains("attempts"));
}

#[tokio::test]
async fn test_session_redirected_to_login_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/course/view.php"))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("Location", format!("{}/login/index.php", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login/index.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form id=\"login\"></form>"))
        .mount(&server)
        .await;

    let session = Session::from_token(server.uri(), "stale", &fast_http()).unwrap();
    let err = session.fetch(&ResourceRef::course("9")).await.unwrap_err();

    assert!(matches!(err, Error::Fetch { .. }));
    assert!(err.to_string().contains("session expired"));
}

#[tokio::test]
async fn test_session_http_error_becomes_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mod/assign/view.php"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let session = Session::from_token(server.uri(), "tok", &fast_http()).unwrap();
    let refs = vec![ResourceRef::assignment("1")];
    let results = fetch_all(&session, &refs, 1).await;

    let err = results[&refs[0]].as_ref().unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert!(err.to_string().contains("HTTP 404"));
}
