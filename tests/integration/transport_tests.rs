//! Transport behaviour against a real HTTP server

use humidor::config::TransportConfig;
use humidor::transport::TransportError;
use humidor::ResilientTransport;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Transport configuration with millisecond backoff
fn fast_transport() -> ResilientTransport {
    let config = TransportConfig {
        initial_delay_ms: 5,
        backoff_ms: 5,
        max_attempts: 3,
        timeout_secs: 5,
        user_agent: "humidor-test/1.0".to_string(),
    };
    ResilientTransport::from_config(&config).expect("Failed to build transport")
}

#[tokio::test]
async fn test_always_rate_limited_sends_exactly_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let transport = fast_transport();
    let result = transport.get(&format!("{}/busy", mock_server.uri())).await;

    assert!(matches!(
        result,
        Err(TransportError::RetryExhausted { attempts: 3, .. })
    ));
    assert_eq!(transport.retry_state().attempt_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = fast_transport();
    let response = transport
        .get(&format!("{}/item", mock_server.uri()))
        .await
        .expect("Request should succeed after backoff");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "<h1>ok</h1>");
    assert_eq!(transport.retry_state().attempt_count(), 0);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance until noon"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = fast_transport();
    let result = transport.get(&format!("{}/broken", mock_server.uri())).await;

    match result {
        Err(TransportError::Status {
            status, snippet, ..
        }) => {
            assert_eq!(status, 503);
            assert_eq!(snippet, "maintenance until noon");
        }
        other => panic!("Expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("session=abc"));

    let transport = fast_transport();
    let response = transport
        .get_with_headers(&format!("{}/private", mock_server.uri()), &headers)
        .await
        .expect("Request with cookie should succeed");

    assert_eq!(response.body, "welcome");
}
