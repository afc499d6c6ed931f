//! Integration tests for retry with backoff.

use signvault::{Client, ClientConfig, RetryPolicy};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn envelope_json() -> serde_json::Value {
    serde_json::json!({
        "id": "env_1",
        "subject": "NDA",
        "status": "sent",
        "createdAt": "2024-01-01T00:00:00Z"
    })
}

fn fast_retry_client(server: &MockServer) -> Client {
    Client::with_config(ClientConfig {
        base_url: server.uri(),
        api_key: Some("sv_test".to_string()),
        retry: RetryPolicy {
            max_attempts: 5,
            unit: Duration::from_millis(1),
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_retry_bound_on_persistent_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&mock_server)
        .await;

    let client = fast_retry_client(&mock_server);
    let err = client.envelopes().get("env_1").await.unwrap_err();

    assert_eq!(err.status_code(), Some(503));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_retry_client(&mock_server);
    let envelope = client.envelopes().get("env_1").await.unwrap();
    assert_eq!(envelope.data.id, "env_1");
}

#[tokio::test]
async fn test_mutations_are_retried_too() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/envelopes"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/envelopes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_retry_client(&mock_server);
    let envelope = client
        .envelopes()
        .create(signvault::CreateEnvelopeRequest {
            subject: "NDA".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(envelope.id, "env_1");
}

#[tokio::test]
async fn test_non_retryable_statuses_fail_immediately() {
    for status in [400u16, 403, 404, 500, 501] {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/envelopes/env_1"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = fast_retry_client(&mock_server);
        let err = client.envelopes().get("env_1").await.unwrap_err();
        assert_eq!(err.status_code(), Some(status));
    }
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = fast_retry_client(&mock_server);
    let started = std::time::Instant::now();
    client.envelopes().get("env_1").await.unwrap();

    // The 1ms backoff unit would retry almost at once.
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_exhausted_rate_limit_surfaces_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-RateLimit-Limit", "100")
                .insert_header("X-RateLimit-Remaining", "0")
                .insert_header("X-RateLimit-Reset", "1700000000")
                .set_body_json(serde_json::json!({"message": "Too many requests"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_config(ClientConfig {
        base_url: mock_server.uri(),
        api_key: Some("sv_test".to_string()),
        retry: RetryPolicy::none(),
        ..Default::default()
    })
    .unwrap();

    let err = client.envelopes().get("env_1").await.unwrap_err();
    let api = err.api().unwrap();
    assert!(api.is_rate_limit_error());
    assert_eq!(api.message, "Too many requests");

    let rate_limit = api.rate_limit.expect("rate limit headers");
    assert_eq!(rate_limit.limit, 100);
    assert_eq!(rate_limit.remaining, 0);
    assert_eq!(rate_limit.reset, Some(1_700_000_000));
}

#[tokio::test]
async fn test_timeout_is_retried_as_network_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/envelopes/env_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope_json())
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = Client::with_config(ClientConfig {
        base_url: mock_server.uri(),
        api_key: Some("sv_test".to_string()),
        timeout: Some(Duration::from_millis(50)),
        retry: RetryPolicy {
            max_attempts: 2,
            unit: Duration::from_millis(1),
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();

    let err = client.envelopes().get("env_1").await.unwrap_err();
    let api = err.api().unwrap();
    assert!(api.is_network_error());
    assert_eq!(api.code.as_deref(), Some("ETIMEDOUT"));
}
