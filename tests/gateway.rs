//! End-to-end admission tests against a mock upstream.

use std::net::SocketAddr;

use admission_gateway::config::{load_policy, ConfigError, Destination, PolicySet};
use admission_gateway::health::serve_liveness;
use admission_gateway::lifecycle::Shutdown;
use reqwest::StatusCode;
use serde_json::{json, Value};
use serial_test::serial;
use tokio::net::TcpListener;

mod common;

fn scenario_rules() -> Value {
    json!({
        "method_validation_enabled": true,
        "allowed_methods": ["GET", "POST"],
        "uri_validation_enabled": false,
        "header_validation_enabled": true,
        "required_headers": {"X-API-KEY": "*"},
        "payload_limiting_enabled": true,
        "max_payload_size": 1024,
        "json_validation_enabled": true,
        "json_schema": {
            "type": "object",
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
            "required": ["name", "age"]
        }
    })
}

async fn error_of(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_concrete_scenario() {
    let upstream = common::start_mock_upstream().await;
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &scenario_rules())).await;
    let client = reqwest::Client::new();

    let response = client
        .put(common::url(gateway, "/data"))
        .header("X-API-KEY", "anything")
        .json(&json!({"name": "John", "age": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(error_of(response).await, "Method PUT not allowed");

    let response = client
        .post(common::url(gateway, "/data"))
        .header("X-API-KEY", "anything")
        .json(&json!({"name": "John"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await, "Invalid JSON format");

    let response = client
        .post(common::url(gateway, "/data"))
        .header("X-API-KEY", "anything")
        .json(&json!({"name": "John", "age": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-upstream"], "mock");
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"status": "success", "received_data": {"name": "John", "age": 30}})
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_payload_is_413() {
    let upstream = common::start_mock_upstream().await;
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &scenario_rules())).await;

    let response = reqwest::Client::new()
        .post(common::url(gateway, "/data"))
        .header("X-API-KEY", "anything")
        .json(&json!({"name": "x".repeat(2048), "age": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        error_of(response).await,
        "Payload size exceeds the limit of 1024 bytes"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_required_header_is_403() {
    let upstream = common::start_mock_upstream().await;
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &scenario_rules())).await;

    let response = reqwest::Client::new()
        .post(common::url(gateway, "/data"))
        .json(&json!({"name": "John", "age": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_of(response).await, "Missing required header 'X-API-KEY'");

    shutdown.trigger();
}

#[tokio::test]
async fn test_detailed_errors_echo_schema_message() {
    let upstream = common::start_mock_upstream().await;
    let mut rules = scenario_rules();
    rules["detailed_errors_enabled"] = json!(true);
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &rules)).await;

    let response = reqwest::Client::new()
        .post(common::url(gateway, "/data"))
        .header("X-API-KEY", "anything")
        .json(&json!({"name": "John"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = error_of(response).await;
    assert!(message.contains("age"), "{message}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_rate_limit_trips_after_quota() {
    let upstream = common::start_mock_upstream().await;
    let rules = json!({"rate_limiting_enabled": true, "rate_limit": "3 per minute"});
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &rules)).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client.get(common::url(gateway, "/health")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = client.get(common::url(gateway, "/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(
        error_of(response).await,
        "Rate limit exceeded: 3 per 60 seconds"
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_get_forwards_sub_path_and_query() {
    let upstream = common::start_mock_upstream().await;
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &json!({}))).await;

    let response = reqwest::Client::new()
        .get(common::url(gateway, "/echo/users/7?expand=true"))
        .header("X-API-KEY", "k1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["path"], "users/7");
    assert_eq!(body["query"], "expand=true");
    assert_eq!(body["x_api_key"], "k1");
    assert_eq!(body["body"], "");

    shutdown.trigger();
}

#[tokio::test]
async fn test_delete_drops_query_and_body() {
    let upstream = common::start_mock_upstream().await;
    let (gateway, shutdown) = common::start_gateway(common::policy_for(upstream, &json!({}))).await;

    let response = reqwest::Client::new()
        .delete(common::url(gateway, "/echo/items/3?force=1"))
        .body("ignored")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["query"], Value::Null);
    assert_eq!(body["body"], "");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_down_is_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead: SocketAddr = listener.local_addr().unwrap();
    drop(listener);

    let policy = PolicySet::permissive(Destination {
        host: dead.ip().to_string(),
        port: dead.port(),
        base_path: "/".into(),
    });
    let (gateway, shutdown) = common::start_gateway(policy).await;

    let response = reqwest::get(common::url(gateway, "/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(error_of(response).await.starts_with("Error forwarding request"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_liveness_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(serve_liveness(listener, shutdown.subscribe()));

    let body: Value = reqwest::get(common::url(addr, "/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "running"}));

    shutdown.trigger();
    assert!(handle.await.unwrap().is_ok());
}

#[test]
fn test_env_may_disable_but_not_enable() {
    let upstream: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    let dir = common::write_config(
        upstream,
        &json!({"method_validation_enabled": true, "json_validation_enabled": false}),
    );

    let policy = load_policy(Some(dir.path()), |key| {
        (key == "METHOD_VALIDATION_ENABLED").then(|| "false".to_string())
    })
    .unwrap();
    assert!(!policy.methods.enabled);

    let err = load_policy(Some(dir.path()), |key| {
        (key == "JSON_VALIDATION_ENABLED").then(|| "true".to_string())
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::EnvConflict(ref c) if c.len() == 1), "{err}");
}

#[test]
#[serial]
fn test_process_environment_override() {
    let upstream: SocketAddr = "127.0.0.1:8080".parse().unwrap();
    let dir = common::write_config(upstream, &json!({"rate_limiting_enabled": false}));

    std::env::set_var("RATE_LIMITING_ENABLED", "true");
    let result = load_policy(Some(dir.path()), |key| std::env::var(key).ok());
    std::env::remove_var("RATE_LIMITING_ENABLED");

    assert!(matches!(result, Err(ConfigError::EnvConflict(_))));
}

#[test]
fn test_missing_descriptor_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_policy(Some(dir.path()), |_| None).unwrap_err();
    assert!(matches!(err, ConfigError::Missing(_)));
}
