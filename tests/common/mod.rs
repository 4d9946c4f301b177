//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use admission_gateway::config::{load_policy, GatewaySettings, PolicySet};
use admission_gateway::http::HttpServer;
use admission_gateway::lifecycle::Shutdown;
use axum::{
    extract::{Path as UrlPath, RawQuery},
    http::{HeaderMap, StatusCode},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Start a mock upstream on an ephemeral port.
///
/// - `POST /data` answers 201 echoing the received JSON
/// - `GET /health` answers 200
/// - `/echo/{*rest}` answers 200 describing what arrived
pub async fn start_mock_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/data",
            post(|Json(body): Json<Value>| async move {
                (
                    StatusCode::CREATED,
                    [("x-upstream", "mock")],
                    Json(json!({"status": "success", "received_data": body})),
                )
            }),
        )
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy"})) }),
        )
        .route(
            "/echo/{*rest}",
            any(
                |UrlPath(rest): UrlPath<String>,
                 RawQuery(query): RawQuery,
                 headers: HeaderMap,
                 body: String| async move {
                    Json(json!({
                        "path": rest,
                        "query": query,
                        "x_api_key": headers.get("x-api-key").and_then(|v| v.to_str().ok()),
                        "body": body,
                    }))
                },
            ),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    addr
}

/// Write both descriptor files into a fresh temporary directory.
pub fn write_config(upstream: SocketAddr, rules: &Value) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_descriptors(dir.path(), upstream, rules);
    dir
}

pub fn write_descriptors(dir: &Path, upstream: SocketAddr, rules: &Value) {
    let proxy = json!({
        "destination": {"host": upstream.ip().to_string(), "port": upstream.port(), "path": "/"}
    });
    fs::write(dir.join("proxy_config.json"), proxy.to_string()).unwrap();
    fs::write(dir.join("rules_config.json"), rules.to_string()).unwrap();
}

/// Load a policy from descriptors with no environment overrides.
pub fn policy_for(upstream: SocketAddr, rules: &Value) -> PolicySet {
    let dir = write_config(upstream, rules);
    load_policy(Some(dir.path()), |_| None).unwrap()
}

/// Run the gateway on an ephemeral port.
pub async fn start_gateway(policy: PolicySet) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let settings = GatewaySettings {
        forward_timeout_secs: 5,
        ..GatewaySettings::default()
    };
    let server = HttpServer::new(Arc::new(policy), &settings);
    let rx = shutdown.subscribe();
    tokio::spawn(async move { server.run(listener, rx).await });

    (addr, shutdown)
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}
