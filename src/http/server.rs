//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router accepting GET, POST, PUT and DELETE on any path
//! - Wire up tracing with a per-request id
//! - Buffer the inbound body (bounded) and hand it to the pipeline
//! - Record per-request metrics
//! - Serve until the shutdown broadcast fires

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    routing::{on, MethodFilter},
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::admission::{Denial, Pipeline, RequestView, Stage, ValidationOutcome};
use crate::config::{GatewaySettings, PolicySet};
use crate::http::response::Reply;
use crate::observability::metrics::{self, InFlight};
use crate::proxy::Forwarder;

/// Methods the routing layer lets through; anything else gets 405 here.
const GATEWAY_METHODS: MethodFilter = MethodFilter::GET
    .or(MethodFilter::POST)
    .or(MethodFilter::PUT)
    .or(MethodFilter::DELETE);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub body_buffer_limit: usize,
}

/// HTTP server for the admission gateway.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    pub fn new(policy: Arc<PolicySet>, settings: &GatewaySettings) -> Self {
        let forwarder = Forwarder::new(
            policy.destination.clone(),
            Duration::from_secs(settings.forward_timeout_secs),
        );
        let pipeline = Arc::new(Pipeline::new(policy, forwarder));

        let state = AppState {
            pipeline: pipeline.clone(),
            body_buffer_limit: settings.body_buffer_limit,
        };

        Self {
            router: Self::build_router(state),
            pipeline,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", on(GATEWAY_METHODS, gateway_handler))
            .route("/{*path}", on(GATEWAY_METHODS, gateway_handler))
            .with_state(state)
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %Uuid::new_v4(),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                }),
            )
    }

    /// The router without a listener, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }


    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if let Some(limiter) = self.pipeline.limiter() {
            tokio::spawn(limiter.clone().run_janitor(shutdown.resubscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Reply {
    let _in_flight = InFlight::enter();
    let started = Instant::now();

    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();

    // Head gates first: a refused request never has its body read.
    let mut view = RequestView::new(parts, Bytes::new(), client);
    let (reply, request_size) = match state.pipeline.admit_head(&view) {
        ValidationOutcome::Deny(denial) => (Pipeline::refuse(denial), 0),
        ValidationOutcome::Admit => {
            match axum::body::to_bytes(body, state.body_buffer_limit).await {
                Ok(bytes) => {
                    let size = bytes.len();
                    view.body = bytes;
                    (state.pipeline.process_admitted_head(view).await, size)
                }
                Err(err) => (
                    Pipeline::refuse(unreadable_body(&err, state.body_buffer_limit)),
                    0,
                ),
            }
        }
    };

    tracing::info!(status = reply.status.as_u16(), elapsed_ms = started.elapsed().as_millis() as u64, "Request completed");
    metrics::observe(
        &method,
        &metrics::endpoint_label(&path, reply.stage),
        reply.status,
        started.elapsed(),
        request_size,
        reply.body_len(),
    );
    reply
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// 413 when the body outgrew the buffer, 400 for any other read failure.
fn unreadable_body(err: &axum::Error, limit: usize) -> Denial {
    if exceeds_limit(err) {
        tracing::warn!(limit, "Request body exceeds buffer limit");
        Denial::new(
            Stage::Body,
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Request body exceeds the limit of {limit} bytes"),
        )
    } else {
        tracing::warn!(error = %err, "Request body could not be read");
        Denial::new(
            Stage::Body,
            StatusCode::BAD_REQUEST,
            "Request body could not be read",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Destination;
    use crate::security::RateLimitRule;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Method};
    use tower::ServiceExt;

    fn server(configure: impl FnOnce(&mut PolicySet, &mut GatewaySettings)) -> HttpServer {
        let mut policy = PolicySet::permissive(Destination {
            host: "127.0.0.1".into(),
            port: 9,
            base_path: "/".into(),
        });
        let mut settings = GatewaySettings::default();
        configure(&mut policy, &mut settings);
        HttpServer::new(Arc::new(policy), &settings)
    }

    fn app(server: &HttpServer) -> Router {
        server
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))))
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn routing_layer_rejects_other_methods() {
        let s = server(|_, _| {});
        let response = app(&s)
            .oneshot(request(Method::PATCH, "/data", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn method_denial_is_json() {
        let s = server(|policy, _| {
            policy.methods.enabled = true;
            policy.methods.allowed = vec![Method::GET, Method::POST];
        });
        let response = app(&s)
            .oneshot(request(Method::PUT, "/update", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"error":"Method PUT not allowed"}"#);
    }

    #[tokio::test]
    async fn body_over_buffer_limit_is_413() {
        let s = server(|_, settings| settings.body_buffer_limit = 8);
        let response = app(&s)
            .oneshot(request(Method::POST, "/data", r#"{"name":"John","age":30}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn rate_limited_client_gets_retry_after() {
        let s = server(|policy, _| {
            policy.rate_limit = Some(RateLimitRule {
                count: 1,
                window: Duration::from_secs(60),
            });
            policy.uris.enabled = true;
        });
        let router = app(&s);

        let first = router
            .clone()
            .oneshot(request(Method::GET, "/", ""))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::FORBIDDEN);

        let second = router.oneshot(request(Method::GET, "/", "")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry: u64 = second.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((1..=60).contains(&retry));
    }

    #[tokio::test]
    async fn rate_limit_precedes_body_buffering() {
        let s = server(|policy, settings| {
            policy.rate_limit = Some(RateLimitRule {
                count: 1,
                window: Duration::from_secs(60),
            });
            policy.uris.enabled = true;
            settings.body_buffer_limit = 16;
        });
        let router = app(&s);

        let first = router
            .clone()
            .oneshot(request(Method::GET, "/", ""))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::FORBIDDEN);

        let oversized = request(Method::DELETE, "/", r#"{"padding":"0123456789012345678901234567890123456789"}"#);
        let second = router.oneshot(oversized).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn forbidden_path_is_refused_before_body_is_read() {
        let s = server(|policy, settings| {
            policy.uris.enabled = true;
            settings.body_buffer_limit = 4;
        });
        let response = app(&s)
            .oneshot(request(Method::POST, "/closed", r#"{"name":"John"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn length_limit_maps_to_413() {
        let err = axum::body::to_bytes(Body::from("0123456789"), 4)
            .await
            .unwrap_err();
        assert!(exceeds_limit(&err));
        assert_eq!(unreadable_body(&err, 4).status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn other_read_errors_map_to_400() {
        let err = axum::Error::new(std::io::Error::other("connection reset"));
        assert!(!exceeds_limit(&err));
        let denial = unreadable_body(&err, 4);
        assert_eq!(denial.status, StatusCode::BAD_REQUEST);
        assert_eq!(denial.message, "Request body could not be read");
    }
}
