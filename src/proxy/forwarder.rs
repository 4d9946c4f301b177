//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the upstream URL from the destination and the inbound sub-path
//! - Apply the per-method forwarding rules
//! - Bound the whole exchange (request and response body) by one timeout
//! - Relay the upstream status, end-to-end headers and body unchanged
//!
//! # Design Decisions
//! - No retries; a failed forward is reported once
//! - One pooled hyper client shared by every request

use std::error::Error as StdError;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::admission::{Denial, RequestView, Stage};
use crate::config::Destination;
use crate::http::response::{strip_hop_by_hop, Reply};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream URI '{uri}': {reason}")]
    InvalidUpstreamUri { uri: String, reason: String },
    #[error("Request body is not valid JSON")]
    MalformedJson(#[source] serde_json::Error),
    #[error("Method {0} not supported")]
    UnsupportedMethod(Method),
    #[error("upstream request failed")]
    Transport(#[source] hyper_util::client::legacy::Error),
    #[error("upstream did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("failed to read upstream response body")]
    Body(#[source] axum::Error),
    #[error("forward task aborted")]
    Aborted(#[from] tokio::task::JoinError),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::MalformedJson(_) => StatusCode::BAD_REQUEST,
            ForwardError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Display text followed by every source, joined with `: `.
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            text.push_str(": ");
            text.push_str(&err.to_string());
            source = err.source();
        }
        text
    }

    pub fn into_denial(self) -> Denial {
        let status = self.status();
        let message = if status.is_server_error() {
            format!("Error forwarding request: {}", self.describe())
        } else {
            self.to_string()
        };
        Denial::new(Stage::Forward, status, message)
    }
}

/// Sends admitted requests to the single upstream.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    destination: Destination,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(destination: Destination, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            destination,
            timeout,
        }
    }

    /// `http://{host}:{port}{base_path}`, with the sub-path appended after a
    /// single `/`.
    pub fn upstream_url(&self, sub_path: Option<&str>, query: Option<&str>) -> Result<Url, ForwardError> {
        let dest = &self.destination;
        let host = if dest.host.contains(':') && !dest.host.starts_with('[') {
            format!("[{}]", dest.host)
        } else {
            dest.host.clone()
        };
        let origin = format!("http://{host}:{}", dest.port);
        let mut url = Url::parse(&origin).map_err(|e| ForwardError::InvalidUpstreamUri {
            uri: origin.clone(),
            reason: e.to_string(),
        })?;

        match sub_path {
            Some(sub) => {
                let base = dest.base_path.trim_end_matches('/');
                url.set_path(&format!("{base}/{sub}"));
            }
            None => url.set_path(&dest.base_path),
        }
        url.set_query(query);
        Ok(url)
    }

    pub(crate) fn build_request(&self, req: &RequestView) -> Result<Request<Body>, ForwardError> {
        let query = if req.method == Method::GET {
            req.query()
        } else {
            None
        };
        let url = self.upstream_url(req.sub_path(), query)?;
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| ForwardError::InvalidUpstreamUri {
                uri: url.to_string(),
                reason: e.to_string(),
            })?;

        let mut headers = req.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let body = match req.method {
            Method::GET | Method::DELETE => Body::empty(),
            Method::POST | Method::PUT => {
                if req.body.iter().all(u8::is_ascii_whitespace) {
                    Body::empty()
                } else {
                    let value: Value = req.parse_json().map_err(ForwardError::MalformedJson)?;
                    headers
                        .entry(header::CONTENT_TYPE)
                        .or_insert(HeaderValue::from_static("application/json"));
                    Body::from(Bytes::from(value.to_string()))
                }
            }
            ref other => return Err(ForwardError::UnsupportedMethod(other.clone())),
        };

        let mut request = Request::new(body);
        *request.method_mut() = req.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }

    /// Forward `req` and buffer the upstream reply.
    pub async fn forward(&self, req: &RequestView) -> Result<Reply, ForwardError> {
        let request = self.build_request(req)?;
        let target = request.uri().clone();
        tracing::debug!(method = %request.method(), upstream = %target, "Forwarding request");

        let exchange = async {
            let response: Response<Incoming> = self
                .client
                .request(request)
                .await
                .map_err(ForwardError::Transport)?;
            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), usize::MAX)
                .await
                .map_err(ForwardError::Body)?;
            Ok::<_, ForwardError>((parts, body))
        };

        let (parts, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))??;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        tracing::debug!(upstream = %target, status = parts.status.as_u16(), bytes = body.len(), "Upstream responded");

        Ok(Reply {
            status: parts.status,
            headers,
            body,
            stage: None,
        })
    }
}
