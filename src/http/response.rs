//! Response handling.
//!
//! # Responsibilities
//! - Hold the fully buffered response every request path ends in
//! - Render denials as `{"error": ...}` JSON with `Retry-After` when set
//! - Strip hop-by-hop headers from relayed upstream responses
//!
//! # Design Decisions
//! - Upstream bodies are buffered within the forward timeout, so a reply is
//!   always complete before anything is written to the caller

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::admission::{Denial, Stage};

/// Connection-scoped headers that never cross the gateway.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// A complete response ready to be written to the caller.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Stage that refused the request; `None` for relayed upstream replies.
    pub stage: Option<Stage>,
}

impl Reply {
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
            stage: None,
        }
    }

    /// Body size, used for response metrics.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

impl From<Denial> for Reply {
    fn from(denial: Denial) -> Self {
        let mut reply = Reply::json(denial.status, &denial.body());
        reply.stage = Some(denial.stage);
        if let Some(wait) = denial.retry_after {
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            reply
                .headers
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        reply
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
