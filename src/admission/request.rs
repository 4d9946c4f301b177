//! Read-only projection of an inbound request.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use percent_encoding::percent_decode_str;
use serde_json::Value;

/// What the admission pipeline and the forwarder see of a request.
///
/// Built once per request after the body is buffered and dropped when the
/// request completes.
#[derive(Debug, Clone)]
pub struct RequestView {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Remote address; its IP is the rate limit client key.
    pub client: SocketAddr,
}

impl RequestView {
    pub fn new(parts: Parts, body: Bytes, client: SocketAddr) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client,
        }
    }

    /// Full request path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Request path with percent-escapes decoded; invalid UTF-8 is replaced.
    /// The forwarded path stays encoded.
    pub fn decoded_path(&self) -> Cow<'_, str> {
        percent_decode_str(self.path()).decode_utf8_lossy()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path below the gateway mount point (`/`), if any.
    pub fn sub_path(&self) -> Option<&str> {
        self.path().strip_prefix('/').filter(|sub| !sub.is_empty())
    }

    /// Length declared by the `Content-Length` header; `None` when absent
    /// or unparsable (e.g. chunked uploads).
    pub fn content_length(&self) -> Option<u64> {
        declared_content_length(&self.headers)
    }

    /// Whether the method carries a JSON body (POST and PUT).
    pub fn has_json_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT
    }

    pub fn parse_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
