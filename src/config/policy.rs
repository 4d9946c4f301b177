//! Resolved, immutable admission policy.
//!
//! A `PolicySet` is built once at startup from the two descriptors and the
//! environment overrides, then shared behind an `Arc` with every validator,
//! the rate limiter and the forwarder. Patterns and the JSON schema are
//! compiled here so the request path never recompiles anything.

use std::collections::HashSet;
use std::fmt;

use axum::http::{HeaderName, Method};
use jsonschema::JSONSchema;
use regex::Regex;

use crate::config::schema::Destination;
use crate::security::RateLimitRule;

/// Fully resolved gateway policy.
#[derive(Debug)]
pub struct PolicySet {
    pub destination: Destination,
    pub methods: MethodPolicy,
    pub uris: UriPolicy,
    pub headers: HeaderPolicy,
    pub payload: PayloadPolicy,
    pub json: JsonPolicy,
    /// `None` when rate limiting is disabled.
    pub rate_limit: Option<RateLimitRule>,
}

#[derive(Debug, Clone)]
pub struct MethodPolicy {
    pub enabled: bool,
    pub allowed: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct UriPolicy {
    pub enabled: bool,
    pub exact: HashSet<String>,
    /// Compiled as `^(?:pattern)`: anchored at the start, open at the end.
    pub patterns: Vec<Regex>,
}

#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    pub enabled: bool,
    /// Checked in document order.
    pub required: Vec<RequiredHeader>,
    pub prohibited: Vec<ProhibitedHeader>,
}

#[derive(Debug, Clone)]
pub struct RequiredHeader {
    /// Header name as written in the rule file, used in denial messages.
    pub display_name: String,
    pub name: HeaderName,
    pub rule: HeaderRule,
}

#[derive(Debug, Clone)]
pub struct ProhibitedHeader {
    pub display_name: String,
    pub name: HeaderName,
}

/// How a required header's value is matched.
#[derive(Debug, Clone)]
pub enum HeaderRule {
    /// `"*"`: any value, the header only has to be present.
    Any,
    /// `"regex:<pattern>"`: matched from the start of the value.
    Pattern(Regex),
    /// Anything else: exact string equality.
    Exact(String),
}

impl HeaderRule {
    pub const WILDCARD: &'static str = "*";
    pub const REGEX_PREFIX: &'static str = "regex:";
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadPolicy {
    pub enabled: bool,
    pub max_bytes: u64,
}

pub struct JsonPolicy {
    pub enabled: bool,
    /// Present whenever `enabled` is true.
    pub schema: Option<JSONSchema>,
    pub detailed_errors: bool,
}

impl fmt::Debug for JsonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonPolicy")
            .field("enabled", &self.enabled)
            .field("schema", &self.schema.as_ref().map(|_| "<compiled>"))
            .field("detailed_errors", &self.detailed_errors)
            .finish()
    }
}

impl PolicySet {
    /// A policy with every gate disabled, forwarding to `destination`.
    pub fn permissive(destination: Destination) -> Self {
        Self {
            destination,
            methods: MethodPolicy {
                enabled: false,
                allowed: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            },
            uris: UriPolicy {
                enabled: false,
                exact: HashSet::new(),
                patterns: Vec::new(),
            },
            headers: HeaderPolicy {
                enabled: false,
                required: Vec::new(),
                prohibited: Vec::new(),
            },
            payload: PayloadPolicy {
                enabled: false,
                max_bytes: 1024,
            },
            json: JsonPolicy {
                enabled: false,
                schema: None,
                detailed_errors: false,
            },
            rate_limit: None,
        }
    }
}
