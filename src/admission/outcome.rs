//! Admission decisions.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};

/// Pipeline stage that produced a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RateLimit,
    Path,
    Method,
    JsonSchema,
    Header,
    PayloadSize,
    /// Inbound body could not be buffered.
    Body,
    Forward,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::RateLimit => "rate_limit",
            Stage::Path => "path",
            Stage::Method => "method",
            Stage::JsonSchema => "json_schema",
            Stage::Header => "header",
            Stage::PayloadSize => "payload_size",
            Stage::Body => "body",
            Stage::Forward => "forward",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refusal surfaced to the caller as `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub stage: Stage,
    pub status: StatusCode,
    pub message: String,
    /// Sent as `Retry-After` when set.
    pub retry_after: Option<Duration>,
}

impl Denial {
    pub fn new(stage: Stage, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    pub fn body(&self) -> Value {
        json!({ "error": self.message })
    }
}

/// Result of a single gate: admitted, or denied with a complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Admit,
    Deny(Denial),
}

impl ValidationOutcome {
    pub fn deny(stage: Stage, status: StatusCode, message: impl Into<String>) -> Self {
        ValidationOutcome::Deny(Denial::new(stage, status, message))
    }

    pub fn is_admit(&self) -> bool {
        matches!(self, ValidationOutcome::Admit)
    }

    /// The denial, if any.
    pub fn denial(&self) -> Option<&Denial> {
        match self {
            ValidationOutcome::Admit => None,
            ValidationOutcome::Deny(d) => Some(d),
        }
    }
}
