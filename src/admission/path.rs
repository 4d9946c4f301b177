//! Request path allow-list.
//!
//! A path is admitted when it equals one of the allowed URIs or when any
//! allowed pattern matches from the first character. Patterns are not
//! anchored at the end, so `/api/` also admits `/api/users/7`. With
//! validation enabled and both lists empty every request is denied.
//! Matching runs on the percent-decoded path.

use axum::http::StatusCode;

use crate::admission::outcome::{Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::config::policy::UriPolicy;

pub fn check(req: &RequestView, policy: &UriPolicy) -> ValidationOutcome {
    if !policy.enabled {
        return ValidationOutcome::Admit;
    }

    let decoded = req.decoded_path();
    let path: &str = &decoded;
    if policy.exact.contains(path) {
        tracing::debug!(validator = "path", %path, "URI allowed");
        return ValidationOutcome::Admit;
    }

    if let Some(pattern) = policy.patterns.iter().find(|re| re.is_match(path)) {
        tracing::debug!(validator = "path", %path, pattern = %pattern.as_str(), "URI matches pattern");
        return ValidationOutcome::Admit;
    }

    tracing::warn!(validator = "path", %path, "URI is forbidden");
    ValidationOutcome::deny(
        Stage::Path,
        StatusCode::FORBIDDEN,
        format!("URI {path} is forbidden"),
    )
}
