//! HTTP method allow-list.

use axum::http::StatusCode;

use crate::admission::outcome::{Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::config::policy::MethodPolicy;

pub fn check(req: &RequestView, policy: &MethodPolicy) -> ValidationOutcome {
    if !policy.enabled {
        return ValidationOutcome::Admit;
    }

    if policy.allowed.contains(&req.method) {
        tracing::debug!(validator = "method", method = %req.method, "Method allowed");
        ValidationOutcome::Admit
    } else {
        tracing::warn!(validator = "method", method = %req.method, "Method not allowed");
        ValidationOutcome::deny(
            Stage::Method,
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {} not allowed", req.method),
        )
    }
}
