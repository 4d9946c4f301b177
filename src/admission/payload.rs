//! Declared payload size limit.
//!
//! Only the `Content-Length` header is consulted. Requests without one
//! (chunked uploads, for instance) are admitted unchecked.

use axum::http::StatusCode;

use crate::admission::outcome::{Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::config::policy::PayloadPolicy;

pub fn check(req: &RequestView, policy: &PayloadPolicy) -> ValidationOutcome {
    if !policy.enabled {
        return ValidationOutcome::Admit;
    }

    let Some(length) = req.content_length() else {
        tracing::debug!(validator = "payload", "No payload to validate");
        return ValidationOutcome::Admit;
    };

    if length > policy.max_bytes {
        tracing::warn!(
            validator = "payload",
            length,
            max = policy.max_bytes,
            "Payload size exceeds limit"
        );
        return ValidationOutcome::deny(
            Stage::PayloadSize,
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Payload size exceeds the limit of {} bytes", policy.max_bytes),
        );
    }

    tracing::debug!(validator = "payload", length, "Payload size within limit");
    ValidationOutcome::Admit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::request::test_support::view;
    use axum::http::Method;

    const LIMIT: PayloadPolicy = PayloadPolicy {
        enabled: true,
        max_bytes: 1024,
    };

    fn post_with_length(length: &str) -> RequestView {
        view(Method::POST, "/upload", &[("content-length", length)], "")
    }

    #[test]
    fn at_limit_is_admitted() {
        assert!(check(&post_with_length("1024"), &LIMIT).is_admit());
    }

    #[test]
    fn over_limit_is_413() {
        let outcome = check(&post_with_length("1025"), &LIMIT);
        let denial = outcome.denial().unwrap();
        assert_eq!(denial.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(denial.message, "Payload size exceeds the limit of 1024 bytes");
    }

    #[test]
    fn unknown_length_is_admitted() {
        let req = view(
            Method::POST,
            "/upload",
            &[("transfer-encoding", "chunked")],
            &"x".repeat(4096),
        );
        assert!(check(&req, &LIMIT).is_admit());
    }

    #[test]
    fn disabled_ignores_length() {
        let policy = PayloadPolicy {
            enabled: false,
            ..LIMIT
        };
        assert!(check(&post_with_length("999999"), &policy).is_admit());
    }
}
