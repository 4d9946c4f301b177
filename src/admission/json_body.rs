//! JSON body schema validation for POST and PUT.
//!
//! A body that is not JSON at all fails the same way a schema violation
//! does. Only the first schema error is reported.

use axum::http::StatusCode;

use crate::admission::outcome::{Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::config::policy::JsonPolicy;

/// Message sent when detailed errors are off.
pub const GENERIC_ERROR: &str = "Invalid JSON format";

pub fn check(req: &RequestView, policy: &JsonPolicy) -> ValidationOutcome {
    if !policy.enabled || !req.has_json_body() {
        return ValidationOutcome::Admit;
    }

    match validate(req, policy) {
        Ok(()) => {
            tracing::debug!(validator = "json", "JSON validation successful");
            ValidationOutcome::Admit
        }
        Err(detail) => {
            tracing::warn!(validator = "json", error = %detail, "JSON validation failed");
            let message = if policy.detailed_errors {
                detail
            } else {
                GENERIC_ERROR.to_string()
            };
            ValidationOutcome::deny(Stage::JsonSchema, StatusCode::BAD_REQUEST, message)
        }
    }
}

fn validate(req: &RequestView, policy: &JsonPolicy) -> Result<(), String> {
    let instance = req.parse_json().map_err(|e| e.to_string())?;
    let Some(schema) = policy.schema.as_ref() else {
        return Ok(());
    };
    schema.validate(&instance).map_err(|mut errors| {
        errors
            .next()
            .map(|e| e.to_string())
            .unwrap_or_else(|| GENERIC_ERROR.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::request::test_support::view;
    use axum::http::Method;
    use jsonschema::JSONSchema;
    use serde_json::json;

    fn policy(detailed_errors: bool) -> JsonPolicy {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"}
            },
            "required": ["name", "age"]
        });
        JsonPolicy {
            enabled: true,
            schema: Some(JSONSchema::options().compile(&schema).unwrap()),
            detailed_errors,
        }
    }

    fn post(body: &str) -> RequestView {
        view(Method::POST, "/people", &[("content-type", "application/json")], body)
    }

    #[test]
    fn valid_body_is_admitted() {
        assert!(check(&post(r#"{"name":"John","age":30}"#), &policy(false)).is_admit());
    }

    #[test]
    fn missing_required_field_is_generic_400() {
        let outcome = check(&post(r#"{"name":"John"}"#), &policy(false));
        let denial = outcome.denial().unwrap();
        assert_eq!(denial.status, StatusCode::BAD_REQUEST);
        assert_eq!(denial.message, GENERIC_ERROR);
    }

    #[test]
    fn detailed_errors_echo_validator_text() {
        let outcome = check(&post(r#"{"name":"John"}"#), &policy(true));
        let message = &outcome.denial().unwrap().message;
        assert_ne!(message, GENERIC_ERROR);
        assert!(message.contains("age"), "{message}");
    }

    #[test]
    fn malformed_body_is_a_validation_failure() {
        let outcome = check(&post("{not json"), &policy(false));
        assert_eq!(outcome.denial().unwrap().message, GENERIC_ERROR);

        let outcome = check(&post(""), &policy(false));
        assert_eq!(outcome.denial().unwrap().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_methods_skip_validation() {
        let req = view(Method::GET, "/people", &[], "{not json");
        assert!(check(&req, &policy(false)).is_admit());
        let req = view(Method::DELETE, "/people/1", &[], "");
        assert!(check(&req, &policy(false)).is_admit());
    }

    #[test]
    fn put_is_validated_too() {
        let req = view(Method::PUT, "/people/1", &[], r#"{"age":"old"}"#);
        assert!(!check(&req, &policy(false)).is_admit());
    }
}
