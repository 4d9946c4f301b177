//! Required and prohibited headers.
//!
//! Required headers are checked in rule-file order and the first failure
//! wins. Prohibited headers are checked only after every required header
//! passed. Headers named in neither list are ignored.

use axum::http::StatusCode;

use crate::admission::outcome::{Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::config::policy::{HeaderPolicy, HeaderRule};

fn forbidden(message: String) -> ValidationOutcome {
    ValidationOutcome::deny(Stage::Header, StatusCode::FORBIDDEN, message)
}

pub fn check(req: &RequestView, policy: &HeaderPolicy) -> ValidationOutcome {
    if !policy.enabled {
        return ValidationOutcome::Admit;
    }

    for required in &policy.required {
        let name = &required.display_name;
        let Some(actual) = req.headers.get(&required.name) else {
            tracing::warn!(validator = "header", header = %name, "Missing required header");
            return forbidden(format!("Missing required header '{name}'"));
        };

        match &required.rule {
            HeaderRule::Any => {}
            HeaderRule::Pattern(re) => {
                let matched = actual.to_str().is_ok_and(|value| re.is_match(value));
                if !matched {
                    tracing::warn!(validator = "header", header = %name, pattern = %re.as_str(), "Header does not match pattern");
                    return forbidden(format!(
                        "Invalid header '{name}': Does not match required pattern"
                    ));
                }
            }
            HeaderRule::Exact(expected) => {
                if actual.as_bytes() != expected.as_bytes() {
                    tracing::warn!(validator = "header", header = %name, expected = %expected, "Header value mismatch");
                    return forbidden(format!("Invalid header '{name}': Expected '{expected}'"));
                }
            }
        }
    }

    if let Some(prohibited) = policy
        .prohibited
        .iter()
        .find(|p| req.headers.contains_key(&p.name))
    {
        let name = &prohibited.display_name;
        tracing::warn!(validator = "header", header = %name, "Prohibited header present");
        return forbidden(format!("Prohibited header '{name}' must not be present"));
    }

    tracing::debug!(validator = "header", "All required headers valid, no prohibited headers present");
    ValidationOutcome::Admit
}
