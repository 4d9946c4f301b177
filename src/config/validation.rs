//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile URI patterns, header patterns and the JSON schema up front
//! - Parse the rate limit rule
//! - Fold environment overrides into the feature toggles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: descriptors + overrides → Result<PolicySet, Vec<ValidationError>>
//! - Runs before any listener is bound

use std::collections::HashSet;

use axum::http::{HeaderName, Method};
use jsonschema::JSONSchema;
use regex::Regex;
use thiserror::Error;

use crate::config::overrides::Overrides;
use crate::config::policy::{
    HeaderPolicy, HeaderRule, JsonPolicy, MethodPolicy, PayloadPolicy, PolicySet,
    ProhibitedHeader, RequiredHeader, UriPolicy,
};
use crate::config::schema::{Destination, RulesConfig};
use crate::security::{RateLimitRule, RuleParseError};

/// A single semantic problem in the descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("destination host must not be empty")]
    EmptyHost,
    #[error("destination port must be between 1 and 65535")]
    InvalidPort,
    #[error("'{0}' is not a valid HTTP method token")]
    InvalidMethod(String),
    #[error("invalid URI pattern '{pattern}': {reason}")]
    InvalidUriPattern { pattern: String, reason: String },
    #[error("'{0}' is not a valid header name")]
    InvalidHeaderName(String),
    #[error("required header '{0}' must map to a string")]
    InvalidHeaderSpec(String),
    #[error("invalid pattern for header '{name}': {reason}")]
    InvalidHeaderPattern { name: String, reason: String },
    #[error("invalid JSON schema: {0}")]
    InvalidJsonSchema(String),
    #[error("invalid rate limit '{rule}': {source}")]
    InvalidRateLimit {
        rule: String,
        #[source]
        source: RuleParseError,
    },
    #[error("'{0}' must be a boolean")]
    NonBooleanToggle(String),
}

/// Compile a start-anchored, end-open pattern.
fn compile_prefix_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// Validate the descriptors and produce the immutable policy.
pub fn compile_policy(
    destination: Destination,
    rules: &RulesConfig,
    overrides: &Overrides,
) -> Result<PolicySet, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if destination.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if destination.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    let enabled = |key: &str, file_value: bool| file_value && overrides.allows(key);

    let mut allowed = Vec::with_capacity(rules.allowed_methods.len());
    for token in &rules.allowed_methods {
        match Method::from_bytes(token.as_bytes()) {
            Ok(m) => allowed.push(m),
            Err(_) => errors.push(ValidationError::InvalidMethod(token.clone())),
        }
    }
    let methods = MethodPolicy {
        enabled: enabled("method_validation_enabled", rules.method_validation_enabled),
        allowed,
    };

    let mut patterns = Vec::with_capacity(rules.allowed_uri_patterns.len());
    for pattern in &rules.allowed_uri_patterns {
        match compile_prefix_pattern(pattern) {
            Ok(re) => patterns.push(re),
            Err(e) => errors.push(ValidationError::InvalidUriPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            }),
        }
    }
    let uris = UriPolicy {
        enabled: enabled("uri_validation_enabled", rules.uri_validation_enabled),
        exact: rules.allowed_uris.iter().cloned().collect::<HashSet<_>>(),
        patterns,
    };

    let mut required = Vec::with_capacity(rules.required_headers.len());
    for (display_name, spec) in &rules.required_headers {
        let Ok(name) = HeaderName::from_bytes(display_name.as_bytes()) else {
            errors.push(ValidationError::InvalidHeaderName(display_name.clone()));
            continue;
        };
        let Some(spec) = spec.as_str() else {
            errors.push(ValidationError::InvalidHeaderSpec(display_name.clone()));
            continue;
        };
        let rule = if spec == HeaderRule::WILDCARD {
            HeaderRule::Any
        } else if let Some(pattern) = spec.strip_prefix(HeaderRule::REGEX_PREFIX) {
            match compile_prefix_pattern(pattern) {
                Ok(re) => HeaderRule::Pattern(re),
                Err(e) => {
                    errors.push(ValidationError::InvalidHeaderPattern {
                        name: display_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            }
        } else {
            HeaderRule::Exact(spec.to_string())
        };
        required.push(RequiredHeader {
            display_name: display_name.clone(),
            name,
            rule,
        });
    }

    let mut prohibited = Vec::with_capacity(rules.prohibited_headers.len());
    for header in &rules.prohibited_headers {
        match HeaderName::from_bytes(header.as_bytes()) {
            Ok(name) => prohibited.push(ProhibitedHeader {
                display_name: header.clone(),
                name,
            }),
            Err(_) => errors.push(ValidationError::InvalidHeaderName(header.clone())),
        }
    }
    let headers = HeaderPolicy {
        enabled: enabled("header_validation_enabled", rules.header_validation_enabled),
        required,
        prohibited,
    };

    let payload = PayloadPolicy {
        enabled: enabled("payload_limiting_enabled", rules.payload_limiting_enabled),
        max_bytes: rules.max_payload_size,
    };

    let json_enabled = enabled("json_validation_enabled", rules.json_validation_enabled);
    let schema = if json_enabled {
        match JSONSchema::options().compile(&rules.json_schema) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                errors.push(ValidationError::InvalidJsonSchema(e.to_string()));
                None
            }
        }
    } else {
        None
    };
    let json = JsonPolicy {
        enabled: json_enabled,
        schema,
        detailed_errors: rules.detailed_errors_enabled,
    };

    let rate_limit = if enabled("rate_limiting_enabled", rules.rate_limiting_enabled) {
        match rules.rate_limit.parse::<RateLimitRule>() {
            Ok(rule) => Some(rule),
            Err(source) => {
                errors.push(ValidationError::InvalidRateLimit {
                    rule: rules.rate_limit.clone(),
                    source,
                });
                None
            }
        }
    } else {
        None
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(PolicySet {
        destination,
        methods,
        uris,
        headers,
        payload,
        json,
        rate_limit,
    })
}
