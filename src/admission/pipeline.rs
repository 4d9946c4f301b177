//! Admission pipeline.
//!
//! Rate limiter, then the validator chain, then the forwarder. Every path
//! ends in a `Reply`: either the relayed upstream response or a denial.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::admission::outcome::{Denial, Stage, ValidationOutcome};
use crate::admission::request::RequestView;
use crate::admission::{run_chain, Validator};
use crate::config::PolicySet;
use crate::http::response::Reply;
use crate::observability::metrics;
use crate::proxy::{ForwardError, Forwarder};
use crate::security::{RateDecision, RateLimiter};

pub struct Pipeline {
    policy: Arc<PolicySet>,
    /// Absent when rate limiting is disabled, so no state exists at all.
    limiter: Option<Arc<RateLimiter>>,
    forwarder: Forwarder,
}

impl Pipeline {
    pub fn new(policy: Arc<PolicySet>, forwarder: Forwarder) -> Self {
        let limiter = policy.rate_limit.map(|rule| Arc::new(RateLimiter::new(rule)));
        Self {
            policy,
            limiter,
            forwarder,
        }
    }

    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Rate limit, path and method. Only reads the request head, so it can
    /// run before the body is buffered.
    pub fn admit_head(&self, req: &RequestView) -> ValidationOutcome {
        if let Some(limiter) = &self.limiter {
            match limiter.check(req.client.ip()) {
                RateDecision::Allowed { remaining } => {
                    tracing::debug!(client = %req.client.ip(), remaining, "Rate limit check passed");
                }
                RateDecision::Limited { retry_after } => {
                    let rule = limiter.rule();
                    tracing::warn!(client = %req.client.ip(), %rule, "Rate limit exceeded");
                    return ValidationOutcome::Deny(
                        Denial::new(
                            Stage::RateLimit,
                            StatusCode::TOO_MANY_REQUESTS,
                            format!("Rate limit exceeded: {rule}"),
                        )
                        .with_retry_after(retry_after),
                    );
                }
            }
        }

        run_chain(&Validator::HEAD, req, &self.policy)
    }

    /// JSON schema, headers and payload size.
    pub fn admit_body(&self, req: &RequestView) -> ValidationOutcome {
        run_chain(&Validator::BODY, req, &self.policy)
    }

    /// Run every gate without forwarding.
    pub fn admit(&self, req: &RequestView) -> ValidationOutcome {
        match self.admit_head(req) {
            ValidationOutcome::Admit => self.admit_body(req),
            denied => denied,
        }
    }

    /// Admit and forward a request whose body is already buffered.
    pub async fn process(&self, req: RequestView) -> Reply {
        match self.admit(&req) {
            ValidationOutcome::Admit => self.dispatch(req).await,
            ValidationOutcome::Deny(denial) => Self::refuse(denial),
        }
    }

    /// Finish a request that already passed `admit_head`.
    pub async fn process_admitted_head(&self, req: RequestView) -> Reply {
        match self.admit_body(&req) {
            ValidationOutcome::Admit => self.dispatch(req).await,
            ValidationOutcome::Deny(denial) => Self::refuse(denial),
        }
    }

    /// Record a denial and turn it into the caller's reply.
    pub fn refuse(denial: Denial) -> Reply {
        metrics::record_denial(denial.stage);
        denial.into()
    }

    /// The forward runs in its own task so a caller disconnect does not
    /// cancel it.
    async fn dispatch(&self, req: RequestView) -> Reply {
        let forwarder = self.forwarder.clone();
        let forwarded = tokio::spawn(async move { forwarder.forward(&req).await })
            .await
            .map_err(ForwardError::from)
            .and_then(|result| result);

        match forwarded {
            Ok(reply) => reply,
            Err(err) => {
                if err.status().is_server_error() {
                    tracing::error!(error = %err.describe(), "Forwarding failed");
                } else {
                    tracing::warn!(error = %err, "Request refused by forwarder");
                }
                Self::refuse(err.into_denial())
            }
        }
    }
}
