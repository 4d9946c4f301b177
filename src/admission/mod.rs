//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request head
//!     → request.rs (RequestView, body not yet read)
//!     → pipeline.rs head gates
//!         → security::RateLimiter   (429)
//!         → path.rs                 (403)
//!         → method.rs               (405)
//!     → body buffered
//!     → pipeline.rs body gates
//!         → json_body.rs            (400)
//!         → headers.rs              (403)
//!         → payload.rs              (413)
//!     → proxy::Forwarder            (upstream reply or 500)
//! ```
//!
//! # Design Decisions
//! - The chain has a fixed shape; each validator reads its own toggle
//! - First denial wins, later validators are never consulted
//! - Validators are pure functions of (RequestView, PolicySet)
//! - Gates that never look at the body run before it is buffered

pub mod headers;
pub mod json_body;
pub mod method;
pub mod outcome;
pub mod path;
pub mod payload;
pub mod pipeline;
pub mod request;

pub use outcome::{Denial, Stage, ValidationOutcome};
pub use pipeline::Pipeline;
pub use request::RequestView;

use crate::config::PolicySet;

/// One stateless gate of the admission chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Path,
    Method,
    JsonSchema,
    Header,
    PayloadSize,
}

impl Validator {
    /// Evaluation order after the rate limiter.
    pub const CHAIN: [Validator; 5] = [
        Validator::Path,
        Validator::Method,
        Validator::JsonSchema,
        Validator::Header,
        Validator::PayloadSize,
    ];

    /// Gates decided from the request head alone.
    pub const HEAD: [Validator; 2] = [Validator::Path, Validator::Method];

    /// Gates that run once the body is buffered, in chain order.
    pub const BODY: [Validator; 3] = [
        Validator::JsonSchema,
        Validator::Header,
        Validator::PayloadSize,
    ];

    pub fn stage(self) -> Stage {
        match self {
            Validator::Path => Stage::Path,
            Validator::Method => Stage::Method,
            Validator::JsonSchema => Stage::JsonSchema,
            Validator::Header => Stage::Header,
            Validator::PayloadSize => Stage::PayloadSize,
        }
    }

    pub fn check(self, req: &RequestView, policy: &PolicySet) -> ValidationOutcome {
        match self {
            Validator::Path => path::check(req, &policy.uris),
            Validator::Method => method::check(req, &policy.methods),
            Validator::JsonSchema => json_body::check(req, &policy.json),
            Validator::Header => headers::check(req, &policy.headers),
            Validator::PayloadSize => payload::check(req, &policy.payload),
        }
    }
}

/// Run `chain` in order, stopping at the first denial.
pub fn run_chain(chain: &[Validator], req: &RequestView, policy: &PolicySet) -> ValidationOutcome {
    chain
        .iter()
        .map(|v| v.check(req, policy))
        .find(|outcome| !outcome.is_admit())
        .unwrap_or(ValidationOutcome::Admit)
}

/// Run the whole validator chain.
pub fn run_validators(req: &RequestView, policy: &PolicySet) -> ValidationOutcome {
    run_chain(&Validator::CHAIN, req, policy)
}
