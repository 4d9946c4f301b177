//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client sliding window, keyed by remote IP)
//!     → admission validators (path, method, body, headers, size)
//!     → forwarder
//! ```
//!
//! # Design Decisions
//! - Rate limiting is the cheapest rejection, so it runs first
//! - State is sharded by client key; one client never drains another's quota
//! - No state is created at all when rate limiting is disabled

pub mod rate_limit;

pub use rate_limit::{RateDecision, RateLimitRule, RateLimiter, RuleParseError};
