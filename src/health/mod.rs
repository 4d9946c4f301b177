//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Orchestrator liveness check
//!     → liveness.rs (separate listener, fixed body)
//! ```
//!
//! # Design Decisions
//! - Liveness only: the gateway does not check its upstream
//! - Runs on its own port so admission rules never apply to it

pub mod liveness;

pub use liveness::serve_liveness;
