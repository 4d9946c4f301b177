//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted RequestView
//!     → forwarder.rs (URL rewrite, method rules, header filtering)
//!     → hyper client (pooled, one timeout per exchange)
//!     → http::response::Reply relayed to the caller
//! ```

pub mod forwarder;

pub use forwarder::{ForwardError, Forwarder};
