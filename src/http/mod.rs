//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, method filter, request span, body buffering)
//!     → admission::Pipeline (rate limit, validators, forwarder)
//!     → response.rs (Reply: relayed upstream response or JSON denial)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::Reply;
pub use server::HttpServer;
