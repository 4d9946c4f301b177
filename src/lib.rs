//! HTTP admission gateway library.

// Core subsystems
pub mod admission;
pub mod config;
pub mod http;
pub mod proxy;

// Cross-cutting concerns
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use admission::{Pipeline, RequestView, ValidationOutcome};
pub use config::{load_policy, GatewaySettings, PolicySet};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
