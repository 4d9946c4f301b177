//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape on the metrics port)
//! ```
//!
//! # Design Decisions
//! - Each inbound request gets a span with a UUID request id
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
