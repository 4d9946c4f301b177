//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! proxy_config.json + rules_config.json
//!     → loader.rs (read & deserialize, normalise legacy keys)
//!     → overrides.rs (reconcile *_ENABLED environment overrides)
//!     → validation.rs (semantic checks, compile patterns/schema/rate rule)
//!     → PolicySet (validated, immutable)
//!     → shared via Arc with the pipeline and forwarder
//! ```
//!
//! # Design Decisions
//! - PolicySet is built exactly once, before any listener binds
//! - Overrides may only narrow the policy; widening aborts startup
//! - Validation separates syntactic (serde) from semantic checks
//! - Rule keys have defaults so minimal rule files are accepted

pub mod loader;
pub mod overrides;
pub mod policy;
pub mod schema;
pub mod validation;

pub use loader::{load_policy, ConfigError};
pub use overrides::{check_env_conflicts, EnvConflict, Overrides};
pub use policy::PolicySet;
pub use schema::{Destination, GatewaySettings, HealthConfig, MetricsConfig, RulesConfig};
