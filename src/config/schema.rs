//! Configuration schema definitions.
//!
//! Two descriptor documents feed the gateway:
//! - `proxy_config.json` names the single upstream (`ProxyDescriptor`).
//! - `rules_config.json` carries the admission rules (`RulesConfig`).
//!
//! Runtime knobs that are not policy (ports, timeouts, log level) live in
//! `GatewaySettings` and are resolved from CLI flags and the environment.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Root of `proxy_config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyDescriptor {
    /// The upstream every admitted request is forwarded to.
    pub destination: Destination,
}

/// Upstream service location.
///
/// Exactly these three fields; anything else is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Destination {
    /// Upstream host name or address.
    pub host: String,

    /// Upstream TCP port (1-65535).
    pub port: u16,

    /// Base path prefixed to every forwarded request.
    #[serde(rename = "path", alias = "base_path")]
    pub base_path: String,
}

/// Root of `rules_config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// HTTP method tokens admitted by the method validator.
    pub allowed_methods: Vec<String>,

    pub method_validation_enabled: bool,
    pub uri_validation_enabled: bool,
    pub header_validation_enabled: bool,
    pub payload_limiting_enabled: bool,
    pub json_validation_enabled: bool,
    pub rate_limiting_enabled: bool,

    /// Echo raw schema-validator messages to the client.
    pub detailed_errors_enabled: bool,

    /// Exact request paths that are always admitted.
    pub allowed_uris: Vec<String>,

    /// Regular expressions matched from the start of the request path.
    pub allowed_uri_patterns: Vec<String>,

    /// Header name -> `"*"`, `"regex:<pattern>"` or a literal value.
    /// Document order is preserved.
    pub required_headers: Map<String, Value>,

    /// Header names that must not be present.
    pub prohibited_headers: Vec<String>,

    /// Maximum declared request size in bytes.
    #[serde(alias = "max_payload_bytes")]
    pub max_payload_size: u64,

    /// JSON schema applied to POST/PUT bodies.
    pub json_schema: Value,

    /// Rate limit rule, e.g. `"10 per minute"`.
    pub rate_limit: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            allowed_methods: ["GET", "POST", "PUT", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            method_validation_enabled: false,
            uri_validation_enabled: false,
            header_validation_enabled: false,
            payload_limiting_enabled: false,
            json_validation_enabled: false,
            rate_limiting_enabled: false,
            detailed_errors_enabled: false,
            allowed_uris: Vec::new(),
            allowed_uri_patterns: Vec::new(),
            required_headers: Map::new(),
            prohibited_headers: Vec::new(),
            max_payload_size: 1024,
            json_schema: Value::Object(Map::new()),
            rate_limit: "10 per minute".to_string(),
        }
    }
}

/// Process-level settings that sit outside the policy documents.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bind address of the gateway listener.
    pub listen_address: String,

    /// Directory holding both descriptor files; working directory when unset.
    pub config_location: Option<PathBuf>,

    /// Liveness endpoint.
    pub health: HealthConfig,

    /// Prometheus exporter.
    pub metrics: MetricsConfig,

    /// Upstream timeout in seconds.
    pub forward_timeout_secs: u64,

    /// Largest inbound body the gateway will buffer.
    pub body_buffer_limit: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:5000".to_string(),
            config_location: None,
            health: HealthConfig::default(),
            metrics: MetricsConfig::default(),
            forward_timeout_secs: 180,
            body_buffer_limit: 10 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

/// Liveness endpoint configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9000,
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9100,
        }
    }
}
