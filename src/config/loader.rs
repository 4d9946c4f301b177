//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::overrides::{check_env_conflicts, EnvConflict};
use crate::config::policy::PolicySet;
use crate::config::schema::{ProxyDescriptor, RulesConfig};
use crate::config::validation::{compile_policy, ValidationError};

pub const PROXY_CONFIG_FILE: &str = "proxy_config.json";
pub const RULES_CONFIG_FILE: &str = "rules_config.json";

/// Older rule files name the rate limit toggle `limiting_enabled`.
const LEGACY_RATE_LIMIT_KEY: &str = "limiting_enabled";
const RATE_LIMIT_KEY: &str = "rate_limiting_enabled";

/// Error type for configuration loading. Every variant is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration file '{}' is missing", .0.display())]
    Missing(PathBuf),

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error("environment variable and configuration integrity check failed: {}", join(.0))]
    EnvConflict(Vec<EnvConflict>),
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Both descriptors as read from disk.
#[derive(Debug, Clone)]
pub struct Descriptors {
    pub proxy: ProxyDescriptor,
    /// Raw rule document; the override guard inspects keys serde would drop.
    pub rules: Map<String, Value>,
}

/// Resolve a descriptor file name against the configured directory.
pub fn config_file_path(location: Option<&Path>, file_name: &str) -> PathBuf {
    match location {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::Missing(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse both descriptor files.
pub fn load_descriptors(location: Option<&Path>) -> Result<Descriptors, ConfigError> {
    let proxy_path = config_file_path(location, PROXY_CONFIG_FILE);
    let rules_path = config_file_path(location, RULES_CONFIG_FILE);

    let proxy: ProxyDescriptor = read_json(&proxy_path)?;
    let mut rules: Map<String, Value> = read_json(&rules_path)?;

    if let Some(value) = rules.remove(LEGACY_RATE_LIMIT_KEY) {
        rules.entry(RATE_LIMIT_KEY).or_insert(value);
    }

    tracing::debug!(
        proxy = %proxy_path.display(),
        rules = %rules_path.display(),
        "Descriptors loaded"
    );
    Ok(Descriptors { proxy, rules })
}

/// Load descriptors, reconcile environment overrides and compile the policy.
pub fn load_policy<F>(location: Option<&Path>, env_lookup: F) -> Result<PolicySet, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Descriptors { proxy, rules } = load_descriptors(location)?;
    let overrides = check_env_conflicts(&rules, env_lookup)?;

    let rules_path = config_file_path(location, RULES_CONFIG_FILE);
    let rules: RulesConfig =
        serde_json::from_value(Value::Object(rules)).map_err(|source| ConfigError::Parse {
            path: rules_path,
            source,
        })?;

    compile_policy(proxy.destination, &rules, &overrides).map_err(ConfigError::Invalid)
}
