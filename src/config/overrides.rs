//! Environment overrides for feature toggles.
//!
//! Every `*_enabled` key in the rule descriptor may be overridden by an
//! environment variable of the same name upper-cased (`uri_validation_enabled`
//! → `URI_VALIDATION_ENABLED`). Overrides may only narrow the policy surface:
//!
//! | file  | override | result                          |
//! |-------|----------|---------------------------------|
//! | true  | false    | feature disabled, note logged   |
//! | false | true     | startup refused                 |
//! | any   | unset    | file value                      |
//!
//! An override is `true` only when its value is `"true"` (any case).

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::config::loader::ConfigError;
use crate::config::validation::ValidationError;

const TOGGLE_SUFFIX: &str = "_enabled";

/// Feature toggles forced off by the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    disabled: BTreeSet<String>,
}

impl Overrides {
    /// No overrides in effect.
    pub fn none() -> Self {
        Self::default()
    }

    /// Overrides that force the given rule keys off.
    pub fn disabling<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            disabled: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the rule key may keep its file value.
    pub fn allows(&self, key: &str) -> bool {
        !self.disabled.contains(key)
    }

    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.disabled.iter().map(String::as_str)
    }
}

/// An override that tries to enable what the rule file disables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConflict {
    pub key: String,
    pub env_key: String,
    pub file_value: bool,
    pub env_value: bool,
}

impl fmt::Display for EnvConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "environment variable '{}' is set to {}, but '{}' in rules_config.json is set to {}",
            self.env_key, self.env_value, self.key, self.file_value
        )
    }
}

/// Reconcile environment overrides against the raw rule descriptor.
///
/// `lookup` resolves an environment variable name; production passes the
/// process environment, tests pass a map.
pub fn check_env_conflicts<F>(rules: &Map<String, Value>, lookup: F) -> Result<Overrides, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut disabled = BTreeSet::new();
    let mut conflicts = Vec::new();
    let mut invalid = Vec::new();

    for (key, value) in rules.iter().filter(|(k, _)| k.ends_with(TOGGLE_SUFFIX)) {
        let Some(file_value) = value.as_bool() else {
            invalid.push(ValidationError::NonBooleanToggle(key.clone()));
            continue;
        };

        let env_key = key.to_ascii_uppercase();
        let Some(raw) = lookup(&env_key) else {
            continue;
        };
        let env_value = raw.eq_ignore_ascii_case("true");

        match (file_value, env_value) {
            (true, false) => {
                tracing::warn!(
                    env_key = %env_key,
                    config_key = %key,
                    "Feature explicitly disabled via environment, overriding rules_config.json"
                );
                disabled.insert(key.clone());
            }
            (false, true) => conflicts.push(EnvConflict {
                key: key.clone(),
                env_key,
                file_value,
                env_value,
            }),
            _ => {}
        }
    }

    if !invalid.is_empty() {
        return Err(ConfigError::Invalid(invalid));
    }
    if !conflicts.is_empty() {
        for conflict in &conflicts {
            tracing::error!(%conflict, "Configuration mismatch");
        }
        return Err(ConfigError::EnvConflict(conflicts));
    }

    tracing::info!("Environment variable and configuration integrity check passed");
    Ok(Overrides { disabled })
}
