//! Registry configuration.
//!
//! ```toml
//! key_policy = "per_registration"   # or "shared_by_event_type"
//! default_priority = "normal"       # lowest, low, normal, high, highest, monitor
//! ignore_cancelled = true
//! ```

use crate::error::CallbackError;
use crate::types::{EventPriority, KeyPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for an [`EventCallbacks`](crate::EventCallbacks) registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbacksConfig {
    /// How registration keys are derived
    pub key_policy: KeyPolicy,
    /// Priority used by `register` when none is given
    pub default_priority: EventPriority,
    /// Skip events an earlier listener cancelled
    pub ignore_cancelled: bool,
}

impl Default for CallbacksConfig {
    fn default() -> Self {
        Self {
            key_policy: KeyPolicy::default(),
            default_priority: EventPriority::default(),
            ignore_cancelled: true,
        }
    }
}

impl CallbacksConfig {
    /// Parses a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, CallbackError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CallbackError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, CallbackError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_callbacks_config_default() {
        let config = CallbacksConfig::default();
        assert_eq!(config.key_policy, KeyPolicy::PerRegistration);
        assert_eq!(config.default_priority, EventPriority::Normal);
        assert!(config.ignore_cancelled);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = CallbacksConfig::from_toml_str(r#"key_policy = "shared_by_event_type""#)
            .expect("Failed to parse partial config");
        assert_eq!(config.key_policy, KeyPolicy::SharedByEventType);
        assert_eq!(config.default_priority, EventPriority::Normal);

        let empty = CallbacksConfig::from_toml_str("").expect("Failed to parse empty config");
        assert_eq!(empty, CallbacksConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CallbacksConfig::from_toml_str(r#"default_priority = "urgent""#);
        assert!(matches!(result, Err(CallbackError::ConfigParse(_))));
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = CallbacksConfig {
            key_policy: KeyPolicy::SharedByEventType,
            default_priority: EventPriority::Highest,
            ignore_cancelled: false,
        };

        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .expect("Failed to write config");

        let loaded = CallbacksConfig::load_from_file(file.path()).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_file() {
        let result = CallbacksConfig::load_from_file("/nonexistent/event-callbacks.toml");
        assert!(matches!(result, Err(CallbackError::Io(_))));
    }
}
