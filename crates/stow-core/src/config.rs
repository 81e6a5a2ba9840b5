//! Engine configuration.
//!
//! Deployments tune the notification channel and the default event source
//! through a small TOML file. Everything has a working default; an empty
//! config is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration parsing failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content is invalid.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serialization back to TOML failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The parsed values fail a semantic check.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Broadcast channel topic for door notifications.
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,

    /// Upper bound on one notification publish attempt, in milliseconds.
    /// Publishes that exceed it are dropped, not retried.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Event source recorded when the caller supplies none.
    #[serde(default = "default_event_source")]
    pub default_event_source: String,

    /// bcrypt cost for newly registered access codes.
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_notification_topic() -> String {
    "locker_updates".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    250
}

fn default_event_source() -> String {
    "apk".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            notification_topic: default_notification_topic(),
            publish_timeout_ms: default_publish_timeout_ms(),
            default_event_source: default_event_source(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or a value fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// The publish bound as a [`Duration`].
    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_topic.trim().is_empty() {
            return Err(ConfigError::Validation(
                "notification_topic must not be empty".to_string(),
            ));
        }
        if self.default_event_source.trim().is_empty() {
            return Err(ConfigError::Validation(
                "default_event_source must not be empty".to_string(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Validation(format!(
                "bcrypt_cost {} outside the supported range 4..=31",
                self.bcrypt_cost
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.notification_topic, "locker_updates");
        assert_eq!(config.default_event_source, "apk");
        assert_eq!(config.publish_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn partial_config_overrides_selected_fields() {
        let config = EngineConfig::from_toml(
            r#"
            notification_topic = "site_a_lockers"
            publish_timeout_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.notification_topic, "site_a_lockers");
        assert_eq!(config.publish_timeout_ms, 1000);
        assert_eq!(config.default_event_source, "apk");
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EngineConfig {
            notification_topic: "t".into(),
            publish_timeout_ms: 10,
            default_event_source: "kiosk".into(),
            bcrypt_cost: 10,
        };
        let rendered = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.notification_topic, "t");
        assert_eq!(parsed.default_event_source, "kiosk");
    }

    #[test]
    fn rejects_empty_topic_and_bad_cost() {
        assert!(matches!(
            EngineConfig::from_toml("notification_topic = \"\""),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml("bcrypt_cost = 2"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml("notification_topic = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
