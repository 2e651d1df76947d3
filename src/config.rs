//! Channel configuration.
//!
//! Hosts can embed a `[channel]`-style table in their own TOML
//! configuration:
//!
//! ```toml
//! queue_capacity = 128
//! label = "viewer"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default bound for the command and reply queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Configuration for one worker channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Capacity of the command and reply queues (minimum 1).
    pub queue_capacity: usize,

    /// Label attached to this channel's diagnostics.
    pub label: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            label: None,
        }
    }
}

impl ChannelConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.label.is_none());
    }

    #[test]
    fn test_from_toml_str() {
        let config = ChannelConfig::from_toml_str(
            r#"
            queue_capacity = 16
            label = "viewer"
            "#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.label.as_deref(), Some("viewer"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = ChannelConfig::from_toml_str("label = \"thumbs\"").unwrap();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }
}
