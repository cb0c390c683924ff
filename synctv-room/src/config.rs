use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

/// Room subsystem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub room: RoomConfig,
    pub logging: LoggingConfig,
}

/// Limits and queue sizes applied to every room
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Capacity of the hub's broadcast queue
    pub hub_queue_capacity: usize,
    /// Capacity of each client connection's outbound mailbox
    pub mailbox_capacity: usize,
    /// Maximum room id length in bytes
    pub max_room_id_len: usize,
    /// Maximum user name length in bytes
    pub max_user_name_len: usize,
    /// Maximum room or user password length in bytes
    pub max_password_len: usize,
    /// bcrypt cost for room and user passwords
    pub password_cost: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            hub_queue_capacity: 128,
            mailbox_capacity: 128,
            max_room_id_len: 32,
            max_user_name_len: 32,
            max_password_len: 32,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl RoomConfig {
    /// Reject values that would make channels or validation unusable.
    pub fn validate(&self) -> Result<()> {
        if self.hub_queue_capacity == 0 {
            return Err(Error::InvalidInput(
                "hub_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(Error::InvalidInput(
                "mailbox_capacity must be greater than 0".to_string(),
            ));
        }
        if self.max_room_id_len == 0 || self.max_user_name_len == 0 || self.max_password_len == 0 {
            return Err(Error::InvalidInput(
                "length limits must be greater than 0".to_string(),
            ));
        }
        if !(4..=31).contains(&self.password_cost) {
            return Err(Error::InvalidInput(format!(
                "password_cost must be between 4 and 31, got {}",
                self.password_cost
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // SYNCTV_ROOM__MAILBOX_CAPACITY, SYNCTV_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("SYNCTV")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config
            .room
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        Self::load(Some(path))
    }
}
