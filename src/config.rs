//! Configuration module for livechat.

use serde::Deserialize;
use std::path::Path;

use crate::chat::{RoomLocation, MAX_MESSAGE_LENGTH};
use crate::{ChatError, Result};

/// Chat room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Base URL of the authentication service (`POST {api_url}/auth`).
    #[serde(default)]
    pub api_url: String,
    /// Region or full endpoint URL of the chat service.
    #[serde(default = "default_region")]
    pub region: String,
    /// Room resource identifier.
    #[serde(default)]
    pub room_id: String,
    /// Total timeout for the token request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Connect timeout for the token request in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum number of characters in a composed message.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_message_length() -> usize {
    MAX_MESSAGE_LENGTH
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            region: default_region(),
            room_id: String::new(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_message_length: default_max_message_length(),
        }
    }
}

impl ChatConfig {
    /// Room location the sessions connect to.
    pub fn location(&self) -> RoomLocation {
        RoomLocation::new(&self.region, &self.room_id)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/livechat.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Chat room configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ChatError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ChatError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LIVECHAT_API_URL`: authentication service base URL
    /// - `LIVECHAT_REGION`: chat region or endpoint URL
    /// - `LIVECHAT_ROOM_ID`: room resource identifier
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            ("LIVECHAT_API_URL", &mut self.chat.api_url),
            ("LIVECHAT_REGION", &mut self.chat.region),
            ("LIVECHAT_ROOM_ID", &mut self.chat.room_id),
        ];
        for (name, field) in overrides {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `api_url` is not an http(s) URL
    /// - `room_id` is empty
    /// - `max_message_length` is zero
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.chat.api_url)
            .map_err(|e| ChatError::Config(format!("invalid api_url: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "unsupported api_url scheme: {}",
                parsed.scheme()
            )));
        }
        if self.chat.room_id.trim().is_empty() {
            return Err(ChatError::Config(
                "room_id is not set. Set it in config.toml or via LIVECHAT_ROOM_ID.".to_string(),
            ));
        }
        if self.chat.max_message_length == 0 {
            return Err(ChatError::Config(
                "max_message_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
