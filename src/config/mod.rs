//! # Configuration Management Module
//!
//! Herald reads a single TOML file with four sections:
//!
//! - [`BotConfig`] - bot identity, owner and command prefix
//! - [`AnnounceConfig`] - announcer pacing (poll interval, inter-send delay)
//! - [`StorageConfig`] - data directory and community directory file
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use herald::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Poll interval: {:?}", config.announce.poll_interval());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bot]
//! name = "Herald"
//! owner = "owner"
//! command_prefix = "!"
//!
//! [announce]
//! poll_interval_ms = 1000
//! send_delay_ms = 1000
//!
//! [storage]
//! data_dir = "./data"
//! directory_file = "directory.json"
//!
//! [logging]
//! level = "info"
//! file = "herald.log"
//! ```
//!
//! Every key in `[announce]` is optional and falls back to its default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub announce: AnnounceConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub name: String,
    /// Member id treated as the bot owner (bypasses manage-roles checks).
    pub owner: String,
    /// Prefix that marks a console line as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

fn default_command_prefix() -> String {
    "!".to_string()
}

/// Announcer pacing. Both intervals are one "time unit" of the fan-out policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnounceConfig {
    /// Sleep between mailbox polls (ms).
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay after each delivery attempt before moving to the next group (ms).
    #[serde(default = "default_interval_ms")]
    pub send_delay_ms: u64,
    /// Maximum announcement length in characters.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_message_len() -> usize {
    2000
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_interval_ms(),
            send_delay_ms: default_interval_ms(),
            max_message_len: default_max_message_len(),
        }
    }
}

impl AnnounceConfig {
    /// Config with both intervals set to `ms` (tests and demos).
    pub fn with_interval_ms(ms: u64) -> Self {
        Self {
            poll_interval_ms: ms,
            send_delay_ms: ms,
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Community directory seed, relative to `data_dir` unless absolute.
    #[serde(default = "default_directory_file")]
    pub directory_file: String,
}

fn default_directory_file() -> String {
    "directory.json".to_string()
}

impl StorageConfig {
    pub fn directory_path(&self) -> PathBuf {
        let p = PathBuf::from(&self.directory_file);
        if p.is_absolute() {
            p
        } else {
            PathBuf::from(&self.data_dir).join(p)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                name: "Herald".to_string(),
                owner: "owner".to_string(),
                command_prefix: default_command_prefix(),
            },
            announce: AnnounceConfig::default(),
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                directory_file: default_directory_file(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("herald.log".to_string()),
            },
        }
    }
}
