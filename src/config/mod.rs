//! # Configuration Management Module
//!
//! All runtime settings for a worldcore server live in one TOML file, loaded with `toml` and
//! `serde`. Every section has defaults, so a partial file is enough.
//!
//! ## Configuration Structure
//!
//! - [`ServerConfig`] - listener address, welcome text and the out-of-character command prefix
//! - [`WorldConfig`] - sled data directory, default zone and map size
//! - [`SessionConfig`] - terminal geometry used for menus, ambient tick events, event queue depth
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use worldcore::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Listening on {}", config.server.bind);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! name = "worldcore"
//! bind = "127.0.0.1:4000"
//! welcome_message = "Welcome!"
//! command_prefix = "/"
//!
//! [world]
//! data_dir = "./data"
//! default_zone = "Default"
//! map_width = 20
//!
//! [session]
//! tick_interval_secs = 0   # 0 disables ambient events
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::world::DEFAULT_ZONE_NAME;

pub const DEFAULT_COMMAND_PREFIX: char = '/';

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub bind: String,
    pub welcome_message: String,
    /// Prefix that marks out-of-character commands. Must be a single non-alphanumeric,
    /// non-whitespace character; anything else falls back to "/".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_prefix: Option<String>,
}

impl ServerConfig {
    pub fn command_prefix(&self) -> char {
        let Some(raw) = self.command_prefix.as_deref() else {
            return DEFAULT_COMMAND_PREFIX;
        };
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_alphanumeric() && !c.is_whitespace() => c,
            _ => {
                warn!(
                    "Invalid command prefix '{}', defaulting to '{}'",
                    raw, DEFAULT_COMMAND_PREFIX
                );
                DEFAULT_COMMAND_PREFIX
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    pub data_dir: String,
    #[serde(default = "default_zone_name")]
    pub default_zone: String,
    /// Width of the `map` view; the map shows `map_width + 1` rows and columns.
    #[serde(default = "default_map_width")]
    pub map_width: u32,
}

fn default_zone_name() -> String {
    DEFAULT_ZONE_NAME.to_string()
}

fn default_map_width() -> u32 {
    20
}

impl WorldConfig {
    /// Location of the sled database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("world")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Terminal geometry assumed for every connection (no NAWS negotiation).
    #[serde(default = "default_window_width")]
    pub window_width: usize,
    #[serde(default = "default_window_height")]
    pub window_height: usize,
    /// Seconds between ambient events; 0 disables them.
    #[serde(default)]
    pub tick_interval_secs: u64,
    #[serde(default = "default_tick_messages")]
    pub tick_messages: Vec<String>,
    /// Per-session bound on undelivered events. Overflow is dropped.
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

fn default_window_width() -> usize {
    80
}

fn default_window_height() -> usize {
    24
}

fn default_tick_messages() -> Vec<String> {
    vec![
        "A cool breeze drifts past.".to_string(),
        "Somewhere far off, a bell tolls.".to_string(),
        "The light shifts as a cloud passes overhead.".to_string(),
    ]
}

fn default_event_queue_depth() -> usize {
    32
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_secs > 0).then(|| Duration::from_secs(self.tick_interval_secs))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            tick_interval_secs: 0,
            tick_messages: default_tick_messages(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', defaulting to info", self.level);
            log::LevelFilter::Info
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub world: WorldConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub logging: LoggingConfig,
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
            server: ServerConfig {
                name: "worldcore".to_string(),
                bind: "127.0.0.1:4000".to_string(),
                welcome_message: "Welcome to worldcore.".to_string(),
                command_prefix: Some(DEFAULT_COMMAND_PREFIX.to_string()),
            },
            world: WorldConfig {
                data_dir: "./data".to_string(),
                default_zone: default_zone_name(),
                map_width: default_map_width(),
            },
            session: SessionConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("worldcore.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_with_prefix(prefix: Option<&str>) -> ServerConfig {
        ServerConfig {
            command_prefix: prefix.map(str::to_string),
            ..Config::default().server
        }
    }

    #[test]
    fn test_command_prefix_valid() {
        for (raw, expected) in [("/", '/'), ("@", '@'), ("!", '!'), ("#", '#')] {
            assert_eq!(server_with_prefix(Some(raw)).command_prefix(), expected);
        }
        assert_eq!(server_with_prefix(None).command_prefix(), '/');
    }

    #[test]
    fn test_command_prefix_invalid_falls_back() {
        for raw in ["", "a", "7", "//", " ", "ab"] {
            assert_eq!(
                server_with_prefix(Some(raw)).command_prefix(),
                '/',
                "prefix '{}' should fall back",
                raw
            );
        }
    }

    #[test]
    fn test_minimal_config_uses_section_defaults() {
        let toml = r#"
            [server]
            name = "test"
            bind = "127.0.0.1:0"
            welcome_message = "hi"

            [world]
            data_dir = "/tmp/worldcore"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.world.map_width, 20);
        assert_eq!(config.world.default_zone, "Default");
        assert_eq!(config.session.window_height, 24);
        assert!(config.session.tick_interval().is_none());
        assert_eq!(config.session.event_queue_depth, 32);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
        assert_eq!(config.world.db_path(), PathBuf::from("/tmp/worldcore/world"));
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.bind, "127.0.0.1:4000");
        assert_eq!(parsed.server.command_prefix(), '/');
        assert_eq!(parsed.session.tick_messages.len(), 3);
    }

    #[test]
    fn test_tick_interval() {
        let session = SessionConfig {
            tick_interval_secs: 5,
            ..SessionConfig::default()
        };
        assert_eq!(session.tick_interval(), Some(Duration::from_secs(5)));
    }
}
