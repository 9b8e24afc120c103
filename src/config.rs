//! Link and application configuration
//!
//! Everything is plain serde data with defaults for every field, so a partial
//! TOML file only overrides what it names. The application config lives under
//! the user config directory and is created with defaults on first start.

use crate::codec::ProtocolMode;
use crate::error::ConfigError;
use crate::link::state::ReconnectPolicy;
use crate::mapping::ControlLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_DIR: &str = "opencontroller";
pub const CONFIG_FILE: &str = "link.toml";
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000/ws";

/// Tuning of the transport pipeline
///
/// # Examples
///
/// ```rust
/// use opencontroller_link::config::LinkConfig;
///
/// let config: LinkConfig = toml::from_str("throttle_interval_ms = 33").unwrap();
/// assert_eq!(config.throttle_interval_ms, 33);
/// assert_eq!(config.queue_capacity, 100);
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Encoding of control updates on the wire
    pub protocol: ProtocolMode,

    /// Minimum spacing of throttled sends, 16 ms is roughly one frame at 60 Hz
    pub throttle_interval_ms: u64,

    /// Messages kept while the link is down
    pub queue_capacity: usize,

    /// Retries after an unclean close before giving up
    pub max_reconnect_attempts: u32,

    pub base_reconnect_delay_ms: u64,

    pub max_reconnect_delay_ms: u64,

    pub heartbeat_interval_ms: u64,

    /// Number of RTT samples kept for the average
    pub latency_window: usize,

    /// Capacity of the command channel of [`crate::link::LinkHandle`]
    pub command_buffer: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolMode::Binary,
            throttle_interval_ms: 16,
            queue_capacity: 100,
            max_reconnect_attempts: 10,
            base_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30000,
            heartbeat_interval_ms: 1000,
            latency_window: 30,
            command_buffer: 256,
        }
    }
}

impl LinkConfig {
    /// Rejects values the link cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.base_reconnect_delay_ms > self.max_reconnect_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "base_reconnect_delay_ms ({}) exceeds max_reconnect_delay_ms ({})",
                self.base_reconnect_delay_ms, self.max_reconnect_delay_ms
            )));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.latency_window == 0 {
            return Err(ConfigError::Invalid(
                "latency_window must be at least 1".to_string(),
            ));
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid(
                "command_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.base_reconnect_delay_ms),
            max_delay: Duration::from_millis(self.max_reconnect_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Configuration of the `opencontroller-link` binary
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub link: LinkConfig,
    pub layout: ControlLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            link: LinkConfig::default(),
            layout: ControlLayout::default(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/opencontroller/link.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url is empty".to_string()));
        }
        self.link.validate()
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        config.layout.resolve_buttons();
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Loads `path`, writing the defaults there first if it does not exist
    pub async fn ensure_default(path: &Path) -> Result<Self, ConfigError> {
        if !tokio::fs::try_exists(path).await? {
            info!("Creating default configuration at {}", path.display());
            AppConfig::default().save(path).await?;
        }
        AppConfig::load(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(LinkConfig::default().validate().is_ok());
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LinkConfig = toml::from_str(
            r#"
            protocol = "json"
            queue_capacity = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.protocol, ProtocolMode::Json);
        assert_eq!(config.queue_capacity, 20);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.throttle_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_validate_rejects_inconsistent_values() {
        let config = LinkConfig {
            queue_capacity: 0,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            base_reconnect_delay_ms: 60000,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            heartbeat_interval_ms: 0,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_policy_from_config() {
        let policy = LinkConfig::default().reconnect_policy();
        assert_eq!(policy, ReconnectPolicy::default());
    }

    #[tokio::test]
    async fn test_ensure_default_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let created = AppConfig::ensure_default(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(created, AppConfig::default());

        let mut changed = created.clone();
        changed.server_url = "ws://10.0.0.2:8000/ws".to_string();
        changed.save(&path).await.unwrap();
        let loaded = AppConfig::ensure_default(&path).await.unwrap();
        assert_eq!(loaded.server_url, "ws://10.0.0.2:8000/ws");
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        tokio::fs::write(&path, "[link]\nqueue_capacity = 0\n").await.unwrap();
        assert!(matches!(
            AppConfig::load(&path).await,
            Err(ConfigError::Invalid(_))
        ));
    }
}
