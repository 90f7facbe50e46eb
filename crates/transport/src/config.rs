//! Transport configuration management

use crate::listen::{ITER_DELAY, ITER_MAX};
use anyhow::{Context, Result, anyhow};
use protocol::codec::{CodecLimits, DEFAULT_MAX_MESSAGE_SIZE, MAX_FRAME_LENGTH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Change poller settings
    #[serde(default)]
    pub poll: PollSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Wire codec settings
    #[serde(default)]
    pub codec: CodecSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    /// Enumeration rounds per `listen` call
    #[serde(default = "PollSettings::default_iter_max")]
    pub iter_max: u32,
    /// Delay between rounds in milliseconds
    #[serde(default = "PollSettings::default_iter_delay_ms")]
    pub iter_delay_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            iter_max: Self::default_iter_max(),
            iter_delay_ms: Self::default_iter_delay_ms(),
        }
    }
}

impl PollSettings {
    fn default_iter_max() -> u32 {
        ITER_MAX
    }

    fn default_iter_delay_ms() -> u64 {
        ITER_DELAY.as_millis() as u64
    }

    pub fn iter_delay(&self) -> Duration {
        Duration::from_millis(self.iter_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default log level when `RUST_LOG` is unset
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
    /// Log every transport operation at debug level
    #[serde(default)]
    pub verbose: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            verbose: false,
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Largest accepted message payload in bytes
    #[serde(default = "CodecSettings::default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            max_message_size: Self::default_max_message_size(),
        }
    }
}

impl CodecSettings {
    fn default_max_message_size() -> usize {
        DEFAULT_MAX_MESSAGE_SIZE
    }

    pub fn limits(&self) -> CodecLimits {
        CodecLimits {
            max_message_size: self.max_message_size,
        }
    }
}

impl TransportConfig {
    /// Load configuration from file
    ///
    /// Without a path, the default location is used. A leading `~` is expanded.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => expand_path(&p),
            None => {
                let p = Self::default_path();
                if !p.exists() {
                    return Err(anyhow!("No configuration file found at {}", p.display()));
                }
                p
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: TransportConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("device-transport").join("transport.toml")
        } else {
            PathBuf::from(".config/device-transport/transport.toml")
        }
    }

    /// Install the global tracing subscriber at `logging.level`
    pub fn init_logging(&self) -> Result<()> {
        common::setup_logging(&self.logging.level)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        if self.poll.iter_max == 0 {
            return Err(anyhow!("poll.iter_max must be at least 1"));
        }

        if self.codec.max_message_size == 0 {
            return Err(anyhow!("codec.max_message_size must be at least 1"));
        }

        if self.codec.max_message_size > MAX_FRAME_LENGTH {
            return Err(anyhow!(
                "codec.max_message_size must not exceed {}",
                MAX_FRAME_LENGTH
            ));
        }

        Ok(())
    }
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_poller_constants() {
        let config = TransportConfig::default();
        assert_eq!(config.poll.iter_max, 60);
        assert_eq!(config.poll.iter_delay(), Duration::from_millis(500));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: TransportConfig = toml::from_str("[poll]\niter_max = 5\n").unwrap();
        assert_eq!(config.poll.iter_max, 5);
        assert_eq!(config.poll.iter_delay_ms, 500);
        assert_eq!(config.codec.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_rounds() {
        let mut config = TransportConfig::default();
        config.poll.iter_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_message_size_by_length_header() {
        let mut config = TransportConfig::default();
        config.codec.max_message_size = MAX_FRAME_LENGTH;
        assert!(config.validate().is_ok());

        config.codec.max_message_size = 0;
        assert!(config.validate().is_err());

        if let Some(too_large) = MAX_FRAME_LENGTH.checked_add(1) {
            config.codec.max_message_size = too_large;
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_validate_rejects_bad_level() {
        let mut config = TransportConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("transport.toml");

        let mut config = TransportConfig::default();
        config.poll.iter_delay_ms = 250;
        config.logging.verbose = true;
        config.save(&path).unwrap();

        let loaded = TransportConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.poll.iter_delay_ms, 250);
        assert!(loaded.logging.verbose);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TransportConfig::load(Some(dir.path().join("absent.toml"))).is_err());
    }
}
