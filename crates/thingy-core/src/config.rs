/*!
 * Configuration management for the Thingy driver.
 *
 * Settings are layered: built-in defaults, then an optional file, then
 * environment variables. The queue section controls the bounded polls and
 * the stall-discard policy of the operation queue.
 */
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Driver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Operation queue and polling configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Event stream configuration
    #[serde(default)]
    pub events: EventConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to use JSON format for logs
    #[serde(default)]
    pub json_format: bool,
}

/// Operation queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Interval between polls while waiting for an attribute or the gate
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of polls before a wait times out
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Attempts after which a failing operation becomes a stall candidate
    #[serde(default = "default_stall_min_attempts")]
    pub stall_min_attempts: u32,

    /// A stall candidate is discarded when fewer operations than this ran
    /// since its previous attempt
    #[serde(default = "default_stall_min_progress")]
    pub stall_min_progress: u64,

    /// Attempts after which a failing operation is always discarded
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Number of executed operations kept for stall detection
    #[serde(default = "default_executed_log_capacity")]
    pub executed_log_capacity: usize,
}

/// Event stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Buffered events per subscriber before the slowest one lags
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_attempts: default_poll_attempts(),
            stall_min_attempts: default_stall_min_attempts(),
            stall_min_progress: default_stall_min_progress(),
            max_attempts: default_max_attempts(),
            executed_log_capacity: default_executed_log_capacity(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl QueueConfig {
    /// Interval between two polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Upper bound of a complete poll, 5 s with the defaults
    pub fn poll_ceiling(&self) -> Duration {
        self.poll_interval() * self.poll_attempts
    }
}

impl Config {
    /// Check the invariants the queue relies on
    pub fn validate(&self) -> Result<()> {
        if self.queue.poll_interval_ms == 0 {
            return Err(Error::config("queue.poll_interval_ms must be greater than 0"));
        }
        if self.queue.poll_attempts == 0 {
            return Err(Error::config("queue.poll_attempts must be greater than 0"));
        }
        if self.queue.stall_min_attempts == 0 {
            return Err(Error::config("queue.stall_min_attempts must be greater than 0"));
        }
        if self.queue.max_attempts < self.queue.stall_min_attempts {
            return Err(Error::config(
                "queue.max_attempts must not be lower than queue.stall_min_attempts",
            ));
        }
        if self.queue.executed_log_capacity == 0 {
            return Err(Error::config("queue.executed_log_capacity must be greater than 0"));
        }
        if self.events.channel_capacity == 0 {
            return Err(Error::config("events.channel_capacity must be greater than 0"));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval_ms() -> u64 {
    20
}

fn default_poll_attempts() -> u32 {
    250
}

fn default_stall_min_attempts() -> u32 {
    3
}

fn default_stall_min_progress() -> u64 {
    2
}

fn default_max_attempts() -> u32 {
    10
}

fn default_executed_log_capacity() -> usize {
    64
}

fn default_channel_capacity() -> usize {
    1024
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path (TOML, YAML or JSON, chosen by extension)
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix, e.g. `THINGY` for
    /// `THINGY__QUEUE__POLL_ATTEMPTS`
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        config_builder = config_builder.add_source(
            ConfigLib::try_from(&Config::default())
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::from(path));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.queue.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.queue.poll_ceiling(), Duration::from_secs(5));
        assert_eq!(config.queue.stall_min_attempts, 3);
        assert_eq!(config.queue.stall_min_progress, 2);
        assert_eq!(config.queue.max_attempts, 10);
        assert_eq!(config.events.channel_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir().map_err(|e| Error::other(e.to_string()))?;
        let file_path = dir.path().join("thingy.toml");

        {
            let mut file = File::create(&file_path).map_err(|e| Error::other(e.to_string()))?;
            file.write_all(
                br#"
                [logging]
                level = "debug"

                [queue]
                poll_interval_ms = 10
                poll_attempts = 100
            "#,
            )
            .map_err(|e| Error::other(e.to_string()))?;
        }

        let config = ConfigBuilder::new().with_config_file(file_path).build()?;

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.queue.poll_interval_ms, 10);
        assert_eq!(config.queue.poll_ceiling(), Duration::from_secs(1));
        assert_eq!(config.queue.max_attempts, 10);

        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("THINGYTEST__QUEUE__MAX_ATTEMPTS", "12");
        env::set_var("THINGYTEST__LOGGING__LEVEL", "trace");

        let config = ConfigBuilder::new()
            .with_environment_prefix("THINGYTEST")
            .build()?;

        assert_eq!(config.queue.max_attempts, 12);
        assert_eq!(config.logging.level, "trace");

        env::remove_var("THINGYTEST__QUEUE__MAX_ATTEMPTS");
        env::remove_var("THINGYTEST__LOGGING__LEVEL");

        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.queue.max_attempts = 2;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.queue.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        let shared2 = shared.clone();
        assert_eq!(shared2.get().queue.poll_attempts, 250);
    }
}
