//! Typed configuration for the caching core.
//!
//! Settings can be constructed in code, loaded from a YAML file, or loaded
//! from environment variables. Environment variables take precedence over
//! file values, which take precedence over defaults (12-factor pattern):
//!
//! - `FGACACHE_ENABLED=true` - enable write-behind buffering
//! - `FGACACHE_BATCH_SIZE=200` - flush batch size
//! - `FGACACHE_FLUSH_INTERVAL_MS=1000` - flush ticker period
//! - `FGACACHE_TTL_MS=60000` - cache entry time-to-live
//!
//! # Example YAML Configuration
//!
//! ```yaml
//! enabled: true
//! batch_size: 100
//! flush_interval_ms: 5000
//! ttl_ms: 300000
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Configuration for the read-through cache and write-behind buffer.
///
/// # Safety
///
/// Write-behind buffering is **disabled** by default (`enabled: false`).
/// Buffered grants and revokes have not reached the authoritative store yet,
/// and a cached positive authorization decision can be served stale until
/// invalidation. Enable explicitly once the staleness and at-most-once flush
/// semantics are acceptable for your deployment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CacheSettings {
    /// Whether write-behind buffering is enabled.
    ///
    /// Defaults to `false`; `grant`/`revoke`/`flush` fail while disabled.
    #[serde(default)]
    pub enabled: bool,

    /// Maximum operations per flush batch, and the pending-count threshold
    /// that triggers an early flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Period of the background flush ticker, in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Time-to-live for cached check results, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Maximum number of entries held by the check cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            ttl_ms: default_ttl_ms(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    5_000
}

fn default_ttl_ms() -> u64 {
    300_000
}

fn default_max_capacity() -> u64 {
    100_000
}

/// Error type for settings loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    #[error("settings file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid settings: {message}")]
    Invalid { message: String },
}

impl CacheSettings {
    /// Enables or disables write-behind buffering.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the flush batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the flush ticker period.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the cache entry time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Sets the maximum cache capacity.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// The flush ticker period as a [`Duration`].
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// The cache entry time-to-live as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Load settings from a YAML file with environment variable overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SettingsError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&CacheSettings::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix("FGACACHE").prefix_separator("_"))
            .build()?;

        let settings: CacheSettings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Load settings from environment variables only.
    pub fn from_env() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(Config::try_from(&CacheSettings::default())?)
            .add_source(Environment::with_prefix("FGACACHE").prefix_separator("_"))
            .build()?;

        let settings: CacheSettings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid {
                message: "batch_size must be greater than 0".to_string(),
            });
        }
        if self.flush_interval_ms == 0 {
            return Err(SettingsError::Invalid {
                message: "flush_interval_ms must be greater than 0".to_string(),
            });
        }
        if self.ttl_ms == 0 {
            return Err(SettingsError::Invalid {
                message: "ttl_ms must be greater than 0".to_string(),
            });
        }
        if self.max_capacity == 0 {
            return Err(SettingsError::Invalid {
                message: "max_capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
