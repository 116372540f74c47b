//! Table cache configuration

use crate::error::{Error, Result};
use serde::Deserialize;

/// Configuration for a `TableCache`.
///
/// # Example
///
/// ```
/// use table_cache::CacheConfig;
///
/// let config = CacheConfig::from_json(r#"{ "max_stale_retries": 5 }"#).unwrap();
/// assert_eq!(config.max_stale_retries, 5);
/// assert!(config.log_stats_on_reset);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How many stale hits one lookup may discard before it goes straight to
    /// the fallback.
    pub max_stale_retries: u32,
    /// Log store statistics when a store is cleared after its indices drift
    /// apart.
    pub log_stats_on_reset: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_stale_retries: 3,
            log_stats_on_reset: true,
        }
    }
}

impl CacheConfig {
    /// Parse and validate a JSON configuration object. Missing fields take
    /// their default values.
    ///
    /// # Errors
    /// `Error::ConfigError` on malformed JSON or an invalid setting
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the stale retry bound. Not validated here; `TableCache::with_config`
    /// raises a zero bound to 1.
    pub fn with_max_stale_retries(mut self, retries: u32) -> Self {
        self.max_stale_retries = retries;
        self
    }

    /// Enable or disable statistics logging on store resets.
    pub fn with_log_stats_on_reset(mut self, enabled: bool) -> Self {
        self.log_stats_on_reset = enabled;
        self
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    /// `Error::ConfigError` if `max_stale_retries` is zero
    pub fn validate(&self) -> Result<()> {
        if self.max_stale_retries == 0 {
            return Err(Error::ConfigError(
                "max_stale_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
