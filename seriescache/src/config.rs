//! Loader configuration.
//!
//! Three zone factors scale a query window outward. Each one answers a
//! different question:
//!
//! - **buffer**: how much slack around the visible window must already be
//!   cached for a query to count as satisfied
//! - **load**: how far beyond the visible window a fetch reaches, so one
//!   round-trip serves several frames of scrolling
//! - **cache**: how much history is retained around the visible window
//!   before older chunks are trimmed
//!
//! They must satisfy `buffer <= load <= cache`.
//!
//! # INI format
//!
//! ```ini
//! [loader]
//! buffer_zone_factor = 0.5
//! load_zone_factor = 1.5
//! cache_zone_factor = 4.0
//! chunk_policy = checked
//! ```

use std::path::Path;

use ini::Ini;
use thiserror::Error;

use crate::cache::ChunkPolicy;

// ==================== Zone Defaults ====================

/// Default buffer zone factor.
pub const DEFAULT_BUFFER_ZONE_FACTOR: f64 = 0.5;

/// Default load zone factor (3× the buffer zone).
pub const DEFAULT_LOAD_ZONE_FACTOR: f64 = 1.5;

/// Default cache retention zone factor (8× the buffer zone).
pub const DEFAULT_CACHE_ZONE_FACTOR: f64 = 4.0;

/// INI section holding loader settings.
pub const CONFIG_SECTION: &str = "loader";

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The INI source could not be read or parsed.
    #[error("Failed to read configuration: {0}")]
    Ini(#[from] ini::Error),

    /// A key carried a value that cannot be used.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The combination of settings is inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a [`WindowedLoader`](crate::loader::WindowedLoader).
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Slack around the visible window that must be cached. Default: 0.5.
    pub buffer_zone_factor: f64,

    /// Prefetch reach of a single load. Default: 1.5.
    pub load_zone_factor: f64,

    /// Retention reach before trimming. Default: 4.0.
    pub cache_zone_factor: f64,

    /// Validation applied to fetched chunks. Default: checked.
    pub chunk_policy: ChunkPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            buffer_zone_factor: DEFAULT_BUFFER_ZONE_FACTOR,
            load_zone_factor: DEFAULT_LOAD_ZONE_FACTOR,
            cache_zone_factor: DEFAULT_CACHE_ZONE_FACTOR,
            chunk_policy: ChunkPolicy::Checked,
        }
    }
}

impl LoaderConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer zone factor.
    pub fn with_buffer_zone_factor(mut self, factor: f64) -> Self {
        self.buffer_zone_factor = factor;
        self
    }

    /// Set the load zone factor.
    pub fn with_load_zone_factor(mut self, factor: f64) -> Self {
        self.load_zone_factor = factor;
        self
    }

    /// Set the cache retention zone factor.
    pub fn with_cache_zone_factor(mut self, factor: f64) -> Self {
        self.cache_zone_factor = factor;
        self
    }

    /// Set the chunk validation policy.
    pub fn with_chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = policy;
        self
    }

    /// Check factor ranges and ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factors = [
            ("buffer_zone_factor", self.buffer_zone_factor),
            ("load_zone_factor", self.load_zone_factor),
            ("cache_zone_factor", self.cache_zone_factor),
        ];
        for (key, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "must be a finite, non-negative number".to_string(),
                });
            }
        }

        if self.buffer_zone_factor > self.load_zone_factor {
            return Err(ConfigError::Invalid(format!(
                "buffer_zone_factor ({}) exceeds load_zone_factor ({})",
                self.buffer_zone_factor, self.load_zone_factor
            )));
        }
        if self.load_zone_factor > self.cache_zone_factor {
            return Err(ConfigError::Invalid(format!(
                "load_zone_factor ({}) exceeds cache_zone_factor ({})",
                self.load_zone_factor, self.cache_zone_factor
            )));
        }
        Ok(())
    }

    /// Parse the `[loader]` section of an INI document.
    ///
    /// Missing keys keep their defaults. The result is validated.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(CONFIG_SECTION)) {
            if let Some(value) = section.get("buffer_zone_factor") {
                config.buffer_zone_factor = parse_factor("buffer_zone_factor", value)?;
            }
            if let Some(value) = section.get("load_zone_factor") {
                config.load_zone_factor = parse_factor("load_zone_factor", value)?;
            }
            if let Some(value) = section.get("cache_zone_factor") {
                config.cache_zone_factor = parse_factor("cache_zone_factor", value)?;
            }
            if let Some(value) = section.get("chunk_policy") {
                config.chunk_policy = parse_policy(value)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(source: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(source).map_err(ini::Error::Parse)?;
        Self::from_ini(&ini)
    }

    /// Load configuration from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Render as an INI document that `from_ini_str` reads back.
    pub fn to_ini_string(&self) -> String {
        format!(
            "[{}]\nbuffer_zone_factor = {}\nload_zone_factor = {}\ncache_zone_factor = {}\nchunk_policy = {}\n",
            CONFIG_SECTION,
            self.buffer_zone_factor,
            self.load_zone_factor,
            self.cache_zone_factor,
            self.chunk_policy
        )
    }
}

fn parse_factor(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_policy(value: &str) -> Result<ChunkPolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "checked" => Ok(ChunkPolicy::Checked),
        "unchecked" => Ok(ChunkPolicy::Unchecked),
        _ => Err(ConfigError::InvalidValue {
            key: "chunk_policy".to_string(),
            value: value.to_string(),
            reason: "expected 'checked' or 'unchecked'".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.buffer_zone_factor, DEFAULT_BUFFER_ZONE_FACTOR);
        assert_eq!(config.load_zone_factor, DEFAULT_LOAD_ZONE_FACTOR);
        assert_eq!(config.cache_zone_factor, DEFAULT_CACHE_ZONE_FACTOR);
        assert_eq!(config.chunk_policy, ChunkPolicy::Checked);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn test_default_zone_ordering() {
        assert!(DEFAULT_BUFFER_ZONE_FACTOR < DEFAULT_LOAD_ZONE_FACTOR);
        assert!(DEFAULT_LOAD_ZONE_FACTOR < DEFAULT_CACHE_ZONE_FACTOR);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LoaderConfig::new()
            .with_buffer_zone_factor(1.0)
            .with_load_zone_factor(2.0)
            .with_cache_zone_factor(10.0)
            .with_chunk_policy(ChunkPolicy::Unchecked);

        assert_eq!(config.buffer_zone_factor, 1.0);
        assert_eq!(config.load_zone_factor, 2.0);
        assert_eq!(config.cache_zone_factor, 10.0);
        assert_eq!(config.chunk_policy, ChunkPolicy::Unchecked);
    }

    #[test]
    fn test_validate_rejects_misordered_zones() {
        let config = LoaderConfig::new().with_buffer_zone_factor(2.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LoaderConfig::new().with_cache_zone_factor(1.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        let config = LoaderConfig::new().with_buffer_zone_factor(-0.1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config = LoaderConfig::new().with_load_zone_factor(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_ini_str_partial() {
        let config = LoaderConfig::from_ini_str("[loader]\nload_zone_factor = 2.5\n").unwrap();
        assert_eq!(config.load_zone_factor, 2.5);
        assert_eq!(config.buffer_zone_factor, DEFAULT_BUFFER_ZONE_FACTOR);
    }

    #[test]
    fn test_from_ini_str_without_section_uses_defaults() {
        let config = LoaderConfig::from_ini_str("[other]\nkey = value\n").unwrap();
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn test_from_ini_str_rejects_bad_values() {
        let err = LoaderConfig::from_ini_str("[loader]\nbuffer_zone_factor = wide\n").unwrap_err();
        assert!(err.to_string().contains("buffer_zone_factor"));

        let err = LoaderConfig::from_ini_str("[loader]\nchunk_policy = loose\n").unwrap_err();
        assert!(err.to_string().contains("chunk_policy"));
    }

    #[test]
    fn test_ini_round_trip_through_file() {
        let config = LoaderConfig::new()
            .with_load_zone_factor(2.0)
            .with_chunk_policy(ChunkPolicy::Unchecked);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_ini_string().as_bytes()).unwrap();

        let loaded = LoaderConfig::from_ini_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_ini_error() {
        let err = LoaderConfig::from_ini_file("/nonexistent/seriescache.ini").unwrap_err();
        assert!(matches!(err, ConfigError::Ini(_)));
    }
}
