//! Engine configuration, optionally loaded from a TOML file.
//!
//! A missing file yields `EngineConfig::default()`. All fields use
//! `#[serde(default)]` so any subset of keys can be specified; the HTTP
//! resolver's knobs live in a nested `[resolver]` table.
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Tuning for the aggregation and batching stages.
///
/// The defaults reproduce the unbounded, tick-batched behavior of the
/// engine's reference semantics; the limits exist for deployments that
/// need to cap fan-out against slow or hostile feeds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum feeds expanded concurrently. 0 = unlimited.
    pub feed_concurrency: usize,

    /// Maximum item resolutions in flight per feed. 0 = unlimited.
    pub item_concurrency: usize,

    /// How long a batch stays open after its first arrival, in
    /// milliseconds. 0 = close as soon as the stream goes idle within the
    /// current scheduling turn.
    pub batch_window_ms: u64,

    /// Capacity of the batch queue between the controller and the state
    /// store.
    pub batch_queue: usize,

    /// HTTP resolver settings.
    pub resolver: ResolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feed_concurrency: 0,
            item_concurrency: 0,
            batch_window_ms: 0,
            batch_queue: 32,
            resolver: ResolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    pub(crate) fn feed_limit(&self) -> Option<usize> {
        (self.feed_concurrency > 0).then_some(self.feed_concurrency)
    }

    pub(crate) fn item_limit(&self) -> Option<usize> {
        (self.item_concurrency > 0).then_some(self.item_concurrency)
    }

    pub(crate) fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(EngineConfig::default())`
    /// - Empty file → `Ok(EngineConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a corrupted or runaway file
        // cannot exhaust memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read.
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: EngineConfig = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Settings for [`crate::resolve::HttpResolver`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum response body size in bytes.
    pub max_body_bytes: usize,

    /// Number of descriptions kept in the LRU cache.
    pub cache_entries: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("tributary/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            max_body_bytes: 10 * 1024 * 1024,
            cache_entries: 1024,
        }
    }
}

impl ResolverConfig {
    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.feed_concurrency, 0);
        assert_eq!(config.item_concurrency, 0);
        assert_eq!(config.batch_window_ms, 0);
        assert_eq!(config.batch_queue, 32);
        assert_eq!(config.resolver.timeout_secs, 30);
        assert!(config.feed_limit().is_none());
        assert!(config.item_limit().is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/tributary_test_nonexistent_config.toml");
        let config = EngineConfig::load(path).unwrap();
        assert_eq!(config.batch_queue, 32);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("tributary_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.batch_window_ms, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("tributary_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "feed_concurrency = 8\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.feed_concurrency, 8);
        assert_eq!(config.feed_limit(), Some(8));
        assert_eq!(config.batch_queue, 32); // default
        assert_eq!(config.resolver.timeout_secs, 30); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("tributary_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
feed_concurrency = 4
item_concurrency = 16
batch_window_ms = 25
batch_queue = 8

[resolver]
user_agent = "custom-agent/1.0"
timeout_secs = 10
max_body_bytes = 65536
cache_entries = 64
"#;
        std::fs::write(&path, content).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.feed_concurrency, 4);
        assert_eq!(config.item_concurrency, 16);
        assert_eq!(config.batch_window_ms, 25);
        assert_eq!(config.batch_queue, 8);
        assert_eq!(config.resolver.user_agent, "custom-agent/1.0");
        assert_eq!(config.resolver.timeout_secs, 10);
        assert_eq!(config.resolver.max_body_bytes, 65536);
        assert_eq!(config.resolver.cache_entries, 64);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("tributary_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = EngineConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("tributary_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        // feed_concurrency should be an integer, not a string
        std::fs::write(&path, "feed_concurrency = \"lots\"\n").unwrap();

        let result = EngineConfig::load(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("tributary_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = EngineConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::TooLarge(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
