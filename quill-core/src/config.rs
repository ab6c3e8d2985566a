//! Configuration management for Quill
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (QUILL_*)
//! 3. Config file (~/.config/quill/config.toml)
//! 4. Default values
//!
//! Secrets (GitHub token, oracle API key) are read from the environment only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Smallest message limit that still fits part headers and the truncation notice
pub const MIN_PLATFORM_MESSAGE_LIMIT: usize = 512;

/// Size thresholds and fan-out for the analysis pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Estimated payload size (bytes) above which the chunked path is used directly
    pub max_monolithic_size: usize,

    /// Number of file units analyzed concurrently in one batch
    pub concurrent_unit_reviews: usize,

    /// Whether a previously published review is superseded instead of left alone
    pub update_existing_results: bool,

    /// Fraction of attempted units that may be skipped while still approving
    pub skip_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_monolithic_size: 500 * 1024,
            concurrent_unit_reviews: 3,
            update_existing_results: true,
            skip_tolerance: 0.1,
        }
    }
}

/// Admission gate settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum accepted notifications per tenant per window
    pub rate_limit_per_window: u64,

    /// Length of one fixed rate window
    #[serde(with = "humantime_serde")]
    pub window_size: Duration,

    /// How long a seen event id is remembered
    #[serde(with = "humantime_serde")]
    pub dedup_ttl: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_window: 10,
            window_size: Duration::from_secs(60),
            dedup_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// Output formatter bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Maximum number of continuation messages after the primary one
    pub max_continuation_messages: usize,

    /// Hard per-message character limit of the publishing platform
    pub platform_message_limit: usize,

    /// Characters reserved in each chunk for part headers and notices
    pub continuation_buffer: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_continuation_messages: 5,
            platform_message_limit: 65_536,
            continuation_buffer: 200,
        }
    }
}

/// Backoff policy shared by unit-level and pipeline-level retries
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Idempotency cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a completed review is reused for the same revision
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Text-generation oracle client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Messages API endpoint
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Maximum tokens requested per response
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Consecutive transient failures before the circuit opens
    pub breaker_threshold: u32,

    /// How long an open circuit rejects calls before probing again
    #[serde(with = "humantime_serde")]
    pub breaker_cooldown: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(60),
        }
    }
}

/// Local database settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file, defaults to `~/.cache/quill/quill.db`
    pub path: Option<PathBuf>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub admission: AdmissionConfig,
    pub output: OutputConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub oracle: OracleConfig,
    pub database: DatabaseSettings,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/quill/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quill").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - QUILL_MODEL: Oracle model
    /// - QUILL_ORACLE_ENDPOINT: Oracle endpoint
    /// - QUILL_CONCURRENCY: Units analyzed per batch
    /// - QUILL_UPDATE_EXISTING: `true`/`false`
    /// - QUILL_DB_PATH: Database file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("QUILL_MODEL") {
            self.oracle.model = model;
        }

        if let Ok(endpoint) = std::env::var("QUILL_ORACLE_ENDPOINT") {
            self.oracle.endpoint = endpoint;
        }

        if let Some(n) = std::env::var("QUILL_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.pipeline.concurrent_unit_reviews = n;
        }

        if let Some(flag) = std::env::var("QUILL_UPDATE_EXISTING")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.pipeline.update_existing_results = flag;
        }

        if let Ok(path) = std::env::var("QUILL_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, model: Option<String>, concurrency: Option<usize>) -> Self {
        if let Some(m) = model {
            self.oracle.model = m;
        }

        if let Some(n) = concurrency {
            self.pipeline.concurrent_unit_reviews = n;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(model: Option<String>, concurrency: Option<usize>) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()
            .with_cli_overrides(model, concurrency);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.concurrent_unit_reviews == 0 {
            return Err(Error::Config(
                "pipeline.concurrent_unit_reviews must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.pipeline.skip_tolerance) {
            return Err(Error::Config(
                "pipeline.skip_tolerance must be between 0 and 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.admission.window_size.is_zero() {
            return Err(Error::Config(
                "admission.window_size must be non-zero".to_string(),
            ));
        }

        if self.output.platform_message_limit < MIN_PLATFORM_MESSAGE_LIMIT {
            return Err(Error::Config(format!(
                "output.platform_message_limit must be at least {}",
                MIN_PLATFORM_MESSAGE_LIMIT
            )));
        }

        // Chunks must keep room for content after the reserved buffer
        if self.output.continuation_buffer * 2 >= self.output.platform_message_limit {
            return Err(Error::Config(format!(
                "output.continuation_buffer ({}) leaves no room within platform_message_limit ({})",
                self.output.continuation_buffer, self.output.platform_message_limit
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.concurrent_unit_reviews, 3);
        assert!(config.pipeline.update_existing_results);
        assert_eq!(config.output.platform_message_limit, 65_536);
        assert_eq!(config.output.max_continuation_messages, 5);
        assert_eq!(config.output.continuation_buffer, 200);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(Some("opus".to_string()), Some(5));

        assert_eq!(config.oracle.model, "opus");
        assert_eq!(config.pipeline.concurrent_unit_reviews, 5);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[pipeline]
max_monolithic_size = 1024
concurrent_unit_reviews = 4
update_existing_results = false

[admission]
rate_limit_per_window = 60
window_size = "2m"

[retry]
base_delay = "500ms"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.pipeline.max_monolithic_size, 1024);
        assert_eq!(config.pipeline.concurrent_unit_reviews, 4);
        assert!(!config.pipeline.update_existing_results);
        assert_eq!(config.admission.rate_limit_per_window, 60);
        assert_eq!(config.admission.window_size, Duration::from_secs(120));
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        // untouched fields keep defaults
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.output.platform_message_limit, 65_536);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.concurrent_unit_reviews = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_buffer() {
        let mut config = Config::default();
        config.output.platform_message_limit = 1000;
        config.output.continuation_buffer = 600;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_message_limit() {
        let mut config = Config::default();
        config.output.platform_message_limit = 100;
        config.output.continuation_buffer = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("platform_message_limit"));
    }
}
