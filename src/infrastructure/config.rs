//! Configuration infrastructure
//!
//! `AppConfig` is assembled from built-in defaults, an optional TOML file and
//! `MARKETPLACE_SCOUT__*` environment variables, in that order of precedence.
//! Nested keys use `__` as separator, e.g.
//! `MARKETPLACE_SCOUT__ORCHESTRATOR__WORKER_POOL_SIZE=4`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::Platform;

pub const ENV_PREFIX: &str = "MARKETPLACE_SCOUT";

/// Default values, kept in one place so docs and tests can refer to them
pub mod defaults {
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const DEFAULT_LIMIT: u32 = 40;
    pub const MIN_INTERVAL_MS: u64 = 1_000;
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 10_000;
    pub const BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const JITTER_MS: u64 = 250;
    pub const WORKER_POOL_SIZE: usize = 8;
    pub const SEARCH_DEADLINE_MS: u64 = 60_000;
    pub const PROGRESS_BUFFER: usize = 64;
    pub const MAX_RETAINED_SEARCHES: usize = 256;
    pub const LOG_LEVEL: &str = "info";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

/// Network settings shared by the live source adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub request_timeout_secs: u64,
    /// Rotated per request; empty falls back to the built-in list
    pub user_agents: Vec<String>,
    pub default_limit: u32,
    /// Base URL overrides keyed by platform name
    pub base_urls: HashMap<String, String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            user_agents: Vec::new(),
            default_limit: defaults::DEFAULT_LIMIT,
            base_urls: HashMap::new(),
        }
    }
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn base_url_override(&self, platform: Platform) -> Option<&str> {
        self.base_urls.get(platform.as_str()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between requests to one platform; 0 disables limiting
    pub min_interval_ms: u64,
    /// Per-platform overrides keyed by platform name
    pub per_platform_ms: HashMap<String, u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: defaults::MIN_INTERVAL_MS,
            per_platform_ms: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn interval_for(&self, platform: Platform) -> Duration {
        let ms = self
            .per_platform_ms
            .get(platform.as_str())
            .copied()
            .unwrap_or(self.min_interval_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::BASE_DELAY_MS,
            max_delay_ms: defaults::MAX_DELAY_MS,
            backoff_multiplier: defaults::BACKOFF_MULTIPLIER,
            jitter_ms: defaults::JITTER_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Platform tasks allowed to run at once across all searches
    pub worker_pool_size: usize,
    pub search_deadline_ms: u64,
    /// Broadcast capacity per search
    pub progress_buffer: usize,
    /// Finished searches kept for polling; the oldest are evicted first
    pub max_retained_searches: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: defaults::WORKER_POOL_SIZE,
            search_deadline_ms: defaults::SEARCH_DEADLINE_MS,
            progress_buffer: defaults::PROGRESS_BUFFER,
            max_retained_searches: defaults::MAX_RETAINED_SEARCHES,
        }
    }
}

impl OrchestratorConfig {
    pub fn search_deadline(&self) -> Duration {
        Duration::from_millis(self.search_deadline_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Defaults to `<data dir>/marketplace-scout/logs`
    pub log_dir: Option<PathBuf>,
    /// Extra `target=level` directives
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!(
            "Configuration loaded (source: {})",
            path.map_or_else(|| "defaults + environment".to_string(), |p| p.display().to_string())
        );
        Ok(config)
    }

    /// `~/.config/marketplace-scout/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("marketplace-scout").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.worker_pool_size == 0 {
            return Err(ConfigError::invalid("orchestrator.worker_pool_size must be greater than 0"));
        }
        if self.orchestrator.search_deadline_ms == 0 {
            return Err(ConfigError::invalid("orchestrator.search_deadline_ms must be greater than 0"));
        }
        if self.orchestrator.progress_buffer == 0 {
            return Err(ConfigError::invalid("orchestrator.progress_buffer must be greater than 0"));
        }
        if self.orchestrator.max_retained_searches == 0 {
            return Err(ConfigError::invalid("orchestrator.max_retained_searches must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts must be greater than 0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid("retry.base_delay_ms cannot be greater than retry.max_delay_ms"));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            return Err(ConfigError::invalid("retry.backoff_multiplier must be at least 1.0"));
        }
        if self.scraper.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("scraper.request_timeout_secs must be greater than 0"));
        }
        for name in self.rate_limit.per_platform_ms.keys().chain(self.scraper.base_urls.keys()) {
            name.parse::<Platform>()
                .map_err(|_| ConfigError::invalid(format!("unknown platform '{name}' in configuration")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.worker_pool_size, 8);
        assert_eq!(config.orchestrator.search_deadline(), Duration::from_secs(60));
        assert_eq!(config.rate_limit.interval_for(Platform::Shopee), Duration::from_secs(1));
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[orchestrator]
worker_pool_size = 2

[rate_limit]
min_interval_ms = 500

[rate_limit.per_platform_ms]
tokopedia = 2000
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.orchestrator.worker_pool_size, 2);
        assert_eq!(config.orchestrator.progress_buffer, defaults::PROGRESS_BUFFER);
        assert_eq!(config.orchestrator.max_retained_searches, defaults::MAX_RETAINED_SEARCHES);
        assert_eq!(config.rate_limit.interval_for(Platform::Lazada), Duration::from_millis(500));
        assert_eq!(config.rate_limit.interval_for(Platform::Tokopedia), Duration::from_secs(2));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load { .. })));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.orchestrator.worker_pool_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));

        let mut config = AppConfig::default();
        config.retry.base_delay_ms = 20_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orchestrator.max_retained_searches = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rate_limit.per_platform_ms.insert("amazon".into(), 10);
        assert!(config.validate().is_err());
    }
}
