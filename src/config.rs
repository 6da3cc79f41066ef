use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use crate::error::{Result, SegtransError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateConfig,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// LibreTranslate-compatible endpoint URL
    pub endpoint: String,
    /// Timeout for a single-text remote call
    pub request_timeout_secs: u64,
    /// Extra timeout budget per segment in a delimiter batch
    pub per_segment_timeout_secs: u64,
    /// Timeout for the startup availability probe
    pub health_timeout_secs: u64,
    /// Upper bound on in-flight remote calls when translating individually
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of resident translations
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before the breaker opens
    pub failure_threshold: u32,
    /// Cooldown before a trial call is let through
    pub recovery_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per HTTP request, including the first
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
            per_segment_timeout_secs: 2,
            health_timeout_secs: 5,
            max_concurrent_requests: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
        }
    }
}

impl TranslateConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn per_segment_timeout(&self) -> Duration {
        Duration::from_secs(self.per_segment_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SegtransError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SegtransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SegtransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings that would make the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.translate.endpoint.trim().is_empty() {
            return Err(SegtransError::Config("translate.endpoint must not be empty".to_string()));
        }
        if self.cache.capacity == 0 {
            return Err(SegtransError::Config("cache.capacity must be at least 1".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(SegtransError::Config(
                "circuit_breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SegtransError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.translate.max_concurrent_requests == 0 {
            return Err(SegtransError::Config(
                "translate.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
