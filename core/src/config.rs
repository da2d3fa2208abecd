//! Job and hub configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-job execution configuration
///
/// Controls how many items may be in flight at once and how long a single
/// task invocation is allowed to take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum number of items concurrently in flight
    pub concurrency: usize,

    /// Per-item timeout for the task invocation
    pub item_timeout: Duration,

    /// Free-form tags recorded on the job result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            item_timeout: Duration::from_secs(60),
            tags: Vec::new(),
        }
    }
}

impl JobConfig {
    /// Create a new config with the given concurrency
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    /// Set the per-item timeout
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Set the result tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "concurrency must be at least 1".into(),
            ));
        }

        if self.item_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "item timeout must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Broadcast hub configuration
///
/// Bounds the connection registry and tunes the health sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Maximum number of attached connections; `attach` fails past this
    pub max_connections: usize,

    /// Consecutive send failures after which a connection is evicted
    pub error_ceiling: u32,

    /// Evict connections silent for longer than this
    pub idle_timeout: Duration,

    /// Evict connections that never sent a liveness signal within this window
    pub max_age: Duration,

    /// Interval between periodic health sweeps
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            error_ceiling: 5,
            idle_timeout: Duration::from_secs(300),
            max_age: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    /// Set the maximum connection count
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the consecutive-error ceiling
    pub fn with_error_ceiling(mut self, ceiling: u32) -> Self {
        self.error_ceiling = ceiling;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the no-liveness window
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidCapacity(
                "max_connections must be at least 1".into(),
            ));
        }

        if self.error_ceiling == 0 {
            return Err(ConfigError::InvalidCeiling(
                "error_ceiling must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid concurrency value
    #[error("invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// Invalid connection capacity
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    /// Invalid error ceiling
    #[error("invalid error ceiling: {0}")]
    InvalidCeiling(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_job_config() {
        let config = JobConfig::default();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.item_timeout, Duration::from_secs(60));
        assert!(config.tags.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_job_config_builder_pattern() {
        let config = JobConfig::new(8)
            .with_item_timeout(Duration::from_secs(5))
            .with_tags(vec!["nightly".to_string()]);

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.item_timeout, Duration::from_secs(5));
        assert_eq!(config.tags, vec!["nightly".to_string()]);
    }

    #[test]
    fn test_job_config_zero_concurrency() {
        let config = JobConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_job_config_zero_timeout() {
        let config = JobConfig::new(1).with_item_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_hub_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1024);
        assert_eq!(config.error_ceiling, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hub_config_zero_capacity() {
        let config = HubConfig::default().with_max_connections(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hub_config_zero_ceiling() {
        let config = HubConfig::default().with_error_ceiling(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_job_config_serialization() {
        let config = JobConfig::new(4).with_tags(vec!["smoke".to_string()]);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: JobConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.concurrency, 4);
        assert_eq!(deserialized.tags, vec!["smoke".to_string()]);
    }
}
