//! Configuration for the invalidation subsystem.
//!
//! Follows the field-default pattern: every field has a serde default so a
//! partial (or empty) config file deserializes to something runnable, and
//! `validate()` rejects values that would misbehave at runtime.

use serde::{Deserialize, Serialize};

/// Top-level invalidation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationConfig {
    /// Remote (Redis) cache configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Upper bound for one remote purge call in milliseconds. Purges that
    /// exceed it are abandoned and logged; the caller is never blocked
    /// longer than this on the server-side leg.
    #[serde(default = "default_purge_timeout_ms")]
    pub purge_timeout_ms: u64,
}

impl InvalidationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.purge_timeout_ms == 0 {
            return Err("purge_timeout_ms must be > 0".into());
        }
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.url must be set when redis.enabled is true".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        Ok(())
    }
}

/// Remote cache (Redis) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the remote purge leg (gracefully degrades without it)
    /// Default: false (single-instance deployments)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    8
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

fn default_purge_timeout_ms() -> u64 {
    1500
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            purge_timeout_ms: default_purge_timeout_ms(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_from_empty_config() {
        let config: InvalidationConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.redis.enabled);
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.purge_timeout_ms, 1500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_purge_timeout() {
        let config = InvalidationConfig {
            purge_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("purge_timeout_ms"));
    }

    #[test]
    fn test_validate_checks_redis_only_when_enabled() {
        let mut config = InvalidationConfig::default();
        config.redis.url = String::new();
        assert!(config.validate().is_ok());

        config.redis.enabled = true;
        assert!(config.validate().unwrap_err().contains("redis.url"));

        config.redis.url = "redis://cache:6379".into();
        config.redis.pool_size = 0;
        assert!(config.validate().unwrap_err().contains("redis.pool_size"));
    }
}
