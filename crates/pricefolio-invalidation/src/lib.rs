//! Multi-layer cache invalidation for Pricefolio pricing analytics.
//!
//! ## Architecture
//!
//! Pricing analytics (market snapshots, trend series, sale comparables) are
//! cached in two independently-failing layers and under every identifier
//! alias an asset is known by:
//!
//! ```text
//! caller → InvalidationOrchestrator
//!             → resolve_aliases ──→ AliasSet
//!             → ClientCacheInvalidator ──→ local query cache (exact keys + namespace sweeps)
//!             → ServerCacheInvalidator ──→ remote Redis (best-effort purge)
//! ```
//!
//! Both legs run concurrently and are joined; the remote leg can never fail
//! an operation.
//!
//! ## Graceful Degradation
//!
//! If Redis is disabled or unreachable, [`create_remote_store`] falls back
//! to a no-op store and the subsystem runs against the local query cache
//! alone.

pub mod client;
pub mod config;
pub mod orchestrator;
pub mod query_cache;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

pub use client::ClientCacheInvalidator;
pub use config::{InvalidationConfig, RedisConfig};
pub use orchestrator::InvalidationOrchestrator;
pub use query_cache::{Fetcher, LocalQueryCache, QueryCache, QueryCacheStats};
pub use remote::{
    NoOpRemoteStore, PurgeRequest, REMOTE_KEY_NAMESPACE, RedisStore, RemoteStore,
    ServerCacheInvalidator,
};

/// Pool settings for the given Redis configuration.
///
/// `Config::from_url` leaves `pool` unset, so the size and timeout knobs
/// must be built explicitly or they are ignored and a connection attempt
/// against an unresponsive Redis can wait unboundedly.
fn pool_settings(config: &RedisConfig) -> deadpool_redis::Config {
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);
    redis_config.pool = Some(pool_config);
    redis_config
}

/// Create a remote store based on configuration.
///
/// - **Redis disabled**: returns the no-op store
/// - **Redis enabled**: connects a pool, falls back to the no-op store if
///   the pool cannot be created or a connection cannot be established
pub async fn create_remote_store(config: &RedisConfig) -> Arc<dyn RemoteStore> {
    if !config.enabled {
        tracing::info!("Redis disabled, remote purges are no-ops");
        return Arc::new(NoOpRemoteStore);
    }

    tracing::info!(url = %config.url, "Connecting to Redis for remote purges");

    let pool = match pool_settings(config).create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Remote purges will be no-ops."
            );
            return Arc::new(NoOpRemoteStore);
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Redis connected, remote purges enabled");
            Arc::new(RedisStore::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Remote purges will be no-ops."
            );
            Arc::new(NoOpRemoteStore)
        }
    }
}
