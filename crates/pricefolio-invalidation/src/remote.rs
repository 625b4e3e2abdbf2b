//! Server-side (remote cache) purging.
//!
//! The remote cache is a shared Redis keyed by canonical (global) asset
//! ids, with every key under the `pricefolio:` namespace. It is a pure
//! optimization layer: purging it is best-effort, time-bounded, and a
//! failure is logged and dropped — it never fails the enclosing
//! invalidation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use pricefolio_core::{
    AliasSet, InvalidationError, KeyPattern, Result, all_artifact_kinds, patterns_for,
};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

/// Namespace prefix for every remote cache key this subsystem owns.
pub const REMOTE_KEY_NAMESPACE: &str = "pricefolio:";

/// Purge command payload sent to the remote cache: either an explicit id
/// list (the store expands each id to its key variants) or a wildcard
/// pattern for the nuclear sweep.
///
/// Serializes as `{"ids": [...]}` or `{"pattern": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PurgeRequest {
    Ids { ids: Vec<String> },
    Pattern { pattern: String },
}

/// Remote cache store consumed by [`ServerCacheInvalidator`].
///
/// Failures surface as ordinary errors; the invalidator catches them.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn purge(&self, request: PurgeRequest) -> Result<()>;
}

/// Redis-backed remote store.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Expand ids to every per-identity key variant in the registry,
    /// namespaced for the remote cache. Aggregate namespaces are not keyed
    /// by id and are only reachable through a pattern purge.
    fn expand_keys(ids: &[String]) -> Vec<String> {
        let mut keys = Vec::new();
        for id in ids {
            for kind in all_artifact_kinds() {
                for pattern in patterns_for(*kind) {
                    if let KeyPattern::Template { render, .. } = pattern {
                        keys.push(format!("{REMOTE_KEY_NAMESPACE}{}", render(id)));
                    }
                }
            }
        }
        keys
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn purge(&self, request: PurgeRequest) -> Result<()> {
        let mut conn = self.pool.get().await.map_err(|e| {
            InvalidationError::remote_store(format!("failed to get Redis connection: {e}"))
        })?;

        match request {
            PurgeRequest::Ids { ids } => {
                let keys = Self::expand_keys(&ids);
                if keys.is_empty() {
                    return Ok(());
                }
                let count = keys.len();
                conn.del::<_, ()>(keys)
                    .await
                    .map_err(|e| InvalidationError::remote_store(format!("Redis DEL error: {e}")))?;
                tracing::debug!(ids = ids.len(), keys = count, "remote keys purged");
            }
            PurgeRequest::Pattern { pattern } => {
                let mut keys = Vec::new();
                {
                    let mut iter =
                        conn.scan_match::<_, String>(&pattern).await.map_err(|e| {
                            InvalidationError::remote_store(format!("Redis SCAN error: {e}"))
                        })?;
                    while let Some(key) = iter.next_item().await {
                        keys.push(key);
                    }
                }
                if !keys.is_empty() {
                    let count = keys.len();
                    conn.del::<_, ()>(keys).await.map_err(|e| {
                        InvalidationError::remote_store(format!("Redis DEL error: {e}"))
                    })?;
                    tracing::debug!(pattern = %pattern, keys = count, "remote namespace purged");
                }
            }
        }
        Ok(())
    }
}

/// Remote store used when Redis is disabled or unreachable: every purge is
/// a logged no-op, which keeps single-instance deployments working with the
/// local query cache alone.
pub struct NoOpRemoteStore;

#[async_trait]
impl RemoteStore for NoOpRemoteStore {
    async fn purge(&self, _request: PurgeRequest) -> Result<()> {
        tracing::trace!("remote purge skipped (no-op store)");
        Ok(())
    }
}

/// Issues best-effort purge commands against the remote store.
///
/// Never errors to the caller: transport failures, remote errors, and
/// timeouts are logged at `warn` and discarded.
pub struct ServerCacheInvalidator {
    store: Arc<dyn RemoteStore>,
    purge_timeout: Duration,
}

impl ServerCacheInvalidator {
    pub fn new(store: Arc<dyn RemoteStore>, purge_timeout: Duration) -> Self {
        Self {
            store,
            purge_timeout,
        }
    }

    /// Purge the given (server-preferred) aliases. One command carries the
    /// whole id list; the store expands its own key variants.
    pub async fn purge(&self, aliases: &AliasSet) {
        if aliases.is_empty() {
            return;
        }
        self.dispatch(PurgeRequest::Ids {
            ids: aliases.to_vec(),
        })
        .await;
    }

    /// Wildcard purge of the entire pricing namespace.
    pub async fn purge_all(&self) {
        self.dispatch(PurgeRequest::Pattern {
            pattern: format!("{REMOTE_KEY_NAMESPACE}*"),
        })
        .await;
    }

    async fn dispatch(&self, request: PurgeRequest) {
        match tokio::time::timeout(self.purge_timeout, self.store.purge(request)).await {
            Ok(Ok(())) => {
                metrics::counter!("pricefolio_remote_purges_total").increment(1);
            }
            Ok(Err(e)) => {
                metrics::counter!("pricefolio_remote_purge_failures_total").increment(1);
                tracing::warn!(error = %e, "remote purge failed, continuing without it");
            }
            Err(_) => {
                let err = InvalidationError::RemoteTimeout {
                    timeout_ms: self.purge_timeout.as_millis() as u64,
                };
                metrics::counter!("pricefolio_remote_purge_failures_total").increment(1);
                tracing::warn!(error = %err, "remote purge timed out, continuing without it");
            }
        }
    }
}
