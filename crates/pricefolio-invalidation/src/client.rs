//! Client-side invalidation fan-out.
//!
//! For one alias set, the full set of affected cache keys is the cross
//! product of the per-identity key templates and the aliases, plus one
//! namespace sweep per aggregate pattern. All resulting operations are
//! issued concurrently and joined; the call returns once every one has
//! settled. Total latency is bounded by the slowest single operation, not
//! by the product size.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, try_join_all};
use pricefolio_core::{AliasSet, ArtifactKind, KeyPattern, Result, all_artifact_kinds, patterns_for};

use crate::query_cache::QueryCache;

/// Invalidates matching entries in the local query cache.
///
/// Always succeeds against a healthy backend; an error here means the key
/// registry or the backend wiring is broken, and it propagates.
pub struct ClientCacheInvalidator {
    cache: Arc<dyn QueryCache>,
}

impl ClientCacheInvalidator {
    pub fn new(cache: Arc<dyn QueryCache>) -> Self {
        Self { cache }
    }

    /// Invalidate every artifact for every alias in `aliases`.
    ///
    /// Per-identity artifacts are invalidated key by key; aggregate
    /// artifacts get exactly one namespace sweep per pattern regardless of
    /// how many aliases triggered the call. With `refetch_active`, each
    /// per-identity key is additionally re-fetched synchronously if an
    /// active view subscribes to it (aggregates are never force-fetched).
    pub async fn invalidate(&self, aliases: &AliasSet, refetch_active: bool) -> Result<()> {
        if aliases.is_empty() {
            return Ok(());
        }

        let mut ops: Vec<BoxFuture<'_, Result<()>>> = Vec::new();
        let mut key_count = 0u64;
        for kind in all_artifact_kinds() {
            for pattern in patterns_for(*kind) {
                match pattern {
                    KeyPattern::Template { render, .. } => {
                        for alias in aliases.iter() {
                            let key = render(alias);
                            key_count += 1;
                            let cache = &self.cache;
                            ops.push(
                                async move {
                                    cache.invalidate_key(&key).await?;
                                    if refetch_active {
                                        cache.refetch_key(&key).await?;
                                    }
                                    Ok(())
                                }
                                .boxed(),
                            );
                        }
                    }
                    KeyPattern::Namespace { prefix } => {
                        let cache = &self.cache;
                        ops.push(async move { cache.invalidate_prefix(prefix).await }.boxed());
                    }
                }
            }
        }

        let op_count = ops.len();
        try_join_all(ops).await?;

        metrics::counter!("pricefolio_invalidated_keys_total").increment(key_count);
        tracing::debug!(
            aliases = aliases.len(),
            ops = op_count,
            refetch_active,
            "client cache invalidation complete"
        );
        Ok(())
    }

    /// Sweep every namespace a single artifact kind is cached under.
    pub async fn invalidate_kind(&self, kind: ArtifactKind) -> Result<()> {
        let ops = patterns_for(kind)
            .iter()
            .map(|pattern| self.cache.invalidate_prefix(pattern.prefix()));
        try_join_all(ops).await?;
        tracing::debug!(kind = %kind, "artifact namespace invalidated");
        Ok(())
    }

    /// Sweep every registered artifact namespace, alias-independent.
    pub async fn invalidate_all(&self) -> Result<()> {
        let ops = all_artifact_kinds()
            .iter()
            .flat_map(|kind| patterns_for(*kind))
            .map(|pattern| self.cache.invalidate_prefix(pattern.prefix()));
        try_join_all(ops).await?;
        tracing::debug!("all artifact namespaces invalidated");
        Ok(())
    }
}
