//! Scenario-level composition of the client and server invalidators.
//!
//! Every public operation is a stateless, idempotent sweep: resolve the
//! input to an alias set, run the client-side fan-out and the server-side
//! purge concurrently, join. Re-running an operation with the same or
//! overlapping aliases re-clears already-clear entries and nothing else.
//!
//! The scenarios differ only in whether they force a synchronous re-fetch
//! of actively viewed entries and whether they explicitly touch the
//! aggregate listing cache:
//!
//! | Operation | Forced refetch | Listing sweep |
//! |-----------|----------------|---------------|
//! | `invalidate_one` / `invalidate_many` | no | via aggregate patterns |
//! | `after_manual_refresh` | yes (per-identity only) | via aggregate patterns |
//! | `after_background_update` | no | via aggregate patterns |
//! | `after_asset_addition` | no | plus an explicit sweep |
//! | `invalidate_all` | no | everything, alias-independent |

use std::sync::Arc;
use std::time::Duration;

use pricefolio_core::{ArtifactKind, AssetRef, Result, resolve_aliases, resolve_server_aliases};

use crate::client::ClientCacheInvalidator;
use crate::config::InvalidationConfig;
use crate::query_cache::QueryCache;
use crate::remote::{RemoteStore, ServerCacheInvalidator};

/// Public entry point for cache invalidation.
///
/// The server-side leg is best-effort: its failures are logged inside
/// [`ServerCacheInvalidator`] and never affect the returned result.
pub struct InvalidationOrchestrator {
    client: ClientCacheInvalidator,
    server: ServerCacheInvalidator,
}

impl InvalidationOrchestrator {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        store: Arc<dyn RemoteStore>,
        config: &InvalidationConfig,
    ) -> Self {
        Self {
            client: ClientCacheInvalidator::new(cache),
            server: ServerCacheInvalidator::new(
                store,
                Duration::from_millis(config.purge_timeout_ms),
            ),
        }
    }

    /// Invalidate every cached artifact of one asset, under all its aliases.
    pub async fn invalidate_one(&self, asset: impl Into<AssetRef>) -> Result<()> {
        self.sweep(&[asset.into()], false).await
    }

    /// Invalidate every cached artifact of a batch of assets.
    pub async fn invalidate_many(&self, assets: &[AssetRef]) -> Result<()> {
        self.sweep(assets, false).await
    }

    /// Nuclear option: sweep every registered artifact namespace and purge
    /// the whole remote pricing namespace. For broad correctness resets,
    /// not routine use.
    pub async fn invalidate_all(&self) -> Result<()> {
        let (client_result, ()) = tokio::join!(self.client.invalidate_all(), self.server.purge_all());
        client_result
    }

    /// The user just asked for fresh data on one screen: invalidate and
    /// synchronously re-fetch the asset's per-identity artifacts wherever a
    /// view is actively subscribed.
    pub async fn after_manual_refresh(&self, asset: impl Into<AssetRef>) -> Result<()> {
        self.sweep(&[asset.into()], true).await
    }

    /// Many assets updated off-screen: invalidate without forced re-fetch
    /// and let consumers refresh lazily on their next view.
    pub async fn after_background_update(&self, assets: &[AssetRef]) -> Result<()> {
        self.sweep(assets, false).await
    }

    /// Assets were added to a collection: besides the per-asset sweep, the
    /// aggregate listing cache is explicitly invalidated so the new assets
    /// show up in cached enumerations even though they had no per-identity
    /// entries to clear.
    pub async fn after_asset_addition(&self, assets: &[AssetRef]) -> Result<()> {
        if resolve_aliases(assets).is_empty() {
            tracing::warn!("asset addition with no resolvable alias, skipping invalidation");
            return Ok(());
        }
        self.sweep(assets, false).await?;
        self.client
            .invalidate_kind(ArtifactKind::CollectionListing)
            .await
    }

    async fn sweep(&self, assets: &[AssetRef], refetch_active: bool) -> Result<()> {
        let aliases = resolve_aliases(assets);
        if aliases.is_empty() {
            tracing::warn!(
                inputs = assets.len(),
                "no resolvable alias in invalidation request, skipping"
            );
            return Ok(());
        }
        let server_aliases = resolve_server_aliases(assets);

        let (client_result, ()) = tokio::join!(
            self.client.invalidate(&aliases, refetch_active),
            self.server.purge(&server_aliases),
        );
        client_result
    }
}
