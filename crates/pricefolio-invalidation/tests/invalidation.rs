//! Integration tests for the invalidation orchestrator.
//!
//! These run the real client fan-out against [`LocalQueryCache`] and a
//! recording (or failing, or slow) fake remote store, and verify the
//! scenario-level guarantees: alias fan-out, idempotence, best-effort
//! server purging, and the refetch semantics of a manual refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pricefolio_core::{
    AssetIdentity, AssetRef, InvalidationError, KeyPattern, all_artifact_kinds, patterns_for,
};
use pricefolio_invalidation::{
    Fetcher, InvalidationConfig, InvalidationOrchestrator, LocalQueryCache, PurgeRequest,
    QueryCache, RemoteStore,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Remote store fake that records every purge request and can be told to
/// fail or to respond slowly.
#[derive(Default)]
struct RecordingStore {
    requests: Mutex<Vec<PurgeRequest>>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl RecordingStore {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<PurgeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn purge(&self, request: PurgeRequest) -> pricefolio_core::Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(InvalidationError::remote_store("injected failure"));
        }
        Ok(())
    }
}

fn orchestrator(
    cache: Arc<LocalQueryCache>,
    store: Arc<RecordingStore>,
) -> InvalidationOrchestrator {
    InvalidationOrchestrator::new(
        cache as Arc<dyn QueryCache>,
        store as Arc<dyn RemoteStore>,
        &InvalidationConfig::default(),
    )
}

/// Every per-identity cache key the registry derives for one alias.
fn template_keys(alias: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for kind in all_artifact_kinds() {
        for pattern in patterns_for(*kind) {
            if let KeyPattern::Template { render, .. } = pattern {
                keys.push(render(alias));
            }
        }
    }
    keys
}

fn seed_alias(cache: &LocalQueryCache, alias: &str) {
    for key in template_keys(alias) {
        cache.insert(key, b"cached".to_vec());
    }
}

fn stale_keys(cache: &LocalQueryCache, alias: &str) -> Vec<String> {
    template_keys(alias)
        .into_iter()
        .filter(|key| cache.is_stale(key) == Some(true))
        .collect()
}

#[tokio::test]
async fn test_invalidate_one_covers_both_aliases() {
    init_tracing();
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    seed_alias(&cache, "u1");
    seed_alias(&cache, "g1");

    orch.invalidate_one(AssetIdentity::new("u1", "g1"))
        .await
        .unwrap();

    // Every per-identity artifact was invalidated under both aliases.
    assert_eq!(stale_keys(&cache, "u1").len(), template_keys("u1").len());
    assert_eq!(stale_keys(&cache, "g1").len(), template_keys("g1").len());
}

#[tokio::test]
async fn test_server_purge_prefers_global_alias() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    orch.invalidate_one(AssetIdentity::new("u1", "g1"))
        .await
        .unwrap();

    assert_eq!(
        store.requests(),
        vec![PurgeRequest::Ids {
            ids: vec!["g1".to_string()]
        }]
    );
}

#[tokio::test]
async fn test_empty_inputs_perform_zero_cache_calls() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    orch.invalidate_many(&[]).await.unwrap();
    orch.invalidate_one("").await.unwrap();
    orch.invalidate_one(AssetIdentity::default()).await.unwrap();
    orch.after_asset_addition(&[]).await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.invalidate_calls, 0);
    assert_eq!(stats.sweep_calls, 0);
    assert_eq!(stats.refetch_calls, 0);
    assert!(store.requests().is_empty());
}

#[tokio::test]
async fn test_invalidate_many_is_a_superset_of_singles() {
    let single_a = Arc::new(LocalQueryCache::new());
    let single_b = Arc::new(LocalQueryCache::new());
    let many = Arc::new(LocalQueryCache::new());
    for cache in [&single_a, &single_b, &many] {
        seed_alias(cache, "a");
        seed_alias(cache, "b");
    }

    orchestrator(Arc::clone(&single_a), Arc::new(RecordingStore::default()))
        .invalidate_one("a")
        .await
        .unwrap();
    orchestrator(Arc::clone(&single_b), Arc::new(RecordingStore::default()))
        .invalidate_one("b")
        .await
        .unwrap();
    let many_store = Arc::new(RecordingStore::default());
    orchestrator(Arc::clone(&many), Arc::clone(&many_store))
        .invalidate_many(&[AssetRef::from("a"), AssetRef::from("b")])
        .await
        .unwrap();

    let mut union: Vec<String> = stale_keys(&single_a, "a");
    union.extend(stale_keys(&single_b, "b"));
    let mut combined = stale_keys(&many, "a");
    combined.extend(stale_keys(&many, "b"));
    for key in &union {
        assert!(combined.contains(key), "missing {key} from batch sweep");
    }

    // Aggregate predicates applied exactly once for the whole batch, not
    // once per alias.
    assert_eq!(many.stats().sweep_calls, 2);
}

#[tokio::test]
async fn test_concurrent_invalidation_is_idempotent() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = Arc::new(orchestrator(Arc::clone(&cache), Arc::clone(&store)));

    seed_alias(&cache, "u1");

    let repeats: Vec<_> = (0..5)
        .map(|_| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.invalidate_one("u1").await })
        })
        .collect();
    for handle in repeats {
        handle.await.unwrap().unwrap();
    }

    // Same final state as a single run, no error from repeated clearing.
    assert_eq!(stale_keys(&cache, "u1").len(), template_keys("u1").len());
    assert_eq!(cache.stats().entries, template_keys("u1").len());
}

#[tokio::test]
async fn test_server_failure_does_not_fail_the_operation() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::failing());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    seed_alias(&cache, "u1");

    orch.invalidate_many(&[AssetRef::from("u1")]).await.unwrap();

    // The remote leg was attempted and failed; the client leg completed.
    assert_eq!(store.calls.load(Ordering::Relaxed), 1);
    assert_eq!(stale_keys(&cache, "u1").len(), template_keys("u1").len());
}

#[tokio::test]
async fn test_manual_refresh_refetches_subscribed_entries_only() {
    let fetcher: Fetcher = Arc::new(|key: &str| format!("fresh:{key}").into_bytes());
    let cache = Arc::new(LocalQueryCache::with_fetcher(fetcher));
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    seed_alias(&cache, "u1");
    seed_alias(&cache, "u2");
    cache.subscribe("market:snapshot:u1");

    orch.after_manual_refresh("u1").await.unwrap();

    // The actively viewed entry holds fresh data already.
    assert_eq!(cache.is_stale("market:snapshot:u1"), Some(false));
    assert_eq!(
        cache.get("market:snapshot:u1").as_deref(),
        Some(&b"fresh:market:snapshot:u1".to_vec())
    );
    // Unsubscribed u1 entries are stale, pending lazy refetch.
    assert_eq!(cache.is_stale("pricing:u1"), Some(true));
    // A different asset is untouched.
    assert!(stale_keys(&cache, "u2").is_empty());
    assert_eq!(cache.stats().synchronous_refetches, 1);
}

#[tokio::test]
async fn test_background_update_fans_out_concurrently() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::slow(Duration::from_millis(200)));
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    let assets: Vec<AssetRef> = (0..500).map(|i| AssetRef::from(format!("id-{i}"))).collect();
    for asset in &assets {
        if let AssetRef::Id(id) = asset {
            seed_alias(&cache, id);
        }
    }

    let started = Instant::now();
    orch.after_background_update(&assets).await.unwrap();

    // One purge command for the whole batch plus the concurrent client
    // fan-out; nothing close to 500 sequential round trips.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(store.calls.load(Ordering::Relaxed), 1);
    assert_eq!(stale_keys(&cache, "id-0").len(), template_keys("id-0").len());
    assert_eq!(
        stale_keys(&cache, "id-499").len(),
        template_keys("id-499").len()
    );
}

#[tokio::test]
async fn test_background_update_survives_remote_failure() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::failing());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    let assets: Vec<AssetRef> = (0..500).map(|i| AssetRef::from(format!("id-{i}"))).collect();
    for asset in &assets {
        if let AssetRef::Id(id) = asset {
            seed_alias(&cache, id);
        }
    }

    // The remote purge for the batch fails; no asset's client-side
    // invalidation is aborted by it.
    orch.after_background_update(&assets).await.unwrap();

    assert_eq!(store.calls.load(Ordering::Relaxed), 1);
    for i in [0, 250, 499] {
        let alias = format!("id-{i}");
        assert_eq!(
            stale_keys(&cache, &alias).len(),
            template_keys(&alias).len()
        );
    }
}

#[tokio::test]
async fn test_asset_addition_invalidates_listing_without_prior_entries() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    // The new asset has no per-identity entries; only aggregate views of
    // the owning collection are cached.
    cache.insert("collection:list:owner-1", b"listing".to_vec());
    cache.insert("collection:list:owner-1:page:2", b"listing".to_vec());
    cache.insert("batch:pricing:page-1", b"batch".to_vec());

    orch.after_asset_addition(&[AssetRef::from("new-1")])
        .await
        .unwrap();

    assert_eq!(cache.is_stale("collection:list:owner-1"), Some(true));
    assert_eq!(cache.is_stale("collection:list:owner-1:page:2"), Some(true));
    assert_eq!(cache.is_stale("batch:pricing:page-1"), Some(true));
    assert_eq!(
        store.requests(),
        vec![PurgeRequest::Ids {
            ids: vec!["new-1".to_string()]
        }]
    );
}

#[tokio::test]
async fn test_invalidate_all_clears_unrelated_aliases() {
    let cache = Arc::new(LocalQueryCache::new());
    let store = Arc::new(RecordingStore::default());
    let orch = orchestrator(Arc::clone(&cache), Arc::clone(&store));

    seed_alias(&cache, "whatever");
    seed_alias(&cache, "совсем-unrelated");
    cache.insert("collection:list:owner-9", b"listing".to_vec());
    cache.insert("batch:export:pending", b"batch".to_vec());

    orch.invalidate_all().await.unwrap();

    let stats = cache.stats();
    assert_eq!(stats.stale_entries, stats.entries);
    assert_eq!(
        store.requests(),
        vec![PurgeRequest::Pattern {
            pattern: "pricefolio:*".to_string()
        }]
    );
}
