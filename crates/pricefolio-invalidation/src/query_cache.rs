//! Client-side query cache interface and the in-process implementation.
//!
//! The invalidators only need three things from the query cache:
//! invalidate-by-exact-key, invalidate-by-namespace-prefix, and a
//! "refetch now if actively subscribed" operation that is distinct from
//! merely marking an entry stale. The trait abstracts those three so the
//! orchestrator can be wired to any query-cache backend; [`LocalQueryCache`]
//! is the DashMap-backed implementation used in-process and by the test
//! suite.
//!
//! ## Staleness vs. refetch
//!
//! Invalidation never evicts data: entries are marked stale and re-fetch
//! lazily on the next read. A forced refetch replaces the data of entries
//! with an active subscriber synchronously; entries nobody is watching are
//! only marked stale, same as a plain invalidation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use pricefolio_core::Result;

/// Client cache backend consumed by the invalidators.
///
/// Implementations are assumed locally consistent and reliable; an error
/// from any of these methods indicates a structural defect and propagates
/// to the caller of the enclosing orchestrator operation.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Mark the entry under `key` stale, if present.
    async fn invalidate_key(&self, key: &str) -> Result<()>;

    /// Mark every entry whose key starts with `prefix` stale.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<()>;

    /// Re-fetch the entry under `key` synchronously if it has an active
    /// subscriber; otherwise just mark it stale.
    async fn refetch_key(&self, key: &str) -> Result<()>;
}

/// Fetch function used by [`LocalQueryCache`] for synchronous and lazy
/// re-fetches. Takes the cache key, returns fresh bytes.
pub type Fetcher = Arc<dyn Fn(&str) -> Vec<u8> + Send + Sync>;

struct QueryEntry {
    data: Arc<Vec<u8>>,
    stale: bool,
    subscribed: bool,
}

/// In-process query cache backed by DashMap.
///
/// Thread-safe and shareable across async tasks. Counters are plain
/// atomics; they exist for monitoring and for the call-count assertions in
/// the invalidation tests.
pub struct LocalQueryCache {
    entries: DashMap<String, QueryEntry>,
    fetcher: Option<Fetcher>,
    invalidate_calls: AtomicU64,
    sweep_calls: AtomicU64,
    refetch_calls: AtomicU64,
    synchronous_refetches: AtomicU64,
}

impl LocalQueryCache {
    /// Cache without a fetcher: stale entries stay stale until re-inserted.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            fetcher: None,
            invalidate_calls: AtomicU64::new(0),
            sweep_calls: AtomicU64::new(0),
            refetch_calls: AtomicU64::new(0),
            synchronous_refetches: AtomicU64::new(0),
        }
    }

    /// Cache that re-fetches through `fetcher` on forced refetch and on the
    /// first read of a stale entry.
    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self {
            fetcher: Some(fetcher),
            ..Self::new()
        }
    }

    /// Insert or replace an entry with fresh data.
    pub fn insert(&self, key: impl Into<String>, data: Vec<u8>) {
        let key = key.into();
        let subscribed = self
            .entries
            .get(&key)
            .map(|entry| entry.subscribed)
            .unwrap_or(false);
        self.entries.insert(
            key,
            QueryEntry {
                data: Arc::new(data),
                stale: false,
                subscribed,
            },
        );
    }

    /// Mark an entry as having an active subscriber (a mounted view).
    pub fn subscribe(&self, key: &str) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.subscribed = true;
        }
    }

    /// Read an entry. Stale entries re-fetch lazily when a fetcher is
    /// configured, otherwise they read as a miss until fresh data arrives.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.stale {
            let fetcher = self.fetcher.as_ref()?;
            entry.data = Arc::new(fetcher(key));
            entry.stale = false;
        }
        Some(Arc::clone(&entry.data))
    }

    /// Whether the entry under `key` is currently stale. `None` if absent.
    pub fn is_stale(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|entry| entry.stale)
    }

    pub fn stats(&self) -> QueryCacheStats {
        QueryCacheStats {
            entries: self.entries.len(),
            stale_entries: self.entries.iter().filter(|entry| entry.stale).count(),
            invalidate_calls: self.invalidate_calls.load(Ordering::Relaxed),
            sweep_calls: self.sweep_calls.load(Ordering::Relaxed),
            refetch_calls: self.refetch_calls.load(Ordering::Relaxed),
            synchronous_refetches: self.synchronous_refetches.load(Ordering::Relaxed),
        }
    }
}

impl Default for LocalQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryCache for LocalQueryCache {
    async fn invalidate_key(&self, key: &str) -> Result<()> {
        self.invalidate_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.stale = true;
            tracing::debug!(key = %key, "query cache entry marked stale");
        }
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        self.sweep_calls.fetch_add(1, Ordering::Relaxed);
        let mut marked = 0usize;
        for mut entry in self.entries.iter_mut() {
            if entry.key().starts_with(prefix) && !entry.stale {
                entry.stale = true;
                marked += 1;
            }
        }
        tracing::debug!(prefix = %prefix, marked = marked, "query cache namespace swept");
        Ok(())
    }

    async fn refetch_key(&self, key: &str) -> Result<()> {
        self.refetch_calls.fetch_add(1, Ordering::Relaxed);
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(());
        };
        match (&self.fetcher, entry.subscribed) {
            (Some(fetcher), true) => {
                entry.data = Arc::new(fetcher(key));
                entry.stale = false;
                self.synchronous_refetches.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "query cache entry re-fetched");
            }
            _ => {
                entry.stale = true;
            }
        }
        Ok(())
    }
}

/// Query cache statistics for monitoring and tests.
#[derive(Debug, Clone, Default)]
pub struct QueryCacheStats {
    pub entries: usize,
    pub stale_entries: usize,
    pub invalidate_calls: u64,
    pub sweep_calls: u64,
    pub refetch_calls: u64,
    pub synchronous_refetches: u64,
}
