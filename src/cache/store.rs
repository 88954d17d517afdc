//! The cache store contract and its in-memory implementation.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};

use lru::LruCache;
use metrics::{counter, gauge};
use thiserror::Error;

use super::artifact::Artifact;
use super::config::CacheConfig;
use super::key::CacheKey;
use super::lock::{rw_read, rw_write};

const METRIC_EVICT_TOTAL: &str = "page_cache_evict_total";
const METRIC_ENTRIES: &str = "page_cache_entries";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store rejected `{key}`: {reason}")]
    Rejected { key: String, reason: String },
}

/// Shared key/value store of page artifacts.
///
/// Implementations must be safe to call concurrently from request tasks and
/// the invalidation sentry. `put` fully replaces any artifact under the key
/// (last writer wins); there is no per-key expiry at this layer.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<Artifact>>, StoreError>;

    fn put(&self, key: CacheKey, artifact: Artifact) -> Result<(), StoreError>;

    /// Counter bumped by every `clear`.
    fn generation(&self) -> u64;

    /// Store only if no `clear` has happened since `generation` was read.
    /// Returns whether the artifact was stored.
    fn put_if_generation(
        &self,
        key: CacheKey,
        artifact: Artifact,
        generation: u64,
    ) -> Result<bool, StoreError>;

    fn invalidate(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Drop every entry. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle passed to every component that touches the cache.
pub type SharedStore = Arc<dyn CacheStore>;

/// In-process store bounded by entry count with LRU eviction.
pub struct MemoryStore {
    entries: RwLock<LruCache<CacheKey, Arc<Artifact>>>,
    // Only changed while the entries write guard is held.
    generation: AtomicU64,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn shared(config: &CacheConfig) -> SharedStore {
        Arc::new(Self::new(config))
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<Artifact>>, StoreError> {
        // LRU lookups reorder entries, hence the write guard.
        Ok(rw_write(&self.entries, "get").get(key).cloned())
    }

    fn put(&self, key: CacheKey, artifact: Artifact) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, "put");
        insert(&mut entries, key, artifact);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn put_if_generation(
        &self,
        key: CacheKey,
        artifact: Artifact,
        generation: u64,
    ) -> Result<bool, StoreError> {
        let mut entries = rw_write(&self.entries, "put_if_generation");
        if self.generation.load(Ordering::Acquire) != generation {
            return Ok(false);
        }
        insert(&mut entries, key, artifact);
        Ok(true)
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, "invalidate");
        entries.pop(key);
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = rw_write(&self.entries, "clear");
        entries.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        gauge!(METRIC_ENTRIES).set(0.0);
        Ok(())
    }

    fn len(&self) -> usize {
        rw_read(&self.entries, "len").len()
    }
}

fn insert(entries: &mut LruCache<CacheKey, Arc<Artifact>>, key: CacheKey, artifact: Artifact) {
    if let Some((evicted, _)) = entries.push(key.clone(), Arc::new(artifact))
        && evicted != key
    {
        counter!(METRIC_EVICT_TOTAL).increment(1);
    }
    gauge!(METRIC_ENTRIES).set(entries.len() as f64);
}
