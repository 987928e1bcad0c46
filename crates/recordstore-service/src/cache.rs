//! Tenant-scoped lookup cache
//!
//! Schema and legal tag lookups are read-through: services consult the
//! cache first and fill it from the backing contract on a miss. Entries
//! are keyed by `(tenant, key)` so tenants never observe each other's
//! entries, and each cache is an injected value rather than a global.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache interface with explicit invalidation
pub trait Cache<V>: Send + Sync {
    fn get(&self, tenant: &str, key: &str) -> Option<V>;

    fn put(&self, tenant: &str, key: &str, value: V);

    fn delete(&self, tenant: &str, key: &str);

    fn clear_all(&self);
}

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }
}

struct CacheEntry<V> {
    value: V,
    last_access: AtomicU64,
}

/// Bounded in-memory cache with least-recently-used eviction
pub struct InMemoryCache<V> {
    entries: RwLock<HashMap<(String, String), CacheEntry<V>>>,
    capacity: usize,
    clock: AtomicU64,
    stats: CacheStats,
}

impl<V: Clone + Send + Sync> InMemoryCache<V> {
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            stats: CacheStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_lru(entries: &mut HashMap<(String, String), CacheEntry<V>>) -> bool {
        let oldest = entries
            .iter()
            .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
            .map(|(k, _)| k.clone());
        oldest.is_some_and(|key| entries.remove(&key).is_some())
    }
}

impl<V: Clone + Send + Sync> Cache<V> for InMemoryCache<V> {
    fn get(&self, tenant: &str, key: &str) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(&(tenant.to_string(), key.to_string())) {
            Some(entry) => {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, tenant: &str, key: &str, value: V) {
        let mut entries = self.entries.write();
        let key = (tenant.to_string(), key.to_string());
        if !entries.contains_key(&key)
            && entries.len() >= self.capacity
            && Self::evict_lru(&mut entries)
        {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                last_access: AtomicU64::new(self.tick()),
            },
        );
    }

    fn delete(&self, tenant: &str, key: &str) {
        self.entries
            .write()
            .remove(&(tenant.to_string(), key.to_string()));
    }

    fn clear_all(&self) {
        self.entries.write().clear();
    }
}
