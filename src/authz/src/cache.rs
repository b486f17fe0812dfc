//! TTL cache for decoded on-chain results
//!
//! Entries expire individually. Expired entries are dropped lazily on
//! `get`, by the optional background sweeper, or when the cache is full.
//! The cache is process-local.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use num_bigint::BigUint;
use tokengate_chain::Address;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default time-to-live for cached chain results
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Default upper bound on cached entries
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live applied by rules when they store a result
    pub ttl: Duration,

    /// Maximum number of entries kept
    pub max_entries: usize,

    /// Period of the background sweep, if one is started
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            sweep_interval: None,
        }
    }
}

/// Decoded value stored for a chain lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// Token balance from `balanceOf`
    Balance(BigUint),
    /// Token owner from `ownerOf`
    Owner(Address),
}

/// Build the composite key `{rule_type}:{chain_id}:{contract}:{identifier}`
///
/// The contract renders lowercase and the identifier is lowercased, so
/// checksum casing never splits the cache.
pub fn cache_key(rule_type: &str, chain_id: u64, contract: &Address, identifier: &str) -> String {
    format!(
        "{rule_type}:{chain_id}:{contract}:{}",
        identifier.to_lowercase()
    )
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Expired entries encountered on read
    pub expirations: u64,
    /// Entries dropped to respect `max_entries`
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent TTL cache
///
/// Safe to share across tasks without external locking; locking is
/// per-shard inside [`DashMap`] and never spans an RPC call.
pub struct ResultCache<V = CachedValue> {
    entries: DashMap<String, CacheEntry<V>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    /// Create an empty cache
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// TTL configured for this cache
    pub fn default_ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a live entry; a stale entry is removed and reported as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // A concurrent set may have refreshed the key in between
            if self.entries.remove_if(key, |_, entry| entry.is_expired_at(now)).is_some() {
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value` under `key` for `ttl`
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();

        if self.config.max_entries > 0
            && self.entries.len() >= self.config.max_entries
            && !self.entries.contains_key(&key)
        {
            self.make_room(now);
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Entries currently stored, including stale ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries and reset statistics
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn make_room(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        if self.entries.len() < self.config.max_entries {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    /// Start a background task sweeping expired entries every `interval`
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("cache dropped, stopping sweeper");
                    break;
                };
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "swept expired cache entries");
                }
            }
        })
    }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}
