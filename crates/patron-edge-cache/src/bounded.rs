//! Capacity-bounded cache with separate TTLs for present and absent values.
//!
//! Every entry is immutable once inserted. A `put` for a key that still has
//! an unexpired entry returns that entry unchanged, so a slow concurrent fetch
//! can never clobber a fresher result (first writer wins within the TTL window).
//!
//! ## Eviction
//!
//! Expired entries are only removed by the pruning pass at the start of a
//! `put`. If the cache is still full after pruning, the oldest-inserted entry
//! is evicted (FIFO, independent of access recency).
//!
//! ## Concurrency
//!
//! `get` takes a shared lock and never mutates the map. Pruning, eviction and
//! insertion all happen under a single exclusive lock, so two concurrent `put`s
//! for the same key cannot both insert and the size never exceeds capacity.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::settings::CacheSettings;

/// A cached value (or negative result) with the TTL chosen at insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    value: Option<V>,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn new(value: Option<V>, ttl: Duration, inserted_at: Instant) -> Self {
        Self {
            value,
            inserted_at,
            ttl,
        }
    }

    /// The cached value, or `None` for a negative entry.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Consumes the entry and returns the cached value.
    pub fn into_value(self) -> Option<V> {
        self.value
    }

    /// Returns `true` if this entry records a negative result.
    pub fn is_absent(&self) -> bool {
        self.value.is_none()
    }

    /// When the entry was inserted.
    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    /// The lifetime assigned to this entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` once the entry's age has reached its TTL.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<V> {
    /// An unexpired entry with a value.
    Hit(V),
    /// An unexpired negative entry: the value is known not to exist.
    KnownAbsent,
    /// No usable entry (never inserted, or expired).
    Miss,
}

impl<V> CacheLookup<V> {
    /// Returns `true` for [`CacheLookup::Hit`].
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Returns `true` for [`CacheLookup::Miss`].
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns the hit value, if any.
    pub fn into_hit(self) -> Option<V> {
        match self {
            Self::Hit(v) => Some(v),
            Self::KnownAbsent | Self::Miss => None,
        }
    }
}

/// Generic TTL cache with FIFO capacity eviction and negative caching.
pub struct BoundedTtlCache<K, V> {
    /// Entries in insertion order.
    entries: RwLock<IndexMap<K, CacheEntry<V>>>,
    capacity: usize,
    present_ttl: Duration,
    absent_ttl: Duration,
    hits: AtomicU64,
    absent_hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    /// Entries removed because the cache was full.
    evictions: AtomicU64,
    /// Entries removed by the pruning pass.
    expirations: AtomicU64,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates a new cache.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, present_ttl: Duration, absent_ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(IndexMap::with_capacity(capacity.min(1024))),
            capacity,
            present_ttl,
            absent_ttl,
            hits: AtomicU64::new(0),
            absent_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Creates a new cache from [`CacheSettings`].
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity, settings.present_ttl, settings.absent_ttl)
    }

    /// Looks up a key.
    ///
    /// Expired entries are reported as [`CacheLookup::Miss`] but are left in
    /// place; they are reclaimed by the next `put`.
    pub fn get<Q>(&self, key: &Q) -> CacheLookup<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => match &entry.value {
                Some(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    CacheLookup::Hit(value.clone())
                }
                None => {
                    self.absent_hits.fetch_add(1, Ordering::Relaxed);
                    CacheLookup::KnownAbsent
                }
            },
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                CacheLookup::Miss
            }
        }
    }

    /// Inserts a value (`Some`) or a negative result (`None`).
    ///
    /// If an unexpired entry for `key` already exists it is returned unchanged.
    /// Otherwise expired entries are pruned, the oldest entry is evicted if the
    /// cache is still full, and the new entry is inserted and returned.
    pub fn put(&self, key: K, value: Option<V>) -> CacheEntry<V> {
        let mut entries = self.entries.write();
        let now = Instant::now();

        if let Some(existing) = entries.get(&key)
            && !existing.is_expired_at(now)
        {
            return existing.clone();
        }

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let pruned = before - entries.len();
        if pruned > 0 {
            self.expirations.fetch_add(pruned as u64, Ordering::Relaxed);
        }

        if entries.len() >= self.capacity && entries.shift_remove_index(0).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let ttl = if value.is_some() {
            self.present_ttl
        } else {
            self.absent_ttl
        };
        let entry = CacheEntry::new(value, ttl, now);
        entries.insert(key, entry.clone());
        self.insertions.fetch_add(1, Ordering::Relaxed);

        entry
    }

    /// Number of entries currently held, including expired ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime of present entries.
    pub fn present_ttl(&self) -> Duration {
        self.present_ttl
    }

    /// Lifetime of absent entries.
    pub fn absent_ttl(&self) -> Duration {
        self.absent_ttl
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns a snapshot of cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            absent_hits: self.absent_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for a [`BoundedTtlCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently in the cache.
    pub size: usize,
    /// Maximum allowed entries.
    pub capacity: usize,
    /// Lookups answered with a value.
    pub hits: u64,
    /// Lookups answered with a negative entry.
    pub absent_hits: u64,
    /// Lookups with no usable entry.
    pub misses: u64,
    /// New entries inserted.
    pub insertions: u64,
    /// Entries evicted because the cache was full.
    pub evictions: u64,
    /// Expired entries removed while pruning.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage (negative hits count as hits).
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.absent_hits;
        let total = answered + self.misses;
        if total == 0 {
            0.0
        } else {
            (answered as f64 / total as f64) * 100.0
        }
    }
}
