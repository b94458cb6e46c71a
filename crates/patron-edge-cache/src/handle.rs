//! Explicitly owned cache slot.
//!
//! A [`CacheHandle`] is created once by the gateway's composition root and
//! shared with whichever components need the cache. It may start out empty;
//! until [`CacheHandle::initialize`] is called every access reports
//! [`CacheError::Uninitialized`], which callers treat as a cache miss.
//!
//! Re-initializing a handle swaps in a brand new cache and drops every entry
//! of the previous one. That is allowed, but logged as a warning because it is
//! almost always an accident outside of administrative resets.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::bounded::{BoundedTtlCache, CacheEntry, CacheLookup, CacheStats};
use crate::error::CacheError;
use crate::settings::CacheSettings;
use crate::CacheResult;

/// A named slot that may or may not hold a [`BoundedTtlCache`].
pub struct CacheHandle<K, V> {
    name: &'static str,
    inner: ArcSwapOption<BoundedTtlCache<K, V>>,
}

impl<K, V> CacheHandle<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty handle.
    pub fn uninitialized(name: &'static str) -> Self {
        Self {
            name,
            inner: ArcSwapOption::empty(),
        }
    }

    /// Creates a handle holding a cache built from `settings`.
    pub fn new(name: &'static str, settings: &CacheSettings) -> Self {
        let handle = Self::uninitialized(name);
        handle.initialize(settings);
        handle
    }

    /// Installs a fresh cache built from `settings`.
    ///
    /// If a cache is already installed it is replaced and all of its entries
    /// are dropped.
    pub fn initialize(&self, settings: &CacheSettings) {
        let fresh = Arc::new(BoundedTtlCache::from_settings(settings));
        match self.inner.swap(Some(fresh)) {
            Some(previous) => tracing::warn!(
                cache = self.name,
                dropped_entries = previous.len(),
                capacity = settings.capacity,
                "Cache re-initialized, existing entries dropped"
            ),
            None => tracing::info!(
                cache = self.name,
                capacity = settings.capacity,
                present_ttl = ?settings.present_ttl,
                absent_ttl = ?settings.absent_ttl,
                "Cache initialized"
            ),
        }
    }

    /// Returns `true` once a cache has been installed.
    pub fn is_initialized(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the installed cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Uninitialized`] if no cache has been installed.
    pub fn cache(&self) -> CacheResult<Arc<BoundedTtlCache<K, V>>> {
        self.inner
            .load_full()
            .ok_or_else(|| CacheError::uninitialized(self.name))
    }

    /// Looks up `key` in the installed cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Uninitialized`] if no cache has been installed.
    pub fn get<Q>(&self, key: &Q) -> CacheResult<CacheLookup<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ok(self.cache()?.get(key))
    }

    /// Inserts into the installed cache (see [`BoundedTtlCache::put`]).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Uninitialized`] if no cache has been installed.
    pub fn put(&self, key: K, value: Option<V>) -> CacheResult<CacheEntry<V>> {
        Ok(self.cache()?.put(key, value))
    }

    /// Statistics of the installed cache, if any.
    pub fn stats(&self) -> Option<CacheStats> {
        self.cache().ok().map(|cache| cache.stats())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings() -> CacheSettings {
        CacheSettings::new(10, Duration::from_secs(60), Duration::from_secs(5))
    }

    #[test]
    fn test_uninitialized_handle_reports_error() {
        let handle: CacheHandle<String, String> = CacheHandle::uninitialized("test");
        assert!(!handle.is_initialized());
        assert_eq!(handle.get("k"), Err(CacheError::uninitialized("test")));
        assert_eq!(
            handle.put("k".to_string(), Some("v".to_string())).unwrap_err(),
            CacheError::uninitialized("test")
        );
        assert!(handle.cache().is_err());
        assert!(handle.stats().is_none());
    }

    #[test]
    fn test_initialize_then_use() {
        let handle: CacheHandle<String, String> = CacheHandle::uninitialized("test");
        handle.initialize(&settings());
        assert!(handle.is_initialized());

        handle.put("k".to_string(), Some("v".to_string())).unwrap();
        assert_eq!(handle.get("k"), Ok(CacheLookup::Hit("v".to_string())));
        assert_eq!(handle.cache().unwrap().capacity(), 10);
    }

    #[test]
    fn test_reinitialize_drops_entries() {
        let handle: CacheHandle<String, String> = CacheHandle::new("test", &settings());
        handle.put("k".to_string(), Some("v".to_string())).unwrap();
        assert_eq!(handle.stats().unwrap().size, 1);

        handle.initialize(&settings().with_capacity(2));

        assert_eq!(handle.get("k"), Ok(CacheLookup::Miss));
        let stats = handle.stats().unwrap();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.capacity, 2);
    }
}
