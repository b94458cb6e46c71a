//! External patron identity -> internal patron id cache.

use crate::bounded::{CacheEntry, CacheLookup, CacheStats};
use crate::handle::CacheHandle;
use crate::settings::CacheSettings;
use crate::CacheResult;

/// Caches the internal patron id resolved for `(tenant, external id)`.
pub struct IdentityCache {
    handle: CacheHandle<String, String>,
}

impl IdentityCache {
    /// Name used in logs and errors.
    pub const NAME: &'static str = "identity";

    /// Creates a cache that reports `Uninitialized` until configured.
    pub fn uninitialized() -> Self {
        Self {
            handle: CacheHandle::uninitialized(Self::NAME),
        }
    }

    /// Creates an initialized cache.
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            handle: CacheHandle::new(Self::NAME, settings),
        }
    }

    /// (Re-)initializes the cache, dropping every entry.
    pub fn initialize(&self, settings: &CacheSettings) {
        self.handle.initialize(settings);
    }

    /// Returns `true` once the cache has been configured.
    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }

    /// Looks up the internal id cached for `(tenant, external_id)`.
    pub fn get(&self, tenant: &str, external_id: &str) -> CacheResult<CacheLookup<String>> {
        self.handle.get(cache_key(tenant, external_id).as_str())
    }

    /// Caches the internal id for `(tenant, external_id)`.
    ///
    /// Returns the entry that ends up in the cache, which is the pre-existing
    /// one if an unexpired entry was already present.
    pub fn put(
        &self,
        tenant: &str,
        external_id: &str,
        internal_id: Option<String>,
    ) -> CacheResult<CacheEntry<String>> {
        self.handle.put(cache_key(tenant, external_id), internal_id)
    }

    /// Statistics, if initialized.
    pub fn stats(&self) -> Option<CacheStats> {
        self.handle.stats()
    }
}

/// `<tenant byte length>:<tenant><external id>`. The length prefix keeps
/// keys distinct whatever characters either part contains.
fn cache_key(tenant: &str, external_id: &str) -> String {
    format!("{}:{tenant}{external_id}", tenant.len())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::CacheError;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("diku", "ext-1"), "4:dikuext-1");
        assert_ne!(cache_key("a:b", "c"), cache_key("a", "b:c"));
    }

    #[test]
    fn test_delimiter_in_ids_does_not_collide() {
        let cache = IdentityCache::new(&CacheSettings::default());

        cache.put("a:b", "c", Some("first".to_string())).unwrap();
        cache.put("a", "b:c", Some("second".to_string())).unwrap();

        assert_eq!(
            cache.get("a:b", "c").unwrap(),
            CacheLookup::Hit("first".to_string())
        );
        assert_eq!(
            cache.get("a", "b:c").unwrap(),
            CacheLookup::Hit("second".to_string())
        );
    }

    #[test]
    fn test_entries_are_tenant_scoped() {
        let cache = IdentityCache::new(&CacheSettings::default());

        cache
            .put("diku", "ext-1", Some("internal-a".to_string()))
            .unwrap();

        assert_eq!(
            cache.get("diku", "ext-1").unwrap(),
            CacheLookup::Hit("internal-a".to_string())
        );
        assert_eq!(cache.get("other", "ext-1").unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn test_uninitialized() {
        let cache = IdentityCache::uninitialized();
        assert!(!cache.is_initialized());
        assert_eq!(
            cache.get("diku", "ext-1"),
            Err(CacheError::uninitialized(IdentityCache::NAME))
        );

        cache.initialize(&CacheSettings::default().with_absent_ttl(Duration::from_secs(1)));
        assert!(cache.is_initialized());
        assert_eq!(cache.get("diku", "ext-1").unwrap(), CacheLookup::Miss);
    }
}
