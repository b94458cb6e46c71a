//! Realm -> JWKS document cache.
//!
//! Values are the raw key-set documents as returned by the identity provider;
//! parsing happens in the token verifier. A negative entry records that the
//! realm's key endpoint answered "not found".

use crate::bounded::{CacheEntry, CacheLookup, CacheStats};
use crate::handle::CacheHandle;
use crate::settings::CacheSettings;
use crate::CacheResult;

/// Caches serialized JWKS documents per realm.
pub struct PublicKeyCache {
    handle: CacheHandle<String, String>,
}

impl PublicKeyCache {
    /// Name used in logs and errors.
    pub const NAME: &'static str = "public-key";

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

    /// Looks up the key-set document cached for `realm`.
    pub fn get(&self, realm: &str) -> CacheResult<CacheLookup<String>> {
        self.handle.get(realm)
    }

    /// Caches the key-set document (or its absence) for `realm`.
    pub fn put(&self, realm: &str, document: Option<String>) -> CacheResult<CacheEntry<String>> {
        self.handle.put(realm.to_string(), document)
    }

    /// Statistics, if initialized.
    pub fn stats(&self) -> Option<CacheStats> {
        self.handle.stats()
    }
}
