//! # patron-edge-cache
//!
//! In-memory caches used by the patron edge gateway to avoid repeated backend
//! round trips.
//!
//! ## Overview
//!
//! - [`BoundedTtlCache`] - generic key/value cache with separate lifetimes for
//!   present and absent (negative) results and FIFO capacity eviction
//! - [`CacheHandle`] - an explicitly owned slot holding a cache that may not be
//!   initialized yet, and that can be re-initialized on demand
//! - [`IdentityCache`] - `(tenant, external id) -> internal patron id`
//! - [`PublicKeyCache`] - `realm -> raw JWKS document`
//!
//! Entries live only in process memory; every deployment starts cold.

pub mod bounded;
pub mod error;
pub mod handle;
pub mod identity;
pub mod public_key;
pub mod settings;

pub use bounded::{BoundedTtlCache, CacheEntry, CacheLookup, CacheStats};
pub use error::CacheError;
pub use handle::CacheHandle;
pub use identity::IdentityCache;
pub use public_key::PublicKeyCache;
pub use settings::CacheSettings;

/// Type alias for cache results.
pub type CacheResult<T> = Result<T, CacheError>;
