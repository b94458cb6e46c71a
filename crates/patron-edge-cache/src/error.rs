//! Cache error types.

/// Errors reported by cache handles.
///
/// None of these are fatal: callers are expected to degrade to cache-miss
/// behavior and go to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The cache was accessed before it was configured.
    #[error("{cache} cache is not initialized")]
    Uninitialized {
        /// Name of the cache that was accessed.
        cache: &'static str,
    },
}

impl CacheError {
    /// Creates a new `Uninitialized` error.
    #[must_use]
    pub fn uninitialized(cache: &'static str) -> Self {
        Self::Uninitialized { cache }
    }
}
