//! External patron id -> internal id resolution.

use std::sync::Arc;
use std::time::Duration;

use patron_edge_cache::{CacheLookup, IdentityCache};

use crate::backend::{PatronLookup, with_timeout};
use crate::error::{BackendError, EdgeError};

/// Resolves external patron ids through the identity cache.
///
/// Only successful lookups are cached. Lookup failures, including "no such
/// patron", are returned without touching the cache, so the next request
/// asks the backend again.
pub struct IdentityResolver {
    cache: Arc<IdentityCache>,
    lookup: Arc<dyn PatronLookup>,
    request_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        cache: Arc<IdentityCache>,
        lookup: Arc<dyn PatronLookup>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            lookup,
            request_timeout,
        }
    }

    /// Returns the internal id for `external_id` within `tenant`.
    pub async fn resolve(&self, tenant: &str, external_id: &str) -> Result<String, EdgeError> {
        if external_id.trim().is_empty() {
            return Err(EdgeError::validation("external patron id is required"));
        }

        match self.cache.get(tenant, external_id) {
            Ok(CacheLookup::Hit(internal_id)) => {
                tracing::trace!(tenant = %tenant, external_id = %external_id, "Identity cache hit");
                return Ok(internal_id);
            }
            Ok(_) => {
                tracing::debug!(
                    tenant = %tenant,
                    external_id = %external_id,
                    "Identity cache miss"
                );
            }
            Err(e) => {
                tracing::debug!(tenant = %tenant, error = %e, "Identity cache unavailable");
            }
        }

        let internal_id = with_timeout(
            self.request_timeout,
            self.lookup.lookup_internal_id(tenant, external_id),
        )
        .await
        .map_err(|e| {
            tracing::warn!(
                tenant = %tenant,
                external_id = %external_id,
                error = %e,
                "Patron lookup failed"
            );
            match e {
                BackendError::NotFound => EdgeError::patron_not_found(external_id),
                BackendError::Timeout => EdgeError::upstream_timeout("patron lookup"),
                other => EdgeError::LookupFailed(other.to_string()),
            }
        })?;

        match self.cache.put(tenant, external_id, Some(internal_id.clone())) {
            // An earlier writer's value wins; a concurrent negative entry does not.
            Ok(entry) => Ok(entry.into_value().unwrap_or(internal_id)),
            Err(e) => {
                tracing::debug!(tenant = %tenant, error = %e, "Identity not cached");
                Ok(internal_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use patron_edge_cache::CacheSettings;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    /// Lookup that replays scripted answers and counts calls.
    struct ScriptedLookup {
        answers: Mutex<Vec<Result<String, BackendError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedLookup {
        fn new(answers: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(vec![Ok("late".to_string())]),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PatronLookup for ScriptedLookup {
        async fn lookup_internal_id(
            &self,
            _tenant: &str,
            _external_id: &str,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0].clone()
            }
        }
    }

    fn resolver(cache: Arc<IdentityCache>, lookup: Arc<ScriptedLookup>) -> IdentityResolver {
        IdentityResolver::new(cache, lookup, Duration::from_secs(5))
    }

    fn cache() -> Arc<IdentityCache> {
        Arc::new(IdentityCache::new(&CacheSettings::default()))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = cache();
        let lookup = ScriptedLookup::new(vec![Ok("internal-1".to_string())]);
        let resolver = resolver(cache.clone(), lookup.clone());

        assert_eq!(resolver.resolve("diku", "ext-1").await.unwrap(), "internal-1");
        assert_eq!(resolver.resolve("diku", "ext-1").await.unwrap(), "internal-1");
        assert_eq!(lookup.calls(), 1);
        assert_eq!(
            cache.get("diku", "ext-1").unwrap(),
            CacheLookup::Hit("internal-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let lookup = ScriptedLookup::new(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let resolver = resolver(cache(), lookup.clone());

        assert_eq!(resolver.resolve("diku", "ext-1").await.unwrap(), "a");
        assert_eq!(resolver.resolve("other", "ext-1").await.unwrap(), "b");
        assert_eq!(lookup.calls(), 2);
    }

    /// Lookup that lets another writer populate the cache mid-flight.
    struct RacingLookup {
        cache: Arc<IdentityCache>,
    }

    #[async_trait]
    impl PatronLookup for RacingLookup {
        async fn lookup_internal_id(
            &self,
            tenant: &str,
            external_id: &str,
        ) -> Result<String, BackendError> {
            self.cache
                .put(tenant, external_id, Some("first".to_string()))
                .unwrap();
            Ok("second".to_string())
        }
    }

    #[tokio::test]
    async fn test_earlier_writer_wins() {
        let cache = cache();
        let lookup = Arc::new(RacingLookup {
            cache: cache.clone(),
        });
        let resolver = IdentityResolver::new(cache.clone(), lookup, Duration::from_secs(5));

        assert_eq!(resolver.resolve("diku", "ext-1").await.unwrap(), "first");
        assert_eq!(
            cache.get("diku", "ext-1").unwrap(),
            CacheLookup::Hit("first".to_string())
        );
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let cache = cache();
        let lookup = ScriptedLookup::new(vec![Err(BackendError::NotFound)]);
        let resolver = resolver(cache.clone(), lookup.clone());

        let err = assert_err!(resolver.resolve("diku", "ghost").await);
        assert!(
            matches!(err, EdgeError::PatronNotFound { ref external_id } if external_id == "ghost")
        );
        assert_eq!(cache.get("diku", "ghost").unwrap(), CacheLookup::Miss);

        assert_err!(resolver.resolve("diku", "ghost").await);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_then_success() {
        let cache = cache();
        let lookup = ScriptedLookup::new(vec![
            Err(BackendError::Transport("connection reset".to_string())),
            Ok("internal-1".to_string()),
        ]);
        let resolver = resolver(cache.clone(), lookup.clone());

        let err = assert_err!(resolver.resolve("diku", "ext-1").await);
        assert!(matches!(err, EdgeError::LookupFailed(_)));

        assert_eq!(assert_ok!(resolver.resolve("diku", "ext-1").await), "internal-1");
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_known_absent_is_treated_as_miss() {
        let cache = cache();
        cache.put("diku", "ext-1", None).unwrap();
        let lookup = ScriptedLookup::new(vec![Ok("internal-1".to_string())]);
        let resolver = resolver(cache.clone(), lookup.clone());

        assert_eq!(resolver.resolve("diku", "ext-1").await.unwrap(), "internal-1");
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_uninitialized_cache_always_looks_up() {
        let lookup = ScriptedLookup::new(vec![Ok("internal-1".to_string())]);
        let resolver = resolver(Arc::new(IdentityCache::uninitialized()), lookup.clone());

        assert_ok!(resolver.resolve("diku", "ext-1").await);
        assert_ok!(resolver.resolve("diku", "ext-1").await);
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out() {
        let cache = cache();
        let lookup = ScriptedLookup::slow(Duration::from_secs(30));
        let resolver = resolver(cache.clone(), lookup);

        let err = assert_err!(resolver.resolve("diku", "ext-1").await);
        assert!(err.is_timeout());
        assert_eq!(cache.get("diku", "ext-1").unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_blank_external_id_is_rejected() {
        let lookup = ScriptedLookup::new(vec![Ok("x".to_string())]);
        let resolver = resolver(cache(), lookup.clone());

        let err = assert_err!(resolver.resolve("diku", " ").await);
        assert!(matches!(err, EdgeError::ValidationFailed(_)));
        assert_eq!(lookup.calls(), 0);
    }
}
