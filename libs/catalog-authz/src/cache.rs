//! Authorization result cache (spec.md §4.3/§9: "AuthzCache entry"):
//! `user∣groups∣resource∣verb∣namespace → {allowed, expiresAt}`, default
//! 10s TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use catalog_errors::CatalogError;
use parking_lot::RwLock;

use crate::authorizer::{AuthzRequest, Authorizer};

const DEFAULT_TTL: Duration = Duration::from_secs(10);

struct CacheEntry {
    allowed: bool,
    expires_at: Instant,
}

fn cache_key(user: &str, groups: &[String], req: &AuthzRequest) -> String {
    let mut sorted_groups = groups.to_vec();
    sorted_groups.sort_unstable();
    format!(
        "{user}\u{241F}{}\u{241F}{}\u{241F}{}\u{241F}{}",
        sorted_groups.join(","),
        req.resource,
        req.verb,
        req.namespace.as_deref().unwrap_or(""),
    )
}

/// Wraps any `Authorizer`, caching allow/deny decisions for a fixed TTL.
/// Reads take a shared lock; only a miss or expiry takes the exclusive one.
pub struct CachingAuthorizer<A: Authorizer> {
    inner: A,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl<A: Authorizer> CachingAuthorizer<A> {
    #[must_use]
    pub fn new(inner: A) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    #[must_use]
    pub fn with_ttl(inner: A, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl<A: Authorizer> Authorizer for CachingAuthorizer<A> {
    async fn authorize(
        &self,
        user: &str,
        groups: &[String],
        req: &AuthzRequest,
    ) -> Result<bool, CatalogError> {
        let key = cache_key(user, groups, req);
        let now = Instant::now();

        if let Some(entry) = self.entries.read().get(&key) {
            if entry.expires_at > now {
                return Ok(entry.allowed);
            }
        }

        let allowed = self.inner.authorize(user, groups, req).await?;
        self.entries.write().insert(
            key,
            CacheEntry {
                allowed,
                expires_at: now + self.ttl,
            },
        );
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingAuthorizer {
        calls: Arc<AtomicUsize>,
        allowed: bool,
    }

    #[async_trait]
    impl Authorizer for CountingAuthorizer {
        async fn authorize(
            &self,
            _user: &str,
            _groups: &[String],
            _req: &AuthzRequest,
        ) -> Result<bool, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.allowed)
        }
    }

    fn req() -> AuthzRequest {
        AuthzRequest {
            resource: "plugins".into(),
            verb: "list".into(),
            namespace: None,
        }
    }

    #[tokio::test]
    async fn caches_decision_within_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachingAuthorizer::with_ttl(
            CountingAuthorizer { calls: calls.clone(), allowed: true },
            Duration::from_secs(60),
        );
        for _ in 0..5 {
            assert!(cache.authorize("alice", &[], &req()).await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn denials_are_cached_too() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachingAuthorizer::with_ttl(
            CountingAuthorizer { calls: calls.clone(), allowed: false },
            Duration::from_secs(60),
        );
        assert!(!cache.authorize("alice", &[], &req()).await.unwrap());
        assert!(!cache.authorize("alice", &[], &req()).await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachingAuthorizer::with_ttl(
            CountingAuthorizer { calls: calls.clone(), allowed: true },
            Duration::from_millis(1),
        );
        cache.authorize("alice", &[], &req()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.authorize("alice", &[], &req()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_group_sets_share_key_when_sorted_equal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CachingAuthorizer::with_ttl(
            CountingAuthorizer { calls: calls.clone(), allowed: true },
            Duration::from_secs(60),
        );
        cache
            .authorize("alice", &["b".to_owned(), "a".to_owned()], &req())
            .await
            .unwrap();
        cache
            .authorize("alice", &["a".to_owned(), "b".to_owned()], &req())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
