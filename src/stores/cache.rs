//! TTL-bound, read-mostly cache over a [`PolicyStore`].
//!
//! Pipeline runs read a whole snapshot; refreshes swap it atomically. A
//! failed refresh keeps serving the previous snapshot (stale governance
//! beats none). Only when no snapshot has ever been fetched does the caller
//! see `None` and fail open.

use super::PolicyStore;
use crate::selection::gate::PolicySnapshot;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct CachedPolicyStore {
    inner: Arc<dyn PolicyStore>,
    ttl: Duration,
    cached: RwLock<Option<CachedSnapshot>>,
}

struct CachedSnapshot {
    taken_at: Instant,
    snapshot: Arc<PolicySnapshot>,
}

impl CachedPolicyStore {
    pub fn new(inner: Arc<dyn PolicyStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Current snapshot, refreshing first when stale or absent.
    ///
    /// Returns `None` only when the store has never been reachable.
    pub async fn snapshot(&self) -> Option<Arc<PolicySnapshot>> {
        if let Some(fresh) = self.fresh_snapshot() {
            return Some(fresh);
        }

        match self.inner.list_policies().await {
            Ok(policies) => {
                let snapshot = Arc::new(PolicySnapshot::from_policies(policies));
                *self.cached.write() = Some(CachedSnapshot {
                    taken_at: Instant::now(),
                    snapshot: Arc::clone(&snapshot),
                });
                Some(snapshot)
            }
            Err(error) => {
                let stale = self.cached.read().as_ref().map(|c| Arc::clone(&c.snapshot));
                match &stale {
                    Some(_) => tracing::warn!(
                        error = %error,
                        "tool policy refresh failed; serving stale snapshot"
                    ),
                    None => tracing::warn!(
                        error = %error,
                        "tool policy store unreachable with no snapshot; failing open"
                    ),
                }
                stale
            }
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<PolicySnapshot>> {
        let cached = self.cached.read();
        cached
            .as_ref()
            .filter(|c| c.taken_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Role, ToolId};
    use crate::stores::ToolPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn list_policies(&self) -> anyhow::Result<Vec<ToolPolicy>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("policy store offline");
            }
            Ok(vec![ToolPolicy {
                tool: ToolId::WebSearch,
                enabled: true,
                allowed_roles: vec![Role::User],
                order: 0,
            }])
        }
    }

    #[tokio::test]
    async fn snapshot_is_cached_within_ttl() {
        let store = Arc::new(CountingStore::new());
        let cache = CachedPolicyStore::new(store.clone(), Duration::from_secs(60));

        assert!(cache.snapshot().await.is_some());
        assert!(cache.snapshot().await.is_some());
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_snapshot_triggers_refresh() {
        let store = Arc::new(CountingStore::new());
        let cache = CachedPolicyStore::new(store.clone(), Duration::from_millis(0));

        assert!(cache.snapshot().await.is_some());
        assert!(cache.snapshot().await.is_some());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_failure_serves_stale_snapshot() {
        let store = Arc::new(CountingStore::new());
        let cache = CachedPolicyStore::new(store.clone(), Duration::from_millis(0));

        let first = cache.snapshot().await.unwrap();
        assert!(first.allows(ToolId::WebSearch, Role::User));

        store.fail.store(true, Ordering::SeqCst);
        let stale = cache.snapshot().await;
        assert!(stale.is_some(), "stale snapshot must keep serving");
    }

    #[tokio::test]
    async fn unreachable_store_with_no_snapshot_returns_none() {
        let store = Arc::new(CountingStore::new());
        store.fail.store(true, Ordering::SeqCst);
        let cache = CachedPolicyStore::new(store, Duration::from_secs(60));

        assert!(cache.snapshot().await.is_none());
    }
}
