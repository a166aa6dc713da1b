//! Two-tier cache: short-lived in-process copies in front of a shared store.
//!
//! The shared store (Redis in production) is the source of truth. Only
//! write-once keys ([`keys::is_write_once`]) are copied in process, since a
//! copy of anything another instance may delete or replace would keep a
//! revoked session or token alive here. A copy lives no longer than
//! `l1_ttl` and no longer than the entry it mirrors. Every other key goes
//! straight to the shared store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use tokenward_core::config::cache::MemoryCacheConfig;
use tokenward_core::result::AppResult;
use tokenward_core::traits::cache::CacheProvider;

use crate::keys;
use crate::memory::MemoryCacheProvider;

/// Memory (L1) over shared-store (L2) cache provider.
#[derive(Debug, Clone)]
pub struct LayeredCacheProvider {
    l1: MemoryCacheProvider,
    l2: Arc<dyn CacheProvider>,
    l1_ttl: Duration,
}

impl LayeredCacheProvider {
    /// Create a layered provider over a shared store.
    pub fn new(config: &MemoryCacheConfig, l2: Arc<dyn CacheProvider>) -> Self {
        Self {
            l1: MemoryCacheProvider::new(config),
            l2,
            l1_ttl: Duration::from_secs(config.l1_ttl_seconds),
        }
    }

    fn local_ttl(&self, ttl: Duration) -> Duration {
        ttl.min(self.l1_ttl)
    }

    async fn keep_local(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let ttl = self.local_ttl(ttl);
        if ttl.is_zero() {
            return Ok(());
        }
        self.l1.set(key, value, ttl).await
    }
}

#[async_trait]
impl CacheProvider for LayeredCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if !keys::is_write_once(key) {
            return self.l2.get(key).await;
        }
        if let Some(value) = self.l1.get(key).await? {
            trace!(key, "L1 hit");
            return Ok(Some(value));
        }
        let Some((value, remaining)) = self.l2.get_with_ttl(key).await? else {
            return Ok(None);
        };
        // Without the remaining TTL a copy could outlive the original.
        if let Some(remaining) = remaining {
            self.keep_local(key, &value, remaining).await?;
        }
        Ok(Some(value))
    }

    async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
        self.l2.get_with_ttl(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.l2.set(key, value, ttl).await?;
        if keys::is_write_once(key) {
            self.keep_local(key, value, ttl).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.l2.delete(key).await?;
        if keys::is_write_once(key) {
            self.l1.delete(key).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        if keys::is_write_once(key) {
            return Ok(self.get(key).await?.is_some());
        }
        self.l2.exists(key).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        // Atomicity must come from the shared store; L1 only mirrors the winner.
        let inserted = self.l2.set_nx(key, value, ttl).await?;
        if inserted && keys::is_write_once(key) {
            self.keep_local(key, value, ttl).await?;
        }
        Ok(inserted)
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.l2.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// A shared store two instances talk to. Entries never expire on their
    /// own; `expire` removes one as Redis would.
    #[derive(Debug, Default)]
    struct SharedStore {
        entries: Mutex<HashMap<String, (String, Duration)>>,
        reads: AtomicUsize,
        reports_ttl: bool,
    }

    impl SharedStore {
        fn reporting_ttl() -> Arc<Self> {
            Arc::new(Self {
                reports_ttl: true,
                ..Self::default()
            })
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn expire(&self, key: &str) {
            self.entries.lock().unwrap().remove(key);
        }
    }

    #[async_trait]
    impl CacheProvider for SharedStore {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            Ok(self.get_with_ttl(key).await?.map(|(value, _)| value))
        }

        async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(key)
                .map(|(value, ttl)| (value.clone(), self.reports_ttl.then_some(*ttl))))
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn exists(&self, key: &str) -> AppResult<bool> {
            Ok(self.get(key).await?.is_some())
        }

        async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(key.to_string(), (value.to_string(), ttl));
            Ok(true)
        }

        async fn health_check(&self) -> AppResult<bool> {
            Ok(true)
        }
    }

    const HOUR: Duration = Duration::from_secs(3_600);

    fn instance(shared: &Arc<SharedStore>) -> LayeredCacheProvider {
        let config = MemoryCacheConfig {
            max_capacity: 1_000,
            l1_ttl_seconds: 30,
        };
        LayeredCacheProvider::new(&config, shared.clone())
    }

    #[tokio::test]
    async fn test_withdrawn_markers_are_seen_by_other_instances() {
        let shared = SharedStore::reporting_ttl();
        let (a, b) = (instance(&shared), instance(&shared));

        for key in [keys::active_session("s1"), keys::token_whitelist("j1")] {
            a.set(&key, "1", HOUR).await.unwrap();
            assert!(b.exists(&key).await.unwrap());

            a.delete(&key).await.unwrap();
            assert!(!b.exists(&key).await.unwrap(), "{key} still visible");
        }
    }

    #[tokio::test]
    async fn test_replaced_watermark_is_seen_by_other_instances() {
        let shared = SharedStore::reporting_ttl();
        let (a, b) = (instance(&shared), instance(&shared));
        let key = keys::token_iat_available("u1");

        a.set(&key, "1000", HOUR).await.unwrap();
        assert_eq!(b.get(&key).await.unwrap().as_deref(), Some("1000"));

        a.set(&key, "2000", HOUR).await.unwrap();
        assert_eq!(b.get(&key).await.unwrap().as_deref(), Some("2000"));
    }

    #[tokio::test]
    async fn test_denylist_reads_are_served_locally() {
        let shared = SharedStore::reporting_ttl();
        let (a, b) = (instance(&shared), instance(&shared));
        let key = keys::token_blacklist("j1");

        assert!(a.set_nx(&key, "1", HOUR).await.unwrap());
        assert!(!b.set_nx(&key, "1", HOUR).await.unwrap());

        assert!(b.exists(&key).await.unwrap());
        let reads = shared.reads();
        assert!(b.exists(&key).await.unwrap());
        assert!(a.exists(&key).await.unwrap());
        assert_eq!(shared.reads(), reads);
    }

    #[tokio::test]
    async fn test_local_copy_never_outlives_shared_entry() {
        let shared = SharedStore::reporting_ttl();
        let b = instance(&shared);
        let key = keys::token_blacklist("j1");

        shared
            .set(&key, "1", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(b.exists(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shared.expire(&key);
        assert!(!b.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_value_without_known_ttl_is_not_copied() {
        let shared = Arc::new(SharedStore::default());
        let b = instance(&shared);
        let key = keys::token_blacklist("j1");

        shared.set(&key, "1", HOUR).await.unwrap();
        assert!(b.exists(&key).await.unwrap());
        assert!(b.exists(&key).await.unwrap());
        assert_eq!(shared.reads(), 2);
    }
}
