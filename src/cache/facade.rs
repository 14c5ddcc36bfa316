//! Cache façade used by request handlers and the mutation hook.
//!
//! Keys are prefixed with the namespace (`{namespace}-{key}`); tag indexes
//! live under `{namespace}-index:{table}`. Nothing here returns an error: a
//! failing partition reads as a miss and writes are dropped with a log line.

use bytes::Bytes;

use crate::cache::partition::PartitionHandle;
use crate::observability::metrics;

#[derive(Clone)]
pub struct CacheFacade {
    partition: PartitionHandle,
    namespace: String,
    default_ttl_secs: u64,
    enabled: bool,
}

impl CacheFacade {
    pub fn new(
        partition: PartitionHandle,
        namespace: impl Into<String>,
        default_ttl_secs: u64,
        enabled: bool,
    ) -> Self {
        Self {
            partition,
            namespace: namespace.into(),
            default_ttl_secs,
            enabled,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if !self.enabled {
            tracing::trace!(key = %key, "Cache disabled, skipping get");
            return None;
        }

        let prefixed = self.build_key(key);
        match self.partition.get(&prefixed).await {
            Ok(Some(value)) => {
                tracing::debug!(key = %prefixed, "Cache hit");
                metrics::record_cache_lookup(true);
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key = %prefixed, "Cache miss");
                metrics::record_cache_lookup(false);
                None
            }
            Err(e) => {
                tracing::error!(key = %prefixed, error = %e, "Cache get failed");
                metrics::record_cache_error("get");
                None
            }
        }
    }

    /// Store `value` and register it under every table in `tables`.
    pub async fn put<T: AsRef<str>>(
        &self,
        key: &str,
        value: Bytes,
        tables: &[T],
        ttl_secs: Option<u64>,
    ) {
        if !self.enabled {
            tracing::trace!(key = %key, "Cache disabled, skipping put");
            return;
        }

        let prefixed = self.build_key(key);
        let ttl_ms = ttl_secs.unwrap_or(self.default_ttl_secs).saturating_mul(1000);

        let index_keys: Vec<String> = tables
            .iter()
            .map(|t| self.build_index_key(t.as_ref()))
            .collect();

        if let Err(e) = self.partition.put_tagged(&prefixed, value, ttl_ms, index_keys).await {
            tracing::error!(key = %prefixed, error = %e, "Cache put failed");
            metrics::record_cache_error("put");
            return;
        }
        tracing::debug!(key = %prefixed, ttl_ms, "Cache put");
        metrics::record_cache_put();
    }

    /// Drop every entry tagged with one of `tables`. Returns the number of
    /// index members processed.
    pub async fn on_mutate<T: AsRef<str>>(&self, tables: &[T]) -> usize {
        if tables.is_empty() {
            tracing::debug!(namespace = %self.namespace, "Mutation without tables, nothing to invalidate");
            return 0;
        }

        let mut total = 0;
        for table in tables {
            let table = table.as_ref();
            let index_key = self.build_index_key(table);
            match self.partition.invalidate_tag(&index_key).await {
                Ok(0) => {}
                Ok(count) => {
                    tracing::info!(namespace = %self.namespace, table = %table, entries = count, "Cache invalidated");
                    metrics::record_cache_invalidated(table, count);
                    total += count;
                }
                Err(e) => {
                    tracing::error!(namespace = %self.namespace, table = %table, error = %e, "Cache invalidation failed");
                    metrics::record_cache_error("invalidate");
                }
            }
        }
        total
    }

    pub async fn delete(&self, key: &str) {
        let prefixed = self.build_key(key);
        if let Err(e) = self.partition.delete(&prefixed).await {
            tracing::error!(key = %prefixed, error = %e, "Cache delete failed");
            metrics::record_cache_error("delete");
        }
    }

    /// Wipe the whole partition. Operational reset only.
    pub async fn clear(&self) {
        match self.partition.clear().await {
            Ok(()) => tracing::info!(partition = %self.partition.id(), "Cache cleared"),
            Err(e) => {
                tracing::error!(partition = %self.partition.id(), error = %e, "Cache clear failed");
                metrics::record_cache_error("clear");
            }
        }
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}-{}", self.namespace, key)
    }

    fn build_index_key(&self, table: &str) -> String {
        index_key(&self.namespace, table)
    }
}

/// Row key of the tag index for `table` in `namespace`.
pub(crate) fn index_key(namespace: &str, table: &str) -> String {
    format!("{namespace}-index:{table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::durable::MemoryDurable;
    use crate::cache::partition::PartitionStore;
    use std::sync::Arc;

    fn facade(enabled: bool) -> (CacheFacade, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = PartitionStore::new(Box::new(MemoryDurable::default()), 64, clock.clone());
        let handle = PartitionHandle::spawn("LHR", store);
        (CacheFacade::new(handle, "LHR", 300, enabled), clock)
    }

    #[tokio::test]
    async fn test_tag_invalidation_is_precise() {
        let (cache, _) = facade(true);
        cache.put("k1", Bytes::from_static(b"v1"), &["T"], None).await;
        cache.put("k2", Bytes::from_static(b"v2"), &["U"], None).await;

        assert_eq!(cache.on_mutate(&["T"]).await, 1);
        assert_eq!(cache.get("k1").await, None);
        assert_eq!(cache.get("k2").await, Some(Bytes::from_static(b"v2")));
    }

    #[tokio::test]
    async fn test_index_is_empty_after_invalidation() {
        let (cache, _) = facade(true);
        cache.put("k1", Bytes::from_static(b"v1"), &["T"], None).await;
        cache.on_mutate(&["T"]).await;
        assert_eq!(cache.on_mutate(&["T"]).await, 0);

        cache.put("k1", Bytes::from_static(b"v1"), &["T"], None).await;
        assert_eq!(cache.on_mutate(&["T"]).await, 1);
    }

    #[tokio::test]
    async fn test_untagged_entries_survive_mutation() {
        let (cache, _) = facade(true);
        let none: &[&str] = &[];
        cache.put("k", Bytes::from_static(b"v"), none, None).await;
        assert_eq!(cache.on_mutate(&["hotfixes"]).await, 0);
        assert!(cache.get("k").await.is_some());
        assert_eq!(cache.on_mutate(none).await, 0);
    }

    #[tokio::test]
    async fn test_default_and_explicit_ttl() {
        let (cache, clock) = facade(true);
        cache.put("default", Bytes::from_static(b"v"), &["T"], None).await;
        cache.put("short", Bytes::from_static(b"v"), &["T"], Some(1)).await;

        clock.set(1_500);
        assert!(cache.get("default").await.is_some());
        assert!(cache.get("short").await.is_none());

        clock.set(300_001);
        assert!(cache.get("default").await.is_none());
    }

    #[tokio::test]
    async fn test_kill_switch_disables_get_and_put() {
        let (cache, _) = facade(false);
        cache.put("k", Bytes::from_static(b"v"), &["T"], None).await;
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.on_mutate(&["T"]).await, 0);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let clock = Arc::new(ManualClock::new(0));
        let store = PartitionStore::new(Box::new(MemoryDurable::default()), 64, clock);
        let handle = PartitionHandle::spawn("shared", store);
        let a = CacheFacade::new(handle.clone(), "a", 300, true);
        let b = CacheFacade::new(handle, "b", 300, true);

        a.put("k", Bytes::from_static(b"a"), &["T"], None).await;
        assert_eq!(b.get("k").await, None);
        assert_eq!(b.on_mutate(&["T"]).await, 0);
        assert!(a.get("k").await.is_some());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (cache, _) = facade(true);
        cache.put("k1", Bytes::from_static(b"v"), &["T"], None).await;
        cache.put("k2", Bytes::from_static(b"v"), &["T"], None).await;
        cache.delete("k1").await;
        assert!(cache.get("k1").await.is_none());
        cache.clear().await;
        assert!(cache.get("k2").await.is_none());
    }
}
