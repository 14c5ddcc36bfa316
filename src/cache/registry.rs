//! Partition registry.
//!
//! # Responsibilities
//! - Start one partition actor per partition id, on first use
//! - Hand out façades bound to a partition
//! - Fan mutation hooks out to every live partition
//!
//! # Design Decisions
//! - Partitions never coordinate; fan-out runs them in parallel
//! - The partition id doubles as the key namespace

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;

use crate::cache::clock::Clock;
use crate::cache::durable::DurableBackend;
use crate::cache::facade::{index_key, CacheFacade};
use crate::cache::partition::PartitionHandle;
use crate::config::CacheConfig;

/// Settings shared by every partition.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Kill switch: when false, get/put are no-ops.
    pub enabled: bool,
    pub default_ttl_secs: u64,
    pub shadow_capacity: usize,
    pub backend: DurableBackend,
    /// Tables whose persisted entries are dropped when a partition opens.
    pub stale_on_open: Vec<String>,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        let backend = match &config.data_dir {
            Some(dir) => DurableBackend::File { dir: dir.into() },
            None => DurableBackend::Memory,
        };
        Self {
            enabled: config.enabled,
            default_ttl_secs: config.default_ttl_secs,
            shadow_capacity: config.shadow_capacity,
            backend,
            stale_on_open: Vec::new(),
        }
    }
}

pub struct PartitionRegistry {
    partitions: DashMap<String, PartitionHandle>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl PartitionRegistry {
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            partitions: DashMap::new(),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Handle of `id`, starting the partition if needed.
    pub fn partition(&self, id: &str) -> PartitionHandle {
        if let Some(existing) = self.partitions.get(id) {
            return existing.clone();
        }
        self.partitions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(partition = %id, "Starting cache partition");
                let stale = self
                    .settings
                    .stale_on_open
                    .iter()
                    .map(|table| index_key(id, table))
                    .collect();
                PartitionHandle::spawn_opening(
                    id,
                    self.settings.backend.clone(),
                    self.settings.shadow_capacity,
                    self.clock.clone(),
                    stale,
                )
            })
            .clone()
    }

    /// Façade over partition `id`, namespaced by the same id.
    pub fn facade(&self, id: &str) -> CacheFacade {
        self.facade_for(self.partition(id))
    }

    /// Ids of the partitions started so far, sorted.
    pub fn partition_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.partitions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Run the mutation hook for `tables` in every live partition.
    pub async fn invalidate_everywhere<T: AsRef<str> + Sync>(&self, tables: &[T]) -> usize {
        let facades = self.live_facades();
        join_all(facades.iter().map(|f| f.on_mutate(tables)))
            .await
            .into_iter()
            .sum()
    }

    /// Clear every live partition.
    pub async fn clear_everywhere(&self) {
        let facades = self.live_facades();
        join_all(facades.iter().map(|f| f.clear())).await;
    }

    fn live_facades(&self) -> Vec<CacheFacade> {
        self.partitions
            .iter()
            .map(|e| self.facade_for(e.value().clone()))
            .collect()
    }

    fn facade_for(&self, handle: PartitionHandle) -> CacheFacade {
        let namespace = handle.id().to_string();
        CacheFacade::new(
            handle,
            namespace,
            self.settings.default_ttl_secs,
            self.settings.enabled,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use bytes::Bytes;

    fn registry() -> PartitionRegistry {
        PartitionRegistry::new(
            CacheSettings {
                enabled: true,
                default_ttl_secs: 300,
                shadow_capacity: 64,
                backend: DurableBackend::Memory,
                stale_on_open: Vec::new(),
            },
            Arc::new(ManualClock::new(0)),
        )
    }

    #[tokio::test]
    async fn test_partitions_are_independent() {
        let registry = registry();
        registry.facade("LHR").put("k", Bytes::from_static(b"lhr"), &["T"], None).await;
        registry.facade("FRA").put("k", Bytes::from_static(b"fra"), &["T"], None).await;

        assert_eq!(registry.facade("LHR").get("k").await, Some(Bytes::from_static(b"lhr")));
        assert_eq!(registry.facade("FRA").get("k").await, Some(Bytes::from_static(b"fra")));
        assert_eq!(registry.partition_ids(), vec!["FRA", "LHR"]);
    }

    #[tokio::test]
    async fn test_invalidate_everywhere() {
        let registry = registry();
        registry.facade("LHR").put("k", Bytes::from_static(b"v"), &["T"], None).await;
        registry.facade("FRA").put("k", Bytes::from_static(b"v"), &["T"], None).await;
        registry.facade("FRA").put("other", Bytes::from_static(b"v"), &["U"], None).await;

        assert_eq!(registry.invalidate_everywhere(&["T"]).await, 2);
        assert!(registry.facade("LHR").get("k").await.is_none());
        assert!(registry.facade("FRA").get("k").await.is_none());
        assert!(registry.facade("FRA").get("other").await.is_some());
    }

    #[tokio::test]
    async fn test_clear_everywhere() {
        let registry = registry();
        registry.facade("LHR").put("k", Bytes::from_static(b"v"), &["T"], None).await;
        registry.clear_everywhere().await;
        assert!(registry.facade("LHR").get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_file_backend_persists_across_registries() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            enabled: true,
            default_ttl_secs: 300,
            shadow_capacity: 0,
            backend: DurableBackend::File { dir: dir.path().to_path_buf() },
            stale_on_open: Vec::new(),
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));

        let first = PartitionRegistry::new(settings.clone(), clock.clone());
        first.facade("global").put("k", Bytes::from_static(b"v"), &["T"], None).await;

        let second = PartitionRegistry::new(settings, clock);
        assert_eq!(second.facade("global").get("k").await, Some(Bytes::from_static(b"v")));
        assert_eq!(second.facade("global").on_mutate(&["T"]).await, 1);
    }

    #[tokio::test]
    async fn test_stale_tables_do_not_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            enabled: true,
            default_ttl_secs: 300,
            shadow_capacity: 16,
            backend: DurableBackend::File { dir: dir.path().to_path_buf() },
            stale_on_open: vec!["hotfixes".to_string()],
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));

        let first = PartitionRegistry::new(settings.clone(), clock.clone());
        let facade = first.facade("global");
        facade.put("merged", Bytes::from_static(b"[Core]\nEnabled=false\n"), &["hotfixes"], None).await;
        facade.put("plain", Bytes::from_static(b"v"), &["other"], None).await;
        assert!(facade.get("merged").await.is_some());

        let second = PartitionRegistry::new(settings, clock);
        assert_eq!(second.facade("global").get("merged").await, None);
        assert_eq!(second.facade("global").get("plain").await, Some(Bytes::from_static(b"v")));
    }
}
