//! Single-writer cache partition.
//!
//! # Responsibilities
//! - Read-through lookups: shadow first, then the durable layer
//! - TTL handling (lazy reclamation on read)
//! - Tag indexes stored as ordinary rows
//!
//! # Design Decisions
//! - One tokio task owns a partition's state; every operation is a message
//!   processed to completion before the next, so index updates never race
//! - The shadow is a bounded LRU and is never trusted past `expires_at`
//! - Durable failures degrade to a miss and are logged, never propagated to
//!   readers

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::cache::clock::Clock;
use crate::cache::durable::{DurableBackend, DurableError, DurableRow, DurableStore, MemoryDurable};

/// Lifetime of tag index rows (~1 year).
pub const INDEX_TTL_MS: u64 = 365 * 24 * 60 * 60 * 1000;

const MAILBOX_CAPACITY: usize = 1024;

/// Errors surfaced by a partition handle.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("durable layer: {0}")]
    Durable(#[from] DurableError),

    #[error("partition {0} is not running")]
    Unavailable(String),
}

/// State of one partition. Used directly in tests, otherwise owned by the
/// actor spawned through [`PartitionHandle`].
pub struct PartitionStore {
    durable: Box<dyn DurableStore>,
    shadow: Option<LruCache<String, DurableRow>>,
    clock: Arc<dyn Clock>,
}

impl PartitionStore {
    /// `shadow_capacity == 0` disables the in-memory shadow.
    pub fn new(durable: Box<dyn DurableStore>, shadow_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            durable,
            shadow: NonZeroUsize::new(shadow_capacity).map(LruCache::new),
            clock,
        }
    }

    pub async fn get(&mut self, key: &str) -> Option<Bytes> {
        let now = self.clock.now_ms();

        if let Some(shadow) = self.shadow.as_mut() {
            let cached = shadow
                .get(key)
                .map(|row| (row.expires_at > now, row.value.clone()));
            match cached {
                Some((true, value)) => return Some(value),
                Some((false, _)) => {
                    shadow.pop(key);
                }
                None => {}
            }
        }

        match self.durable.load(key).await {
            Ok(Some(row)) if row.expires_at > now => {
                let value = row.value.clone();
                if let Some(shadow) = self.shadow.as_mut() {
                    shadow.put(key.to_string(), row);
                }
                Some(value)
            }
            Ok(Some(_)) => {
                if let Err(e) = self.durable.remove(key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to reclaim expired cache row");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put(&mut self, key: &str, value: Bytes, ttl_ms: u64) -> Result<(), DurableError> {
        let row = DurableRow {
            value,
            expires_at: self.clock.now_ms().saturating_add(ttl_ms),
        };
        self.durable.upsert(key, row.clone()).await?;
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.put(key.to_string(), row);
        }
        Ok(())
    }

    pub async fn delete(&mut self, key: &str) -> Result<(), DurableError> {
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.pop(key);
        }
        self.durable.remove(key).await
    }

    pub async fn clear(&mut self) -> Result<(), DurableError> {
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.clear();
        }
        self.durable.remove_all().await
    }

    /// Store `key` and add it to every index in `index_keys`. If an index
    /// update fails the entry is removed again, so no entry outlives the
    /// invalidation of a table it belongs to.
    pub async fn put_tagged(
        &mut self,
        key: &str,
        value: Bytes,
        ttl_ms: u64,
        index_keys: &[String],
    ) -> Result<(), DurableError> {
        self.put(key, value, ttl_ms).await?;
        for index_key in index_keys {
            if let Err(e) = self.add_to_index(index_key, key).await {
                if let Err(undo) = self.delete(key).await {
                    tracing::warn!(key = %key, error = %undo, "Failed to remove untagged cache entry");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Add `key` to the index row `index_key`; no duplicates.
    pub async fn add_to_index(&mut self, index_key: &str, key: &str) -> Result<(), DurableError> {
        let mut members = self.get_index(index_key).await?;
        if !members.iter().any(|m| m == key) {
            members.push(key.to_string());
        }
        let encoded = serde_json::to_vec(&members)
            .map_err(|e| DurableError::Corrupt(e.to_string()))?;
        let row = DurableRow {
            value: Bytes::from(encoded),
            expires_at: self.clock.now_ms().saturating_add(INDEX_TTL_MS),
        };
        self.durable.upsert(index_key, row).await
    }

    /// Members of an index row. Missing, expired or unreadable rows are empty.
    pub async fn get_index(&mut self, index_key: &str) -> Result<Vec<String>, DurableError> {
        let now = self.clock.now_ms();
        match self.durable.load(index_key).await? {
            Some(row) if row.expires_at > now => {
                Ok(serde_json::from_slice(&row.value).unwrap_or_else(|e| {
                    tracing::warn!(index = %index_key, error = %e, "Unreadable tag index, resetting");
                    Vec::new()
                }))
            }
            Some(_) => {
                self.durable.remove(index_key).await?;
                Ok(Vec::new())
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn clear_index(&mut self, index_key: &str) -> Result<(), DurableError> {
        self.durable.remove(index_key).await
    }

    /// Delete every member of an index and then the index itself, in one
    /// step. Returns the number of members processed.
    pub async fn invalidate_tag(&mut self, index_key: &str) -> Result<usize, DurableError> {
        let members = self.get_index(index_key).await?;
        for key in &members {
            if let Err(e) = self.delete(key).await {
                tracing::warn!(key = %key, index = %index_key, error = %e, "Failed to invalidate cache entry");
            }
        }
        self.clear_index(index_key).await?;
        Ok(members.len())
    }
}

enum Command {
    Get {
        key: String,
        reply: oneshot::Sender<Option<Bytes>>,
    },
    Put {
        key: String,
        value: Bytes,
        ttl_ms: u64,
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    PutTagged {
        key: String,
        value: Bytes,
        ttl_ms: u64,
        index_keys: Vec<String>,
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    Delete {
        key: String,
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    Clear {
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    AddToIndex {
        index_key: String,
        key: String,
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    GetIndex {
        index_key: String,
        reply: oneshot::Sender<Result<Vec<String>, DurableError>>,
    },
    ClearIndex {
        index_key: String,
        reply: oneshot::Sender<Result<(), DurableError>>,
    },
    InvalidateTag {
        index_key: String,
        reply: oneshot::Sender<Result<usize, DurableError>>,
    },
}

/// Cloneable mailbox address of a running partition.
#[derive(Clone)]
pub struct PartitionHandle {
    id: Arc<str>,
    tx: mpsc::Sender<Command>,
}

impl PartitionHandle {
    /// Run an already-built store.
    pub fn spawn(id: &str, store: PartitionStore) -> Self {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        tokio::spawn(run(store, rx));
        Self { id: Arc::from(id), tx }
    }

    /// Open the durable layer inside the actor task. Messages sent meanwhile
    /// queue up. An unusable durable layer falls back to memory.
    ///
    /// Entries listed in `stale_indexes` are invalidated before the first
    /// message is served: rows persisted by an earlier process may depend on
    /// state that did not survive it.
    pub fn spawn_opening(
        id: &str,
        backend: DurableBackend,
        shadow_capacity: usize,
        clock: Arc<dyn Clock>,
        stale_indexes: Vec<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let partition = id.to_string();
        tokio::spawn(async move {
            let durable = match backend.open(&partition).await {
                Ok(durable) => durable,
                Err(e) => {
                    tracing::error!(partition = %partition, error = %e, "Durable cache unavailable, using memory");
                    Box::new(MemoryDurable::default())
                }
            };
            let mut store = PartitionStore::new(durable, shadow_capacity, clock);
            for index_key in &stale_indexes {
                match store.invalidate_tag(index_key).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(
                        partition = %partition,
                        index = %index_key,
                        entries = count,
                        "Dropped entries persisted by a previous run"
                    ),
                    Err(e) => tracing::warn!(
                        partition = %partition,
                        index = %index_key,
                        error = %e,
                        "Failed to drop persisted entries"
                    ),
                }
            }
            tracing::debug!(partition = %partition, "Cache partition started");
            run(store, rx).await;
        });
        Self { id: Arc::from(id), tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.call(|reply| Command::Get { key: key.to_string(), reply }).await
    }

    pub async fn put(&self, key: &str, value: Bytes, ttl_ms: u64) -> Result<(), CacheError> {
        self.call(|reply| Command::Put { key: key.to_string(), value, ttl_ms, reply })
            .await?
            .map_err(Into::into)
    }

    pub async fn put_tagged(
        &self,
        key: &str,
        value: Bytes,
        ttl_ms: u64,
        index_keys: Vec<String>,
    ) -> Result<(), CacheError> {
        self.call(|reply| Command::PutTagged {
            key: key.to_string(),
            value,
            ttl_ms,
            index_keys,
            reply,
        })
        .await?
        .map_err(Into::into)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.call(|reply| Command::Delete { key: key.to_string(), reply })
            .await?
            .map_err(Into::into)
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.call(|reply| Command::Clear { reply }).await?.map_err(Into::into)
    }

    pub async fn add_to_index(&self, index_key: &str, key: &str) -> Result<(), CacheError> {
        self.call(|reply| Command::AddToIndex {
            index_key: index_key.to_string(),
            key: key.to_string(),
            reply,
        })
        .await?
        .map_err(Into::into)
    }

    pub async fn get_index(&self, index_key: &str) -> Result<Vec<String>, CacheError> {
        self.call(|reply| Command::GetIndex { index_key: index_key.to_string(), reply })
            .await?
            .map_err(Into::into)
    }

    pub async fn clear_index(&self, index_key: &str) -> Result<(), CacheError> {
        self.call(|reply| Command::ClearIndex { index_key: index_key.to_string(), reply })
            .await?
            .map_err(Into::into)
    }

    pub async fn invalidate_tag(&self, index_key: &str) -> Result<usize, CacheError> {
        self.call(|reply| Command::InvalidateTag { index_key: index_key.to_string(), reply })
            .await?
            .map_err(Into::into)
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| CacheError::Unavailable(self.id.to_string()))?;
        rx.await.map_err(|_| CacheError::Unavailable(self.id.to_string()))
    }
}

async fn run(mut store: PartitionStore, mut rx: mpsc::Receiver<Command>) {
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver only means the caller gave up.
        match command {
            Command::Get { key, reply } => {
                let _ = reply.send(store.get(&key).await);
            }
            Command::Put { key, value, ttl_ms, reply } => {
                let _ = reply.send(store.put(&key, value, ttl_ms).await);
            }
            Command::PutTagged { key, value, ttl_ms, index_keys, reply } => {
                let _ = reply.send(store.put_tagged(&key, value, ttl_ms, &index_keys).await);
            }
            Command::Delete { key, reply } => {
                let _ = reply.send(store.delete(&key).await);
            }
            Command::Clear { reply } => {
                let _ = reply.send(store.clear().await);
            }
            Command::AddToIndex { index_key, key, reply } => {
                let _ = reply.send(store.add_to_index(&index_key, &key).await);
            }
            Command::GetIndex { index_key, reply } => {
                let _ = reply.send(store.get_index(&index_key).await);
            }
            Command::ClearIndex { index_key, reply } => {
                let _ = reply.send(store.clear_index(&index_key).await);
            }
            Command::InvalidateTag { index_key, reply } => {
                let _ = reply.send(store.invalidate_tag(&index_key).await);
            }
        }
    }
}
