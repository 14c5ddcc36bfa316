//! Durable layer behind a cache partition.
//!
//! # Responsibilities
//! - Hold `key → (value, expires_at)` rows for one partition
//! - Survive process restarts (file backend)
//!
//! # Design Decisions
//! - Owned by exactly one partition actor, so methods take `&mut self`
//! - Expiry is interpreted by the partition, not by the durable layer
//! - The file backend rewrites a JSON snapshot on every mutation; it suits
//!   caches of a few thousand entries

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableRow {
    pub value: Bytes,
    /// Expiry as epoch milliseconds.
    pub expires_at: u64,
}

/// Errors raised by a durable layer.
#[derive(Debug, Error)]
pub enum DurableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Storage contract for a partition's rows.
#[async_trait]
pub trait DurableStore: Send {
    async fn load(&mut self, key: &str) -> Result<Option<DurableRow>, DurableError>;
    async fn upsert(&mut self, key: &str, row: DurableRow) -> Result<(), DurableError>;
    async fn remove(&mut self, key: &str) -> Result<(), DurableError>;
    async fn remove_all(&mut self) -> Result<(), DurableError>;
}

/// Rows kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryDurable {
    rows: HashMap<String, DurableRow>,
}

#[async_trait]
impl DurableStore for MemoryDurable {
    async fn load(&mut self, key: &str) -> Result<Option<DurableRow>, DurableError> {
        Ok(self.rows.get(key).cloned())
    }

    async fn upsert(&mut self, key: &str, row: DurableRow) -> Result<(), DurableError> {
        self.rows.insert(key.to_string(), row);
        Ok(())
    }

    async fn remove(&mut self, key: &str) -> Result<(), DurableError> {
        self.rows.remove(key);
        Ok(())
    }

    async fn remove_all(&mut self) -> Result<(), DurableError> {
        self.rows.clear();
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotRow {
    value: String,
    expires_at: u64,
}

/// Rows mirrored to one JSON snapshot file per partition.
#[derive(Debug)]
pub struct FileDurable {
    path: PathBuf,
    rows: HashMap<String, DurableRow>,
}

impl FileDurable {
    /// Open (or create) the snapshot for `partition` inside `dir`.
    pub async fn open(dir: &Path, partition: &str) -> Result<Self, DurableError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.json", sanitize(partition)));

        let rows = match tokio::fs::read(&path).await {
            Ok(raw) => decode(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(path = %path.display(), rows = rows.len(), "Cache snapshot loaded");
        Ok(Self { path, rows })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), DurableError> {
        let snapshot: HashMap<&str, SnapshotRow> = self
            .rows
            .iter()
            .map(|(k, row)| {
                (
                    k.as_str(),
                    SnapshotRow {
                        value: BASE64.encode(&row.value),
                        expires_at: row.expires_at,
                    },
                )
            })
            .collect();
        let encoded =
            serde_json::to_vec(&snapshot).map_err(|e| DurableError::Corrupt(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileDurable {
    async fn load(&mut self, key: &str) -> Result<Option<DurableRow>, DurableError> {
        Ok(self.rows.get(key).cloned())
    }

    async fn upsert(&mut self, key: &str, row: DurableRow) -> Result<(), DurableError> {
        self.rows.insert(key.to_string(), row);
        self.persist().await
    }

    async fn remove(&mut self, key: &str) -> Result<(), DurableError> {
        if self.rows.remove(key).is_some() {
            self.persist().await?;
        }
        Ok(())
    }

    async fn remove_all(&mut self) -> Result<(), DurableError> {
        self.rows.clear();
        self.persist().await
    }
}

fn decode(raw: &[u8]) -> Result<HashMap<String, DurableRow>, DurableError> {
    let snapshot: HashMap<String, SnapshotRow> =
        serde_json::from_slice(raw).map_err(|e| DurableError::Corrupt(e.to_string()))?;
    snapshot
        .into_iter()
        .map(|(key, row)| {
            let value = BASE64
                .decode(row.value.as_bytes())
                .map_err(|e| DurableError::Corrupt(format!("{key}: {e}")))?;
            Ok((
                key,
                DurableRow {
                    value: Bytes::from(value),
                    expires_at: row.expires_at,
                },
            ))
        })
        .collect()
}

/// Partition ids become file names.
fn sanitize(partition: &str) -> String {
    let name: String = partition
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        "_".to_string()
    } else {
        name
    }
}

/// Which durable layer new partitions get.
#[derive(Debug, Clone, Default)]
pub enum DurableBackend {
    #[default]
    Memory,
    File { dir: PathBuf },
}

impl DurableBackend {
    pub async fn open(&self, partition: &str) -> Result<Box<dyn DurableStore>, DurableError> {
        match self {
            DurableBackend::Memory => Ok(Box::new(MemoryDurable::default())),
            DurableBackend::File { dir } => Ok(Box::new(FileDurable::open(dir, partition).await?)),
        }
    }
}
