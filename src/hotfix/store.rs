//! In-process hotfix record store.
//!
//! Stands in for the relational query layer: every write fires the cache
//! mutation hook for [`HOTFIXES_TABLE`] through the background invalidation
//! queue, so merged responses cached under that tag are dropped.

use std::path::Path;
use std::sync::RwLock;

use crate::cache::invalidation::InvalidationQueue;
use crate::hotfix::parser::parse;
use crate::hotfix::record::OverrideRecord;

/// Table name used to tag cache entries that depend on hotfix rows.
pub const HOTFIXES_TABLE: &str = "hotfixes";

/// Thread-safe list of hotfix records, unique by `(file, section, key)`.
#[derive(Default)]
pub struct HotfixStore {
    records: RwLock<Vec<OverrideRecord>>,
    invalidation: Option<InvalidationQueue>,
}

impl HotfixStore {
    pub fn new(invalidation: Option<InvalidationQueue>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            invalidation,
        }
    }

    /// Snapshot of every record, in insertion order.
    pub fn list(&self) -> Vec<OverrideRecord> {
        self.records.read().expect("hotfix store lock poisoned").clone()
    }

    /// Records for one file id, matched by name or upstream unique name.
    pub fn for_file(&self, file_id: &str) -> Vec<OverrideRecord> {
        self.records
            .read()
            .expect("hotfix store lock poisoned")
            .iter()
            .filter(|r| r.belongs_to(file_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("hotfix store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace one record. Returns true when it replaced one.
    pub fn upsert(&self, record: OverrideRecord) -> bool {
        let replaced = self.write(|records| upsert_into(records, record));
        self.notify();
        replaced
    }

    /// Insert or replace a batch; a single invalidation is fired.
    pub fn upsert_many(&self, batch: Vec<OverrideRecord>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let count = batch.len();
        self.write(|records| {
            for record in batch {
                upsert_into(records, record);
            }
        });
        self.notify();
        count
    }

    /// Remove by identity. Returns false when nothing matched.
    pub fn remove(&self, file: &str, section: &str, key: &str) -> bool {
        let removed = self.write(|records| {
            let before = records.len();
            records.retain(|r| !(r.file == file && r.section == section && r.key == key));
            before != records.len()
        });
        if removed {
            self.notify();
        }
        removed
    }

    /// Parse file content and upsert every entry it yields.
    pub fn import(&self, content: &str, file_id: &str, unique_file: Option<&str>) -> usize {
        let records = parse(content, file_id)
            .into_iter()
            .map(|record| match unique_file {
                Some(unique) => record.with_unique_file(unique),
                None => record,
            })
            .collect();
        self.upsert_many(records)
    }

    /// Import a file from disk; the file name becomes the file id.
    pub async fn import_path(&self, path: &Path) -> std::io::Result<usize> {
        let content = tokio::fs::read_to_string(path).await?;
        let file_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let count = self.import(&content, &file_id, None);
        tracing::info!(path = %path.display(), file = %file_id, records = count, "Hotfix file imported");
        Ok(count)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Vec<OverrideRecord>) -> R) -> R {
        let mut records = self.records.write().expect("hotfix store lock poisoned");
        f(&mut records)
    }

    fn notify(&self) {
        if let Some(queue) = &self.invalidation {
            queue.dispatch(vec![HOTFIXES_TABLE.to_string()]);
        }
    }
}

fn upsert_into(records: &mut Vec<OverrideRecord>, record: OverrideRecord) -> bool {
    match records.iter_mut().find(|r| r.identity() == record.identity()) {
        Some(existing) => {
            *existing = record;
            true
        }
        None => {
            records.push(record);
            false
        }
    }
}
