//! Gate entries keyed by exact `(path, method)`.

use axum::http::Method;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;

/// A canned response served instead of forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateEntry {
    pub path: String,
    pub method: Method,
    pub body: Bytes,
    pub content_type: String,
}

/// Listing view of an entry; bodies are not echoed back.
#[derive(Debug, Clone, Serialize)]
pub struct GateSummary {
    pub path: String,
    pub method: String,
    pub content_type: String,
    pub size: usize,
}

impl From<&GateEntry> for GateSummary {
    fn from(entry: &GateEntry) -> Self {
        Self {
            path: entry.path.clone(),
            method: entry.method.to_string(),
            content_type: entry.content_type.clone(),
            size: entry.body.len(),
        }
    }
}

#[derive(Default)]
pub struct GateStore {
    entries: DashMap<(String, Method), GateEntry>,
}

impl GateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace. Returns true when an entry was replaced.
    pub fn set(&self, entry: GateEntry) -> bool {
        let key = (entry.path.clone(), entry.method.clone());
        self.entries.insert(key, entry).is_some()
    }

    pub fn get(&self, path: &str, method: &Method) -> Option<GateEntry> {
        self.entries
            .get(&(path.to_string(), method.clone()))
            .map(|e| e.value().clone())
    }

    pub fn remove(&self, path: &str, method: &Method) -> bool {
        self.entries.remove(&(path.to_string(), method.clone())).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Summaries sorted by path, then method.
    pub fn list(&self) -> Vec<GateSummary> {
        let mut out: Vec<GateSummary> = self.entries.iter().map(|e| GateSummary::from(e.value())).collect();
        out.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.method.cmp(&b.method)));
        out
    }
}
