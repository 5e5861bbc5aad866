//! Process-wide export history.
//!
//! Never persisted. Shared between concurrently running jobs, so every
//! access goes through one lock and appends are never lost.

use chrono::{DateTime, Utc};
use nutriveda_docs::{ExportFormat, ExportOptions};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::download::ResourceHandle;
use crate::job::JobScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportHistoryEntry {
    pub id: String,
    pub filename: String,
    pub format: ExportFormat,
    pub timestamp: DateTime<Utc>,
    pub size: usize,
    pub resource_handle: Option<ResourceHandle>,
    pub scope: JobScope,
    pub plan_ids: Vec<String>,
    pub options: ExportOptions,
}

#[derive(Debug, Clone)]
pub struct ExportHistory {
    entries: Arc<Mutex<VecDeque<ExportHistoryEntry>>>,
    limit: usize,
}

impl ExportHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            limit: limit.max(1),
        }
    }

    /// Append an entry, evicting the oldest ones past the limit.
    pub fn append(&self, entry: ExportHistoryEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.limit {
            entries.pop_front();
        }
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<ExportHistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Newest first, as shown in the history list.
    pub fn recent(&self) -> Vec<ExportHistoryEntry> {
        self.entries.lock().iter().rev().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<ExportHistoryEntry> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> ExportHistoryEntry {
        ExportHistoryEntry {
            id: id.into(),
            filename: format!("{id}.pdf"),
            format: ExportFormat::Pdf,
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            size: 10,
            resource_handle: None,
            scope: JobScope::Single,
            plan_ids: vec!["plan-1".into()],
            options: ExportOptions::all(),
        }
    }

    #[test]
    fn append_keeps_order() {
        let history = ExportHistory::new(10);
        history.append(entry("a"));
        history.append(entry("b"));
        let ids: Vec<String> = history.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        let recent: Vec<String> = history.recent().into_iter().map(|e| e.id).collect();
        assert_eq!(recent, vec!["b", "a"]);
    }

    #[test]
    fn oldest_entries_are_evicted() {
        let history = ExportHistory::new(2);
        for id in ["a", "b", "c"] {
            history.append(entry(id));
        }
        assert_eq!(history.len(), 2);
        assert!(history.get("a").is_none());
        assert!(history.get("c").is_some());
    }

    #[test]
    fn clones_share_entries() {
        let history = ExportHistory::new(5);
        let other = history.clone();
        other.append(entry("x"));
        assert_eq!(history.len(), 1);
        history.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(entry("a")).unwrap();
        assert!(json.get("planIds").is_some());
        assert!(json.get("resourceHandle").is_some());
    }
}
