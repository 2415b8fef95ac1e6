//! In-memory vector storage associated with a branch.
//!
//! The store keeps records in insertion order behind an `RwLock` so snapshot
//! capture sees a stable, ordered view. Lookups are linear; at branch-sized
//! record counts this stays well below lock-contention noise.
use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A text chunk with its embedding and free-form metadata.
///
/// All records handled by one [`Deduplicator`](crate::Deduplicator) instance
/// are assumed to share embedding dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Original text payload the embedding was computed from.
    pub text: String,
    /// Arbitrary key-value metadata (keys unique).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Fixed-length embedding.
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    /// Convenience constructor with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
            embedding,
        }
    }
}

/// Insertion-ordered in-memory store of [`VectorRecord`]s.
///
/// One store belongs to one branch. Deduplication is *not* applied here —
/// the ingestion path gates records through the
/// [`Deduplicator`](crate::Deduplicator) before they reach the store, and
/// snapshot restore bulk-loads records that were already deduplicated at
/// capture time.
#[derive(Debug, Default)]
pub struct VectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing record with the same id in
    /// place (its position in the order is kept).
    pub fn upsert(&self, record: VectorRecord) {
        let mut records = self.records.write().expect("vector store lock poisoned");
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Insert many records at once, preserving their order. Used by snapshot
    /// restore; does not consult the deduplicator.
    pub fn bulk_insert(&self, batch: Vec<VectorRecord>) {
        let mut records = self.records.write().expect("vector store lock poisoned");
        for record in batch {
            match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records
            .read()
            .expect("vector store lock poisoned")
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Copy of the full contents in insertion order.
    pub fn records(&self) -> Vec<VectorRecord> {
        self.records
            .read()
            .expect("vector store lock poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("vector store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records
            .write()
            .expect("vector store lock poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> VectorRecord {
        VectorRecord::new(id, format!("text for {id}"), vec![1.0, 0.0])
    }

    #[test]
    fn upsert_replaces_in_place() {
        let store = VectorStore::new();
        store.upsert(record("a"));
        store.upsert(record("b"));

        let mut replacement = record("a");
        replacement.text = "updated".into();
        store.upsert(replacement);

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[0].text, "updated");
        assert_eq!(records[1].id, "b");
    }

    #[test]
    fn bulk_insert_preserves_order() {
        let store = VectorStore::new();
        store.bulk_insert(vec![record("x"), record("y"), record("z")]);
        let ids: Vec<_> = store.records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, ["x", "y", "z"]);
    }

    #[test]
    fn get_and_clear() {
        let store = VectorStore::new();
        store.upsert(record("a"));
        assert!(store.get("a").is_some());
        assert!(store.get("missing").is_none());

        store.clear();
        assert!(store.is_empty());
    }
}
