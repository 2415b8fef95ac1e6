//! Capturing and restoring full branch state.
//!
//! A [`BranchSnapshot`] is a standalone, serializable copy of one branch:
//! its ordered event log plus the vectors its store held at capture time.
//! It is the unit of persistence, transfer, and forking — restoring it
//! builds a brand-new branch and a brand-new vector store that diverge
//! independently from the original.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::event::VersionedEvent;
use crate::store::{BranchStore, ExpectedVersion, NO_EVENTS_VERSION};
use crate::vector_store::{VectorRecord, VectorStore};

/// Bump this value whenever the serialized `BranchSnapshot` layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u16 = 1;

fn default_schema_version() -> u16 {
    SNAPSHOT_SCHEMA_VERSION
}

/// Immutable full-state copy of a branch.
///
/// Serializes to the logical shape
/// `{ name, events: [...], vectors: [...] }`; the concrete encoding is up to
/// the caller (JSON, files, wire frames), round-trip fidelity is what
/// matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    /// Schema version for backward compatibility when deserializing.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    /// Name of the branch the snapshot was captured from.
    pub name: String,
    /// Full ordered event log, versions included.
    pub events: Vec<VersionedEvent>,
    /// Full vector store contents at capture time, already deduplicated.
    pub vectors: Vec<VectorRecord>,
}

/// Outcome of a restore: the registered branch plus its fresh vector store.
#[derive(Debug)]
pub struct RestoredBranch {
    /// Name the events were registered under.
    pub name: String,
    /// Current version of the restored branch, consistent with the event
    /// count ([`NO_EVENTS_VERSION`] for an empty snapshot).
    pub version: i64,
    /// New vector store bulk-loaded from the snapshot, dedup not re-applied.
    pub vectors: VectorStore,
}

/// Captures branches into [`BranchSnapshot`]s and restores them.
#[derive(Debug, Clone)]
pub struct SnapshotService {
    store: Arc<BranchStore>,
}

impl SnapshotService {
    pub fn new(store: Arc<BranchStore>) -> Self {
        Self { store }
    }

    /// Copy `branch`'s full event sequence and the full current contents of
    /// its vector store into a standalone value.
    ///
    /// Read-only: neither the branch nor the vector store is mutated, and
    /// vectors do not pass back through any deduplicator. An unknown branch
    /// captures as an empty snapshot.
    pub fn capture(
        &self,
        branch: &str,
        vectors: &VectorStore,
    ) -> Result<BranchSnapshot, StoreError> {
        if branch.trim().is_empty() {
            return Err(StoreError::InvalidBranchName);
        }
        let events = self.store.read(branch, 0);
        let vectors = vectors.records();
        info!(
            branch,
            events = events.len(),
            vectors = vectors.len(),
            "snapshot_capture"
        );
        Ok(BranchSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            name: branch.to_string(),
            events,
            vectors,
        })
    }

    /// Restore `snapshot` under its original name.
    ///
    /// See [`restore_as`](Self::restore_as); this is the common case of
    /// moving a branch between stores or reviving a deleted one.
    pub fn restore(&self, snapshot: &BranchSnapshot) -> Result<RestoredBranch, StoreError> {
        let name = snapshot.name.clone();
        self.restore_as(snapshot, &name)
    }

    /// Restore `snapshot` under `target`, forking the captured branch.
    ///
    /// Builds a new vector store bulk-loaded with the snapshot's vectors
    /// (dedup is not re-applied) and registers the snapshot's exact event
    /// sequence — order, identities, and versions preserved — as a new
    /// branch. Subsequent operations on the restored branch do not affect
    /// the original.
    ///
    /// # Errors
    ///
    /// [`StoreError::BranchExists`] when `target` is already live,
    /// [`StoreError::InvalidBranchName`] for an empty target.
    pub fn restore_as(
        &self,
        snapshot: &BranchSnapshot,
        target: &str,
    ) -> Result<RestoredBranch, StoreError> {
        if target.trim().is_empty() {
            return Err(StoreError::InvalidBranchName);
        }
        if self.store.exists(target) {
            return Err(StoreError::BranchExists(target.to_string()));
        }

        let events: Vec<_> = snapshot.events.iter().map(|e| e.event.clone()).collect();
        let version = if events.is_empty() {
            NO_EVENTS_VERSION
        } else {
            // Appending into an asserted-empty branch reassigns versions
            // 0..n-1, which is exactly what the snapshot carries: capture
            // always sees a contiguous log.
            self.store
                .append(target, events, ExpectedVersion::Exact(NO_EVENTS_VERSION))
                .map_err(|err| match err {
                    StoreError::ConcurrencyConflict { .. } => {
                        StoreError::BranchExists(target.to_string())
                    }
                    other => other,
                })?
        };

        let vectors = VectorStore::new();
        vectors.bulk_insert(snapshot.vectors.clone());

        info!(
            branch = target,
            source = %snapshot.name,
            events = snapshot.events.len(),
            vectors = vectors.len(),
            "snapshot_restore"
        );
        Ok(RestoredBranch {
            name: target.to_string(),
            version,
            vectors,
        })
    }
}
