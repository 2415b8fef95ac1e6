//! # branchstore
//!
//! Event-sourced branch persistence: append-only, per-branch event logs with
//! optimistic concurrency control, a similarity-gated deduplication cache in
//! front of vector ingestion, and snapshot/restore of full branch state.
//!
//! ## Core pieces
//!
//! - [`BranchStore`] — process-wide map from branch name to its append-only
//!   [`PipelineEvent`] log; append/read/version/exists/delete, all checked
//!   through [`ExpectedVersion`].
//! - [`Deduplicator`] — bounded LRU cache of embeddings rejecting
//!   near-duplicates by cosine similarity before they reach a
//!   [`VectorStore`].
//! - [`SnapshotService`] — captures a branch's events and vectors into a
//!   serializable [`BranchSnapshot`] and restores/forks it into a fresh
//!   branch.
//!
//! Everything is an explicit instance: construct a [`BranchStore`], share it
//! via `Arc`, drop it to tear down. There are no process-wide globals.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use branchstore::{
//!     ingest_batch, BranchStore, DedupConfig, Deduplicator, ExpectedVersion,
//!     SnapshotService, VectorRecord, VectorStore, NO_EVENTS_VERSION,
//! };
//!
//! let store = Arc::new(BranchStore::new());
//! let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
//! let vectors = VectorStore::new();
//!
//! let outcome = ingest_batch(
//!     &store,
//!     "research",
//!     ExpectedVersion::Exact(NO_EVENTS_VERSION),
//!     &dedup,
//!     &vectors,
//!     "crawl-2024-06",
//!     vec![
//!         VectorRecord::new("v1", "first chunk", vec![1.0, 0.0]),
//!         VectorRecord::new("v2", "same chunk again", vec![1.0, 0.0]),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(outcome.accepted, 1);
//! assert_eq!(outcome.version, 0);
//!
//! // Snapshot the branch and fork it.
//! let snapshots = SnapshotService::new(Arc::clone(&store));
//! let snapshot = snapshots.capture("research", &vectors).unwrap();
//! let fork = snapshots.restore_as(&snapshot, "research-fork").unwrap();
//! assert_eq!(fork.version, 0);
//! assert_eq!(fork.vectors.len(), 1);
//! ```
use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn, Level};

mod config;
mod dedup;
mod error;
mod event;
mod snapshot;
mod store;
mod vector_store;

pub use crate::config::{ConfigError, DedupConfig};
pub use crate::dedup::{cosine_similarity, DedupStats, Deduplicator};
pub use crate::error::{DedupError, StoreError};
pub use crate::event::{PipelineEvent, VersionedEvent};
pub use crate::snapshot::{
    BranchSnapshot, RestoredBranch, SnapshotService, SNAPSHOT_SCHEMA_VERSION,
};
pub use crate::store::{BranchStore, ExpectedVersion, NO_EVENTS_VERSION};
pub use crate::vector_store::{VectorRecord, VectorStore};

/// Failures crossing the ingest facade, wrapping the stage that failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("dedup failure: {0}")]
    Dedup(#[from] DedupError),
}

/// What [`ingest_batch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Branch the batch was recorded against.
    pub branch: String,
    /// Branch version after the `IngestBatch` event was appended.
    pub version: i64,
    /// Vectors offered by the caller.
    pub received: usize,
    /// Vectors that passed the dedup gate and entered the vector store.
    pub accepted: usize,
    /// Vectors rejected as near-duplicates.
    pub rejected: usize,
}

/// Run one batch through the vector-ingestion path: gate every vector
/// through the deduplicator, upsert the survivors into the branch's vector
/// store, and append a single [`PipelineEvent::IngestBatch`] recording the
/// accepted count.
///
/// The expected-version check runs up front so a stale caller fails before
/// anything is admitted, and again at the append itself. A conflicting
/// writer that sneaks in between the two still loses only the event — the
/// caller is assumed to be the branch's single ingestion writer, per the
/// store's optimistic model.
///
/// # Errors
///
/// [`PipelineError::Store`] for a bad branch name or a concurrency
/// conflict, [`PipelineError::Dedup`] for a malformed vector; both surface
/// before any event is appended.
pub fn ingest_batch(
    store: &BranchStore,
    branch: &str,
    expected: ExpectedVersion,
    dedup: &Deduplicator,
    vector_store: &VectorStore,
    source: &str,
    vectors: Vec<VectorRecord>,
) -> Result<IngestOutcome, PipelineError> {
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "branchstore.ingest_batch",
        branch = %branch,
        source = %source
    );
    let _guard = span.enter();

    match ingest_batch_inner(store, branch, expected, dedup, vector_store, source, vectors) {
        Ok(outcome) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(
                version = outcome.version,
                received = outcome.received,
                accepted = outcome.accepted,
                rejected = outcome.rejected,
                elapsed_micros,
                "ingest_batch_success"
            );
            Ok(outcome)
        }
        Err(err) => {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %err, elapsed_micros, "ingest_batch_failure");
            Err(err)
        }
    }
}

fn ingest_batch_inner(
    store: &BranchStore,
    branch: &str,
    expected: ExpectedVersion,
    dedup: &Deduplicator,
    vector_store: &VectorStore,
    source: &str,
    vectors: Vec<VectorRecord>,
) -> Result<IngestOutcome, PipelineError> {
    // Fail bad arguments and stale expectations before the dedup cache or
    // vector store see the batch.
    if branch.trim().is_empty() {
        return Err(StoreError::InvalidBranchName.into());
    }
    if let ExpectedVersion::Exact(v) = expected {
        let actual = store.current_version(branch);
        if actual != v {
            return Err(StoreError::ConcurrencyConflict {
                branch: branch.to_string(),
                expected: v,
                actual,
            }
            .into());
        }
    }

    let received = vectors.len();
    let unique = dedup.filter_batch(vectors)?;
    let accepted = unique.len();
    for record in unique {
        vector_store.upsert(record);
    }

    let event = PipelineEvent::ingest_batch(source, accepted);
    let version = store.append(branch, vec![event], expected)?;

    Ok(IngestOutcome {
        branch: branch.to_string(),
        version,
        received,
        accepted,
        rejected: received - accepted,
    })
}
