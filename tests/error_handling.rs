use std::sync::Arc;

use branchstore::{
    ingest_batch, BranchStore, DedupConfig, Deduplicator, ExpectedVersion, PipelineError,
    PipelineEvent, SnapshotService, StoreError, VectorRecord, VectorStore,
};

#[test]
fn empty_branch_name_is_rejected_everywhere() {
    let store = Arc::new(BranchStore::new());

    let err = store
        .append("", vec![PipelineEvent::reasoning_step("x")], ExpectedVersion::Any)
        .unwrap_err();
    assert_eq!(err, StoreError::InvalidBranchName);

    let service = SnapshotService::new(Arc::clone(&store));
    let err = service.capture("", &VectorStore::new()).unwrap_err();
    assert_eq!(err, StoreError::InvalidBranchName);

    let snapshot = service.capture("ok", &VectorStore::new()).unwrap();
    let err = service.restore_as(&snapshot, "   ").unwrap_err();
    assert_eq!(err, StoreError::InvalidBranchName);
}

#[test]
fn conflict_error_is_matchable_and_carries_context() {
    let store = BranchStore::new();
    store
        .append("b", vec![PipelineEvent::reasoning_step("x")], ExpectedVersion::Any)
        .unwrap();

    let result = store.append(
        "b",
        vec![PipelineEvent::reasoning_step("y")],
        ExpectedVersion::Exact(9),
    );
    match result {
        Err(StoreError::ConcurrencyConflict { branch, expected, actual }) => {
            assert_eq!(branch, "b");
            assert_eq!(expected, 9);
            assert_eq!(actual, 0);
        }
        other => panic!("expected a concurrency conflict, got {other:?}"),
    }
}

#[test]
fn ingest_batch_wraps_store_conflicts() {
    let store = BranchStore::new();
    let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
    let vectors = VectorStore::new();

    store
        .append("b", vec![PipelineEvent::reasoning_step("seed")], ExpectedVersion::Any)
        .unwrap();

    let err = ingest_batch(
        &store,
        "b",
        ExpectedVersion::Exact(5),
        &dedup,
        &vectors,
        "feed",
        vec![VectorRecord::new("v1", "text", vec![1.0, 0.0])],
    )
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Store(StoreError::ConcurrencyConflict { actual: 0, .. })
    ));
    assert!(vectors.is_empty(), "stale caller admitted nothing");
    assert_eq!(
        dedup.stats().current_size,
        0,
        "stale caller polluted the dedup cache"
    );
}

#[test]
fn ingest_batch_wraps_dedup_argument_errors() {
    let store = BranchStore::new();
    let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
    let vectors = VectorStore::new();

    let err = ingest_batch(
        &store,
        "b",
        ExpectedVersion::Any,
        &dedup,
        &vectors,
        "feed",
        vec![VectorRecord::new("bad", "text", vec![])],
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Dedup(_)));
    assert!(!store.exists("b"), "no event appended on a failed batch");
}

#[test]
fn absence_is_not_an_error() {
    let store = BranchStore::new();
    // None of these should panic or error.
    assert!(store.read("missing", 0).is_empty());
    store.delete("missing");
    assert!(!store.exists("missing"));
}
