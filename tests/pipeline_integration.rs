use std::sync::Arc;

use branchstore::{
    ingest_batch, BranchStore, DedupConfig, Deduplicator, ExpectedVersion, PipelineEvent,
    SnapshotService, VectorRecord, VectorStore, NO_EVENTS_VERSION,
};

fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> VectorRecord {
    VectorRecord::new(id, text, embedding)
}

#[test]
fn full_pipeline_ingest_reason_snapshot_fork() {
    let store = Arc::new(BranchStore::new());
    let dedup = Deduplicator::new(
        DedupConfig::default()
            .with_similarity_threshold(0.95)
            .with_max_cache_size(64),
    )
    .unwrap();
    let vectors = VectorStore::new();

    // First batch: one near-duplicate pair inside the batch.
    let outcome = ingest_batch(
        &store,
        "research",
        ExpectedVersion::Exact(NO_EVENTS_VERSION),
        &dedup,
        &vectors,
        "crawl-a",
        vec![
            chunk("c1", "the quick brown fox", vec![1.0, 0.0, 0.0]),
            chunk("c1-mirror", "the quick brown fox!", vec![0.99, 0.01, 0.0]),
            chunk("c2", "jumped over the lazy dog", vec![0.0, 1.0, 0.0]),
        ],
    )
    .unwrap();
    assert_eq!(outcome.received, 3);
    assert_eq!(outcome.accepted, 2);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.version, 0);
    assert_eq!(vectors.len(), 2);

    // Second batch: cross-batch duplicate caught by the cache.
    let outcome = ingest_batch(
        &store,
        "research",
        ExpectedVersion::Exact(0),
        &dedup,
        &vectors,
        "crawl-b",
        vec![
            chunk("c2-again", "jumped over the lazy dog", vec![0.0, 1.0, 0.0]),
            chunk("c3", "and ran away", vec![0.0, 0.0, 1.0]),
        ],
    )
    .unwrap();
    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.version, 1);
    assert_eq!(vectors.len(), 3);

    // Record some reasoning against the branch.
    let version = store
        .append(
            "research",
            vec![PipelineEvent::reasoning_step("fox outpaces dog")],
            ExpectedVersion::Exact(1),
        )
        .unwrap();
    assert_eq!(version, 2);

    // The log tells the branch's story in order.
    let kinds: Vec<&str> = store
        .read("research", 0)
        .iter()
        .map(|e| e.event.kind())
        .collect();
    assert_eq!(kinds, ["ingest_batch", "ingest_batch", "reasoning_step"]);

    // Snapshot and fork; the fork evolves on its own.
    let service = SnapshotService::new(Arc::clone(&store));
    let snapshot = service.capture("research", &vectors).unwrap();
    let fork = service.restore_as(&snapshot, "research-fork").unwrap();
    assert_eq!(fork.version, 2);

    store
        .append(
            "research-fork",
            vec![PipelineEvent::branch_forked("research")],
            ExpectedVersion::Exact(fork.version),
        )
        .unwrap();

    assert_eq!(store.read("research", 0).len(), 3);
    assert_eq!(store.read("research-fork", 0).len(), 4);
    assert_eq!(fork.vectors.records(), vectors.records());
}

#[test]
fn ingest_batch_records_accepted_count_in_the_event() {
    let store = BranchStore::new();
    let dedup = Deduplicator::new(DedupConfig::default()).unwrap();
    let vectors = VectorStore::new();

    ingest_batch(
        &store,
        "b",
        ExpectedVersion::Any,
        &dedup,
        &vectors,
        "feed",
        vec![
            chunk("a", "alpha", vec![1.0, 0.0]),
            chunk("a-dup", "alpha again", vec![1.0, 0.0]),
        ],
    )
    .unwrap();

    let events = store.read("b", 0);
    assert_eq!(events.len(), 1);
    match &events[0].event {
        PipelineEvent::IngestBatch {
            source,
            document_count,
            ..
        } => {
            assert_eq!(source, "feed");
            assert_eq!(*document_count, 1);
        }
        other => panic!("expected an ingest_batch event, got {other:?}"),
    }
}
