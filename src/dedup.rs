//! Similarity-gated deduplication in front of vector ingestion.
//!
//! The [`Deduplicator`] keeps a bounded LRU cache of recently admitted
//! embeddings. An incoming vector is compared against the cache in
//! most-recently-used-first order; the first entry at or above the
//! configured cosine threshold wins, gets promoted, and the input is
//! rejected. Otherwise the input is admitted and cached, evicting the
//! least-recently-used entry at capacity.
//!
//! One mutex guards the whole cache, so duplicate checks are serialized
//! system-wide. Linear scan and a global lock trade throughput for exactness
//! at bounded cache sizes; an ANN-backed variant would have to preserve the
//! "first sufficiently-similar match wins, and touching it promotes it"
//! semantics.
//!
//! ```rust
//! use branchstore::{DedupConfig, Deduplicator, VectorRecord};
//!
//! let dedup = Deduplicator::new(
//!     DedupConfig::default().with_similarity_threshold(0.95).with_max_cache_size(2),
//! ).unwrap();
//!
//! let a = VectorRecord::new("a", "alpha", vec![1.0, 0.0]);
//! assert!(!dedup.is_duplicate(&a).unwrap());
//! assert!(dedup.is_duplicate(&a).unwrap()); // exact repeat
//! ```
use std::num::NonZeroUsize;
use std::sync::Mutex;

use futures::{Stream, StreamExt};
use lru::LruCache;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DedupConfig;
use crate::error::DedupError;
use crate::vector_store::VectorRecord;

/// Point-in-time cache counters, see [`Deduplicator::stats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupStats {
    /// Entries currently cached.
    pub current_size: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// Configured similarity threshold.
    pub threshold: f32,
}

/// Bounded LRU deduplication cache keyed by vector id.
///
/// Threshold and capacity are fixed for the lifetime of the instance.
#[derive(Debug)]
pub struct Deduplicator {
    cache: Mutex<LruCache<String, Vec<f32>>>,
    threshold: f32,
    capacity: usize,
}

impl Deduplicator {
    /// Build a deduplicator from a validated config.
    ///
    /// # Errors
    ///
    /// [`DedupError::InvalidThreshold`] unless the threshold is in `(0, 1]`,
    /// [`DedupError::InvalidCacheSize`] unless the capacity is at least 1.
    pub fn new(config: DedupConfig) -> Result<Self, DedupError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_cache_size)
            .ok_or(DedupError::InvalidCacheSize(config.max_cache_size))?;
        Ok(Self {
            cache: Mutex::new(LruCache::new(capacity)),
            threshold: config.similarity_threshold,
            capacity: config.max_cache_size,
        })
    }

    /// Check `record` against the cache, inserting it when it is new.
    ///
    /// Returns `Ok(true)` when a cached embedding scores at or above the
    /// threshold — that entry is promoted to most-recently-used and the
    /// input is *not* inserted. Returns `Ok(false)` after inserting the
    /// input as the most-recently-used entry, evicting the LRU entry when
    /// over capacity.
    ///
    /// # Errors
    ///
    /// [`DedupError::EmptyEmbedding`] when the record carries no embedding
    /// values. Mismatched embedding lengths are not an error: they score
    /// `0.0` and therefore never match.
    pub fn is_duplicate(&self, record: &VectorRecord) -> Result<bool, DedupError> {
        if record.embedding.is_empty() {
            return Err(DedupError::EmptyEmbedding(record.id.clone()));
        }

        let mut cache = self.cache.lock().expect("dedup cache lock poisoned");

        let hit = cache.iter().find_map(|(id, embedding)| {
            let score = cosine_similarity(&record.embedding, embedding);
            (score >= self.threshold).then(|| (id.clone(), score))
        });

        if let Some((matched, score)) = hit {
            cache.promote(&matched);
            debug!(id = %record.id, matched = %matched, score, "dedup_hit");
            return Ok(true);
        }

        let evicted = cache.push(record.id.clone(), record.embedding.clone());
        if let Some((evicted_id, _)) = &evicted {
            debug!(id = %record.id, evicted = %evicted_id, "dedup_insert_evict");
        } else {
            debug!(id = %record.id, "dedup_insert");
        }
        Ok(false)
    }

    /// Apply [`is_duplicate`](Self::is_duplicate) to each record in input
    /// order, keeping non-duplicates in their original relative order.
    pub fn filter_batch(
        &self,
        vectors: Vec<VectorRecord>,
    ) -> Result<Vec<VectorRecord>, DedupError> {
        let mut unique = Vec::with_capacity(vectors.len());
        for record in vectors {
            if !self.is_duplicate(&record)? {
                unique.push(record);
            }
        }
        Ok(unique)
    }

    /// Lazily filter an incrementally produced sequence of records.
    ///
    /// Each element goes through [`is_duplicate`](Self::is_duplicate) only
    /// when the consumer polls for it. The token is checked between
    /// elements: cancellation ends the stream without retracting anything
    /// already yielded. An argument error is yielded once and ends the
    /// stream.
    pub fn filter_stream<'a, S>(
        &'a self,
        vectors: S,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<VectorRecord, DedupError>> + 'a
    where
        S: Stream<Item = VectorRecord> + 'a,
    {
        async_stream::stream! {
            futures::pin_mut!(vectors);
            while let Some(record) = vectors.next().await {
                if cancel.is_cancelled() {
                    debug!("dedup_stream_cancelled");
                    break;
                }
                match self.is_duplicate(&record) {
                    Ok(true) => {}
                    Ok(false) => yield Ok(record),
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    /// Empty the cache.
    pub fn clear_cache(&self) {
        self.cache.lock().expect("dedup cache lock poisoned").clear();
    }

    /// Current size, capacity, and threshold.
    pub fn stats(&self) -> DedupStats {
        let cache = self.cache.lock().expect("dedup cache lock poisoned");
        DedupStats {
            current_size: cache.len(),
            max_size: self.capacity,
            threshold: self.threshold,
        }
    }
}

/// Cosine similarity between two embeddings.
///
/// Mismatched lengths, empty inputs, and zero-norm vectors all score `0.0`
/// rather than erroring, so a malformed comparison can never rank as a
/// match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}
