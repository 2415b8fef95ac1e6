//! Error types produced by the branch store and the deduplicator.
//!
//! All errors are typed, cloneable, and comparable so callers can branch on
//! specific cases and tests can assert exact variants. Branch absence is
//! deliberately *not* represented here: an unknown branch reads as an empty
//! log and deleting it is a no-op.
//!
//! # Retry guidance
//!
//! [`StoreError::ConcurrencyConflict`] is the only recoverable variant — the
//! caller re-reads the current version and retries the append. Everything
//! else is a fail-fast argument problem and must not be retried.
//!
//! ```rust
//! use branchstore::StoreError;
//!
//! fn should_retry(err: &StoreError) -> bool {
//!     matches!(err, StoreError::ConcurrencyConflict { .. })
//! }
//! ```
use thiserror::Error;

/// Errors surfaced by [`BranchStore`](crate::BranchStore) and
/// [`SnapshotService`](crate::SnapshotService) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The caller's expected version did not match the branch's actual
    /// version. Carries both so the caller can re-read and retry.
    #[error("concurrency conflict on branch '{branch}': expected version {expected}, actual {actual}")]
    ConcurrencyConflict {
        /// Branch the append targeted.
        branch: String,
        /// Version the caller assumed.
        expected: i64,
        /// Version the branch actually had.
        actual: i64,
    },
    /// A snapshot restore targeted a branch name that is already live.
    #[error("branch '{0}' already exists")]
    BranchExists(String),
    /// Branch names are opaque but must be non-empty.
    #[error("branch name must be a non-empty string")]
    InvalidBranchName,
}

/// Errors surfaced by [`Deduplicator`](crate::Deduplicator) construction and
/// duplicate checks. All variants are fail-fast argument errors.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DedupError {
    /// Similarity threshold outside `(0, 1]`.
    #[error("similarity threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f32),
    /// Cache capacity below 1.
    #[error("max cache size must be at least 1, got {0}")]
    InvalidCacheSize(usize),
    /// A vector arrived with no embedding values to compare.
    #[error("vector '{0}' has an empty embedding")]
    EmptyEmbedding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_conflict_reports_both_versions() {
        let err = StoreError::ConcurrencyConflict {
            branch: "b1".into(),
            expected: 5,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("b1"));
        assert!(msg.contains("expected version 5"));
        assert!(msg.contains("actual 1"));
    }

    #[test]
    fn branch_exists_names_the_branch() {
        let err = StoreError::BranchExists("main".into());
        assert!(err.to_string().contains("'main'"));
    }

    #[test]
    fn dedup_errors_render_offending_values() {
        assert!(DedupError::InvalidThreshold(1.5)
            .to_string()
            .contains("1.5"));
        assert!(DedupError::InvalidCacheSize(0).to_string().contains("0"));
        assert!(DedupError::EmptyEmbedding("vec-9".into())
            .to_string()
            .contains("vec-9"));
    }
}
